//! Extraction of the respondent's choice code from free-text replies.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A parsed survey answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    /// "0": buy nothing today.
    NoPurchase,
    /// "1": the first option.
    Option1,
    /// "2": the second option.
    Option2,
}

impl Choice {
    pub fn code(&self) -> &'static str {
        match self {
            Choice::NoPurchase => "0",
            Choice::Option1 => "1",
            Choice::Option2 => "2",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(Choice::NoPurchase),
            "1" => Some(Choice::Option1),
            "2" => Some(Choice::Option2),
            _ => None,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

fn standalone_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The non-digit guard is consumed, so the code itself is capture group 1.
    RE.get_or_init(|| Regex::new(r"(?:^|[^0-9])([012])(?:[^0-9]|$)").expect("valid regex"))
}

/// First `0`, `1` or `2` in `raw` that is not part of a longer digit run.
///
/// Returns `None` when the reply holds no such token; that is a normal outcome.
pub fn parse_choice(raw: &str) -> Option<Choice> {
    standalone_code()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Choice::from_code(m.as_str()))
}
