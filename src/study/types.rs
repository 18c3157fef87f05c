//! Records produced by a study run.

use serde::Serialize;
use uuid::Uuid;

use crate::choice::Choice;
use crate::gateway::ProviderError;

/// `Response` cell for a reply that held no standalone code.
pub const UNPARSED_SENTINEL: &str = "NA";
/// `Response` cell for a pair whose call failed.
pub const ERROR_SENTINEL: &str = "ERROR";

/// One conjoint question: two distinct profiles and the rendered prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairRecord {
    pub product1_id: String,
    pub product2_id: String,
    pub prompt: String,
}

/// What came back for a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseOutcome {
    /// The reply contained a standalone 0, 1 or 2.
    Choice { choice: Choice },
    /// The reply arrived but held no code.
    Unparsed,
    /// The call did not complete.
    Failed { error_code: String, message: String },
}

impl ResponseOutcome {
    pub fn failed(err: &ProviderError) -> Self {
        ResponseOutcome::Failed {
            error_code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    pub fn from_parsed(choice: Option<Choice>) -> Self {
        match choice {
            Some(choice) => ResponseOutcome::Choice { choice },
            None => ResponseOutcome::Unparsed,
        }
    }

    pub fn choice(&self) -> Option<Choice> {
        match self {
            ResponseOutcome::Choice { choice } => Some(*choice),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ResponseOutcome::Failed { .. })
    }

    /// Cell value for the exported `Response` column.
    pub fn response_cell(&self) -> &str {
        match self {
            ResponseOutcome::Choice { choice } => choice.code(),
            ResponseOutcome::Unparsed => UNPARSED_SENTINEL,
            ResponseOutcome::Failed { .. } => ERROR_SENTINEL,
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            ResponseOutcome::Failed { error_code, .. } => Some(error_code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseRecord {
    pub pair: PairRecord,
    pub outcome: ResponseOutcome,
    /// Reply text as received; absent when the call failed.
    pub raw_reply: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StudyStopReason {
    /// Every pair was processed.
    Completed,
    /// Cancellation was requested between pairs.
    Cancelled,
    /// A call failed under the abort policy, or configuration was unusable.
    Aborted {
        pair_index: usize,
        error_code: String,
        message: String,
    },
}

/// Counts per outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StudySummary {
    pub option1: usize,
    pub option2: usize,
    pub no_purchase: usize,
    pub unparsed: usize,
    pub failed: usize,
}

impl StudySummary {
    pub fn from_records(records: &[ResponseRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            match &record.outcome {
                ResponseOutcome::Choice { choice: Choice::Option1 } => summary.option1 += 1,
                ResponseOutcome::Choice { choice: Choice::Option2 } => summary.option2 += 1,
                ResponseOutcome::Choice {
                    choice: Choice::NoPurchase,
                } => summary.no_purchase += 1,
                ResponseOutcome::Unparsed => summary.unparsed += 1,
                ResponseOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.option1 + self.option2 + self.no_purchase + self.unparsed + self.failed
    }
}

/// Result of a study run, in call order.
#[derive(Debug, Clone, Serialize)]
pub struct StudyReport {
    pub run_id: Uuid,
    pub records: Vec<ResponseRecord>,
    pub stop_reason: StudyStopReason,
    pub summary: StudySummary,
}
