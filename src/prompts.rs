//! Prompt templates for simulated conjoint choice questions.
//!
//! Domain logic for rendering survey prompts. Provider-agnostic.

use crate::profiles::Profile;

// =============================================================================
// Profile description
// =============================================================================

/// Render a profile as `"<Brand>, Price: <Price>, RAM: <RAM>, Storage: <Storage>, Size: <Size>"`.
///
/// Missing attributes render as empty strings.
pub fn describe_profile(profile: &Profile) -> String {
    let field = |name: &str| profile.value(name).unwrap_or_default();
    format!(
        "{}, Price: {}, RAM: {}, Storage: {}, Size: {}",
        field("Brand"),
        field("Price"),
        field("RAM"),
        field("Storage"),
        field("Size"),
    )
}

// =============================================================================
// Prompt templates
// =============================================================================

/// A two-block prompt: fixed respondent context, then the choice question.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub context: &'static str,
    /// Holds one `{option_1}` and one `{option_2}` placeholder.
    pub question: &'static str,
}

impl PromptTemplate {
    /// Context, a blank line, then the question with both options filled in.
    pub fn render(&self, option_1: &str, option_2: &str) -> String {
        let question = fill_options(self.question.trim(), option_1, option_2);
        format!("{}\n\n{}", self.context.trim(), question)
    }

    pub fn render_profiles(&self, profile1: &Profile, profile2: &Profile) -> String {
        self.render(&describe_profile(profile1), &describe_profile(profile2))
    }
}

/// Substitute both placeholders in one left-to-right pass, so option text is
/// never rescanned for placeholders.
fn fill_options(template: &str, option_1: &str, option_2: &str) -> String {
    let mut out = String::with_capacity(template.len() + option_1.len() + option_2.len());
    let mut rest = template;
    while let Some(at) = rest.find('{') {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];
        if let Some(after) = tail.strip_prefix("{option_1}") {
            out.push_str(option_1);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{option_2}") {
            out.push_str(option_2);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

// =============================================================================
// Standard prompts
// =============================================================================

pub const LAPTOP_SURVEY_V1: PromptTemplate = PromptTemplate {
    context: "You are a customer. You are selected at random while shopping for laptops to participate in a survey. The interviewer will describe the options you saw while shopping and ask you to report which option you chose to purchase. Whenever two options are shown, you can also choose a third option which is not to purchase anything that day.",
    question: r#"Which of the following options did you choose?
Option 1: {option_1}
Option 2: {option_2}

Answer with exactly "1", "2", or "0". Answer "1" if you chose Option 1. Answer "2" if you chose Option 2. Answer "0" if you chose not to purchase anything today."#,
};

pub const DEFAULT_PROMPT: PromptTemplate = LAPTOP_SURVEY_V1;

/// Render the default survey prompt for two profiles.
pub fn build_prompt(profile1: &Profile, profile2: &Profile) -> String {
    DEFAULT_PROMPT.render_profiles(profile1, profile2)
}

// =============================================================================
// TESTS
// =============================================================================
