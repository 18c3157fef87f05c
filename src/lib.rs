#![forbid(unsafe_code)]

//! # conjoint-harness
//!
//! Simulated discrete-choice conjoint surveys with LLM respondents.
//!
//! A full-factorial product space is enumerated, a bounded number of unique
//! profile pairs is sampled, each pair is rendered into a fixed survey prompt,
//! and a chat model is asked which option it would buy (or "0" for nothing).
//! Calls are made one at a time with a courtesy pause, and the first
//! standalone choice code in each reply is recorded in a results table.

pub mod choice;
pub mod config;
pub mod gateway;
pub mod pairs;
pub mod profiles;
pub mod prompts;
pub mod respondent;
pub mod study;

pub use choice::{parse_choice, Choice};
pub use config::{ClientConfig, ConfigError, FailurePolicy, StudyConfig};
pub use gateway::{ChatGateway, NoopUsageSink, ProviderError, ProviderGateway, UsageSink};
pub use pairs::sample_pairs;
pub use profiles::{generate_profiles, Attribute, AttributeCatalog, Profile, ProfileSpace};
pub use prompts::build_prompt;
pub use respondent::{ChoiceClient, LlmRespondent};
pub use study::{
    run_study, CancelSignal, JsonlTraceSink, NoPause, Pacer, PairRecord, ResponseOutcome,
    ResponseRecord, StudyOptions, StudyReport, StudyStopReason, TokioPacer, TraceSink,
};
