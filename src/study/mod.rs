//! Conjoint study orchestration.
//!
//! Turns sampled profile pairs into prompts, runs them through a respondent
//! one at a time, and collects the results table.

pub mod export;
pub mod runner;
pub mod trace;
pub mod types;

use rand::Rng;

use crate::pairs::sample_pairs;
use crate::profiles::ProfileSpace;
use crate::prompts::build_prompt;

pub use export::{write_pairs_csv, write_profiles_csv, write_results_csv, ExportError};
pub use runner::{run_study, CancelSignal, NoPause, Pacer, StudyOptions, TokioPacer};
pub use trace::{ChoiceTrace, JsonlTraceSink, TraceError, TraceSink, TraceWorker};
pub use types::*;

#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    #[error("unknown profile id: {0}")]
    UnknownProfile(String),
    #[error("a profile cannot be paired with itself: {0}")]
    SelfPair(String),
}

/// Render prompts for the given ID pairs.
pub fn pair_records(
    space: &ProfileSpace,
    pairs: &[(String, String)],
) -> Result<Vec<PairRecord>, StudyError> {
    pairs
        .iter()
        .map(|(a, b)| {
            if a == b {
                return Err(StudyError::SelfPair(a.clone()));
            }
            let p1 = space
                .get(a)
                .ok_or_else(|| StudyError::UnknownProfile(a.clone()))?;
            let p2 = space
                .get(b)
                .ok_or_else(|| StudyError::UnknownProfile(b.clone()))?;
            Ok(PairRecord {
                product1_id: p1.id.clone(),
                product2_id: p2.id.clone(),
                prompt: build_prompt(p1, p2),
            })
        })
        .collect()
}

/// Sample `k` pairs from the space and render their prompts.
pub fn sample_pair_records<R: Rng + ?Sized>(
    space: &ProfileSpace,
    k: usize,
    rng: &mut R,
) -> Vec<PairRecord> {
    let ids = space.ids();
    let pairs = sample_pairs(&ids, k, rng);
    pairs
        .iter()
        .filter_map(|(a, b)| {
            let p1 = space.get(a)?;
            let p2 = space.get(b)?;
            Some(PairRecord {
                product1_id: p1.id.clone(),
                product2_id: p2.id.clone(),
                prompt: build_prompt(p1, p2),
            })
        })
        .collect()
}
