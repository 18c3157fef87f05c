//! Sequential study loop.
//!
//! For each pair, in order:
//! 1. Stop if cancellation was requested.
//! 2. Pause (rate-limit courtesy).
//! 3. Query the respondent, parse the reply, append a record.
//!
//! Failed calls follow [`FailurePolicy`]; configuration errors always stop
//! the run. Records collected before a stop are always kept. Cancellation
//! interrupts a pause or an in-flight call; the interrupted pair is not
//! recorded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::choice::parse_choice;
use crate::config::{FailurePolicy, StudyConfig};
use crate::respondent::ChoiceClient;

use super::trace::{now_epoch_ms, prompt_hash, ChoiceTrace, TraceSink};
use super::types::{
    PairRecord, ResponseOutcome, ResponseRecord, StudyReport, StudyStopReason, StudySummary,
};

// =============================================================================
// Pacing
// =============================================================================

/// Waits between calls.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Real wall-clock pause.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPause;

#[async_trait]
impl Pacer for NoPause {
    async fn pause(&self, _duration: Duration) {}
}

// =============================================================================
// Options
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StudyOptions {
    pub pause: Duration,
    pub failure_policy: FailurePolicy,
}

impl StudyOptions {
    pub fn new(pause: Duration, failure_policy: FailurePolicy) -> Self {
        Self {
            pause,
            failure_policy,
        }
    }
}

impl From<&StudyConfig> for StudyOptions {
    fn from(config: &StudyConfig) -> Self {
        Self::new(config.pause(), config.failure_policy)
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Shared stop request. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called, immediately if it already was.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

fn is_cancelled(cancel: Option<&CancelSignal>) -> bool {
    cancel.is_some_and(CancelSignal::is_cancelled)
}

async fn until_cancelled(cancel: Option<&CancelSignal>) {
    match cancel {
        Some(cancel) => cancel.cancelled().await,
        None => std::future::pending().await,
    }
}

// =============================================================================
// Loop
// =============================================================================

/// Process `pairs` one at a time and return the collected table.
pub async fn run_study<C, P>(
    client: &C,
    pacer: &P,
    pairs: &[PairRecord],
    options: &StudyOptions,
    trace: Option<&dyn TraceSink>,
    cancel: Option<&CancelSignal>,
) -> StudyReport
where
    C: ChoiceClient + ?Sized,
    P: Pacer + ?Sized,
{
    let run_id = Uuid::new_v4();
    let mut records: Vec<ResponseRecord> = Vec::with_capacity(pairs.len());

    info!(
        %run_id,
        pairs = pairs.len(),
        pause_ms = options.pause.as_millis() as u64,
        policy = ?options.failure_policy,
        "Starting study"
    );

    let stop_reason = 'study: {
        for (index, pair) in pairs.iter().enumerate() {
            if is_cancelled(cancel) {
                break 'study StudyStopReason::Cancelled;
            }
            let paused = tokio::select! {
                biased;
                _ = until_cancelled(cancel) => false,
                _ = pacer.pause(options.pause) => true,
            };
            if !paused {
                break 'study StudyStopReason::Cancelled;
            }

            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = until_cancelled(cancel) => None,
                result = client.query(&pair.prompt) => Some(result),
            };
            let Some(result) = result else {
                debug!(pair_index = index, "Cancelled during call; pair not recorded");
                break 'study StudyStopReason::Cancelled;
            };
            let latency_ms = started.elapsed().as_millis() as u64;

            let (record, failure) = match result {
                Ok(reply) => {
                    let outcome = ResponseOutcome::from_parsed(parse_choice(&reply));
                    if matches!(outcome, ResponseOutcome::Unparsed) {
                        debug!(pair_index = index, reply = %reply, "Reply held no choice code");
                    }
                    let record = ResponseRecord {
                        pair: pair.clone(),
                        outcome,
                        raw_reply: Some(reply),
                    };
                    (record, None)
                }
                Err(err) => {
                    warn!(
                        pair_index = index,
                        product1 = %pair.product1_id,
                        product2 = %pair.product2_id,
                        error_code = err.code(),
                        error = %err,
                        "Choice call failed"
                    );
                    let record = ResponseRecord {
                        pair: pair.clone(),
                        outcome: ResponseOutcome::failed(&err),
                        raw_reply: None,
                    };
                    (record, Some(err))
                }
            };

            info!(
                pair_index = index,
                product1 = %pair.product1_id,
                product2 = %pair.product2_id,
                response = record.outcome.response_cell(),
                latency_ms,
                "Recorded response"
            );

            if let Some(sink) = trace {
                let event = trace_event(run_id, index, &record, latency_ms);
                if let Err(err) = sink.record(event) {
                    warn!(error = %err, "Trace write failed; continuing without it");
                }
            }

            match failure {
                Some(err) if err.is_fatal() || options.failure_policy == FailurePolicy::Abort => {
                    // The failed pair stays in the table so the output shows where it stopped.
                    records.push(record);
                    break 'study StudyStopReason::Aborted {
                        pair_index: index,
                        error_code: err.code().to_string(),
                        message: err.to_string(),
                    };
                }
                _ => records.push(record),
            }
        }
        StudyStopReason::Completed
    };

    let summary = StudySummary::from_records(&records);
    info!(
        %run_id,
        processed = records.len(),
        failed = summary.failed,
        unparsed = summary.unparsed,
        stop_reason = ?stop_reason,
        "Study finished"
    );

    StudyReport {
        run_id,
        records,
        stop_reason,
        summary,
    }
}

fn trace_event(run_id: Uuid, index: usize, record: &ResponseRecord, latency_ms: u64) -> ChoiceTrace {
    let (error_code, error) = match &record.outcome {
        ResponseOutcome::Failed {
            error_code,
            message,
        } => (Some(error_code.clone()), Some(message.clone())),
        _ => (None, None),
    };
    ChoiceTrace {
        run_id: run_id.to_string(),
        timestamp_ms: now_epoch_ms(),
        pair_index: index,
        product1_id: record.pair.product1_id.clone(),
        product2_id: record.pair.product2_id.clone(),
        prompt_hash: prompt_hash(&record.pair.prompt),
        response: record.outcome.response_cell().to_string(),
        raw_reply: record.raw_reply.clone(),
        error_code,
        error,
        latency_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ProviderError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<Vec<Result<String, ProviderError>>>,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<String, ProviderError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl ChoiceClient for Scripted {
        async fn query(&self, _prompt: &str) -> Result<String, ProviderError> {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("1".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingPacer {
        pauses: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Pacer for CountingPacer {
        async fn pause(&self, duration: Duration) {
            self.pauses.lock().unwrap().push(duration);
        }
    }

    fn pairs(n: usize) -> Vec<PairRecord> {
        (0..n)
            .map(|i| PairRecord {
                product1_id: format!("P{}", i + 1),
                product2_id: format!("P{}", i + 2),
                prompt: format!("prompt {i}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn pauses_before_every_call() {
        let client = Scripted::new(vec![]);
        let pacer = CountingPacer::default();
        let options = StudyOptions::new(Duration::from_secs(10), FailurePolicy::SkipAndContinue);

        let report = run_study(&client, &pacer, &pairs(3), &options, None, None).await;

        assert_eq!(report.records.len(), 3);
        assert_eq!(report.stop_reason, StudyStopReason::Completed);
        assert_eq!(*pacer.pauses.lock().unwrap(), vec![Duration::from_secs(10); 3]);
    }

    #[tokio::test]
    async fn unparsed_reply_is_data_not_failure() {
        let client = Scripted::new(vec![Ok("I'm not sure".into()), Ok("Option 2".into())]);
        let report = run_study(&client, &NoPause, &pairs(2), &StudyOptions::default(), None, None).await;

        assert_eq!(report.records[0].outcome, ResponseOutcome::Unparsed);
        assert_eq!(report.records[0].raw_reply.as_deref(), Some("I'm not sure"));
        assert_eq!(report.records[1].outcome.response_cell(), "2");
        assert_eq!(report.summary.failed, 0);
    }

    #[tokio::test]
    async fn abort_policy_keeps_prior_records() {
        let client = Scripted::new(vec![
            Ok("1".into()),
            Err(ProviderError::upstream("HTTP 500")),
            Ok("2".into()),
        ]);
        let options = StudyOptions::new(Duration::ZERO, FailurePolicy::Abort);
        let report = run_study(&client, &NoPause, &pairs(3), &options, None, None).await;

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].outcome.response_cell(), "1");
        assert!(report.records[1].outcome.is_failed());
        match report.stop_reason {
            StudyStopReason::Aborted {
                pair_index,
                ref error_code,
                ..
            } => {
                assert_eq!(pair_index, 1);
                assert_eq!(error_code, "upstream_error");
            }
            other => panic!("expected Aborted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn config_error_halts_even_when_skipping() {
        let client = Scripted::new(vec![Ok("0".into()), Err(ProviderError::config("no key"))]);
        let report = run_study(&client, &NoPause, &pairs(4), &StudyOptions::default(), None, None).await;

        assert_eq!(report.records.len(), 2);
        assert!(matches!(report.stop_reason, StudyStopReason::Aborted { pair_index: 1, .. }));
    }

    #[tokio::test]
    async fn cancel_before_start_processes_nothing() {
        let client = Scripted::new(vec![]);
        let cancel = CancelSignal::new();
        cancel.cancel();
        let report = run_study(
            &client,
            &NoPause,
            &pairs(5),
            &StudyOptions::default(),
            None,
            Some(&cancel),
        )
        .await;

        assert!(report.records.is_empty());
        assert_eq!(report.stop_reason, StudyStopReason::Cancelled);
    }

    struct CancelAfterFirst {
        cancel: CancelSignal,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ChoiceClient for CancelAfterFirst {
        async fn query(&self, _prompt: &str) -> Result<String, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            self.cancel.cancel();
            Ok("1".into())
        }
    }

    #[tokio::test]
    async fn cancel_mid_run_keeps_collected_records() {
        let flag = CancelSignal::new();
        let client = CancelAfterFirst {
            cancel: flag.clone(),
            calls: Mutex::new(0),
        };
        let report = run_study(
            &client,
            &NoPause,
            &pairs(5),
            &StudyOptions::default(),
            None,
            Some(&flag),
        )
        .await;

        assert_eq!(*client.calls.lock().unwrap(), 1);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.stop_reason, StudyStopReason::Cancelled);
    }

    fn cancel_soon(cancel: &CancelSignal) {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });
    }

    #[tokio::test]
    async fn cancel_interrupts_long_pause() {
        let client = Scripted::new(vec![]);
        let cancel = CancelSignal::new();
        let options = StudyOptions::new(Duration::from_secs(3600), FailurePolicy::SkipAndContinue);
        cancel_soon(&cancel);

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            run_study(&client, &TokioPacer, &pairs(3), &options, None, Some(&cancel)),
        )
        .await
        .expect("pause was not interrupted");

        assert!(report.records.is_empty());
        assert_eq!(report.stop_reason, StudyStopReason::Cancelled);
    }

    struct Hangs {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChoiceClient for Hangs {
        async fn query(&self, _prompt: &str) -> Result<String, ProviderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok("2".into());
            }
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn cancel_interrupts_in_flight_call() {
        let client = Hangs {
            calls: AtomicUsize::new(0),
        };
        let cancel = CancelSignal::new();
        cancel_soon(&cancel);

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            run_study(&client, &NoPause, &pairs(3), &StudyOptions::default(), None, Some(&cancel)),
        )
        .await
        .expect("call was not interrupted");

        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].outcome.response_cell(), "2");
        assert_eq!(report.stop_reason, StudyStopReason::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_resolves_for_late_waiters() {
        let cancel = CancelSignal::new();
        assert!(!cancel.is_cancelled());
        cancel.clone().cancel();
        assert!(cancel.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), cancel.cancelled())
            .await
            .unwrap();
    }
}
