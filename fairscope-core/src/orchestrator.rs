//! Analysis orchestrator: drives a dataset through aggregation, scoring and
//! recommendation.
//!
//! State machine:
//!
//! ```text
//! Idle -> Validating -> Aggregating -> Scoring -> Recommending -> Done
//!              \-> Failed           \-----------\------------\-> Cancelled
//! ```
//!
//! Each stage splits into independent units (one per attribute, or one per
//! metric family) that run on scoped worker threads over the read-only
//! dataset. Stages are strictly sequential because scoring's cross-attribute
//! minimum needs every attribute's aggregate. Cancellation is cooperative and
//! checked before every unit; a cancelled run never exposes partial metrics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::aggregate::aggregate;
use crate::config::AnalysisConfig;
use crate::dataset::Dataset;
use crate::error::ValidationError;
use crate::metrics::{MetricKind, MetricResult, combine, score_attribute};
use crate::progress::{NoopObserver, ProgressObserver, Stage, StageProgress};
use crate::recommend::{rank, recommend_for_metric};
use crate::result::{AnalysisOutcome, AnalysisResult};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    Idle,
    Validating,
    Aggregating,
    Scoring,
    Recommending,
    Done,
    Failed,
    Cancelled,
}

impl AnalysisState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AnalysisState::Done | AnalysisState::Failed | AnalysisState::Cancelled
        )
    }

    fn can_transition_to(self, next: AnalysisState) -> bool {
        use AnalysisState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Aggregating)
                | (Validating, Failed)
                | (Aggregating, Scoring)
                | (Scoring, Recommending)
                | (Recommending, Done)
                | (Aggregating | Scoring | Recommending, Cancelled)
                | (Aggregating | Scoring | Recommending, Failed)
        )
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisState::Idle => write!(f, "idle"),
            AnalysisState::Validating => write!(f, "validating"),
            AnalysisState::Aggregating => write!(f, "aggregating"),
            AnalysisState::Scoring => write!(f, "scoring"),
            AnalysisState::Recommending => write!(f, "recommending"),
            AnalysisState::Done => write!(f, "done"),
            AnalysisState::Failed => write!(f, "failed"),
            AnalysisState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Coordinates one analysis run.
pub struct AnalysisOrchestrator {
    config: AnalysisConfig,
    observer: Arc<dyn ProgressObserver>,
    cancellation: CancellationToken,
    state: AnalysisState,
}

impl AnalysisOrchestrator {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            observer: Arc::new(NoopObserver),
            cancellation: CancellationToken::new(),
            state: AnalysisState::Idle,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Token that cancels this run when triggered from any thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn state(&self) -> AnalysisState {
        self.state
    }

    fn transition(&mut self, next: AnalysisState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(from = %self.state, to = %next, "Analysis state transition");
        self.state = next;
    }

    /// Run the full pipeline over `dataset`.
    ///
    /// Validation failures return `Err` before any progress event is emitted.
    /// Cancellation is a normal outcome, reported as [`AnalysisOutcome::Cancelled`].
    pub fn run(&mut self, dataset: &Dataset) -> Result<AnalysisOutcome, ValidationError> {
        if self.state != AnalysisState::Idle {
            return Err(ValidationError::InvalidConfig {
                message: format!("orchestrator already used (state: {})", self.state),
            });
        }
        let run_id = Uuid::new_v4();
        let _span = tracing::info_span!("analysis", %run_id).entered();

        self.transition(AnalysisState::Validating);
        if let Err(e) = dataset.validate_for(&self.config) {
            tracing::warn!(error = %e, "Dataset rejected");
            self.transition(AnalysisState::Failed);
            return Err(e);
        }
        let attributes = self.config.protected_attributes.clone();
        tracing::info!(
            records = dataset.len(),
            attributes = ?attributes,
            "Starting fairness analysis"
        );

        self.transition(AnalysisState::Aggregating);
        let config = &self.config;
        let aggregates = match self.run_stage(Stage::Aggregating, &attributes, |attr| {
            aggregate(dataset, attr, config)
        }) {
            Some(results) => match results.into_iter().collect::<Result<Vec<_>, _>>() {
                Ok(aggregates) => aggregates,
                Err(e) => {
                    self.transition(AnalysisState::Failed);
                    return Err(e);
                }
            },
            None => return Ok(self.cancelled()),
        };

        self.transition(AnalysisState::Scoring);
        let Some(scores) = self.run_stage(Stage::Scoring, &aggregates, score_attribute) else {
            return Ok(self.cancelled());
        };
        drop(aggregates);

        let mut parity = Vec::with_capacity(scores.len());
        let mut odds = Vec::with_capacity(scores.len());
        let mut calibration = Vec::with_capacity(scores.len());
        for score in scores {
            parity.push(score.demographic_parity);
            odds.push(score.equalized_odds);
            calibration.push(score.calibration);
        }
        let metrics = vec![
            combine(MetricKind::DemographicParity, parity),
            combine(MetricKind::EqualizedOdds, odds),
            combine(MetricKind::Calibration, calibration),
        ];

        self.transition(AnalysisState::Recommending);
        let thresholds = self.config.thresholds;
        let Some(per_metric) = self.run_stage(Stage::Recommending, &metrics, |m: &MetricResult| {
            recommend_for_metric(m, &thresholds)
        }) else {
            return Ok(self.cancelled());
        };
        let mut recommendations: Vec<_> = per_metric.into_iter().flatten().collect();
        rank(&mut recommendations);

        self.transition(AnalysisState::Done);
        tracing::info!(
            recommendations = recommendations.len(),
            "Fairness analysis complete"
        );
        Ok(AnalysisOutcome::Completed(AnalysisResult {
            run_id,
            timestamp: chrono::Utc::now(),
            record_count: dataset.len(),
            protected_attributes: attributes,
            metrics,
            recommendations,
        }))
    }

    fn cancelled(&mut self) -> AnalysisOutcome {
        tracing::warn!(state = %self.state, "Analysis cancelled");
        self.transition(AnalysisState::Cancelled);
        AnalysisOutcome::Cancelled
    }

    /// Run `work` over every item on up to `max_workers` scoped threads.
    ///
    /// Results come back in item order. Returns `None` if cancellation was
    /// observed at any point during the stage.
    fn run_stage<I, T, F>(&self, stage: Stage, items: &[I], work: F) -> Option<Vec<T>>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> T + Sync,
    {
        if self.cancellation.is_cancelled() {
            return None;
        }
        let progress = StageProgress::new(stage, items.len(), self.observer.as_ref());
        let next = AtomicUsize::new(0);
        let worker = || {
            let mut done = Vec::new();
            loop {
                if self.cancellation.is_cancelled() {
                    break;
                }
                let idx = next.fetch_add(1, Ordering::Relaxed);
                let Some(item) = items.get(idx) else {
                    break;
                };
                tracing::trace!(%stage, unit = idx, "Starting unit");
                done.push((idx, work(item)));
                progress.unit_done();
            }
            done
        };

        let workers = self.config.worker_count(items.len());
        let finished: Vec<(usize, T)> = if workers <= 1 {
            worker()
        } else {
            std::thread::scope(|s| {
                let handles: Vec<_> = (0..workers).map(|_| s.spawn(&worker)).collect();
                handles
                    .into_iter()
                    .flat_map(|h| match h.join() {
                        Ok(done) => done,
                        Err(panic) => std::panic::resume_unwind(panic),
                    })
                    .collect()
            })
        };

        if self.cancellation.is_cancelled() {
            return None;
        }
        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(items.len()).collect();
        for (idx, value) in finished {
            slots[idx] = Some(value);
        }
        slots.into_iter().collect()
    }
}

/// Run an analysis with a caller-supplied observer and cancellation token.
pub fn run_analysis(
    dataset: &Dataset,
    config: AnalysisConfig,
    observer: Arc<dyn ProgressObserver>,
    cancellation: CancellationToken,
) -> Result<AnalysisOutcome, ValidationError> {
    AnalysisOrchestrator::new(config)
        .with_observer(observer)
        .with_cancellation(cancellation)
        .run(dataset)
}

/// Run an analysis to completion without progress reporting.
pub fn analyze(dataset: &Dataset, config: AnalysisConfig) -> Result<AnalysisResult, ValidationError> {
    let outcome = AnalysisOrchestrator::new(config).run(dataset)?;
    match outcome {
        AnalysisOutcome::Completed(result) => Ok(result),
        // Nothing else holds this run's token.
        AnalysisOutcome::Cancelled => unreachable!("private cancellation token was triggered"),
    }
}
