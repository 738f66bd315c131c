//! Progress reporting contract between the orchestrator and its caller.
//!
//! The engine knows nothing about rendering; it hands `(stage, completed, total)`
//! events to whatever [`ProgressObserver`] the caller supplies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// Stages of an analysis run that emit progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Aggregating,
    Scoring,
    Recommending,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Aggregating => write!(f, "aggregating"),
            Stage::Scoring => write!(f, "scoring"),
            Stage::Recommending => write!(f, "recommending"),
        }
    }
}

/// One finished unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub completed: usize,
    pub total: usize,
}

impl ProgressEvent {
    /// Fraction of the stage finished, in [0, 1].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Sink for progress events. Called from worker threads.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

/// Observer that discards every event.
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _event: ProgressEvent) {}
}

impl<F> ProgressObserver for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: ProgressEvent) {
        self(event)
    }
}

impl ProgressObserver for tokio::sync::mpsc::UnboundedSender<ProgressEvent> {
    fn on_progress(&self, event: ProgressEvent) {
        // A closed receiver only means nobody is watching any more.
        let _ = self.send(event);
    }
}

/// Per-stage completion counter.
///
/// Incrementing and delivering happen under one lock so observers see
/// `completed` strictly increasing within a stage, whichever thread finishes.
pub(crate) struct StageProgress<'a> {
    stage: Stage,
    total: usize,
    completed: Mutex<usize>,
    observer: &'a dyn ProgressObserver,
}

impl<'a> StageProgress<'a> {
    pub(crate) fn new(stage: Stage, total: usize, observer: &'a dyn ProgressObserver) -> Self {
        Self {
            stage,
            total,
            completed: Mutex::new(0),
            observer,
        }
    }

    pub(crate) fn unit_done(&self) {
        let mut completed = self
            .completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *completed += 1;
        self.observer.on_progress(ProgressEvent {
            stage: self.stage,
            completed: *completed,
            total: self.total,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_closure_observer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer = move |event: ProgressEvent| sink.lock().unwrap().push(event);
        let progress = StageProgress::new(Stage::Scoring, 2, &observer);
        progress.unit_done();
        progress.unit_done();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].completed, 2);
        assert_eq!(seen[1].stage, Stage::Scoring);
    }

    #[test]
    fn test_monotonic_across_threads() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer = move |event: ProgressEvent| sink.lock().unwrap().push(event.completed);
        let progress = StageProgress::new(Stage::Aggregating, 16, &observer);
        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| progress.unit_done());
            }
        });
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (1..=16).collect::<Vec<_>>());
    }

    #[test]
    fn test_channel_observer() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.on_progress(ProgressEvent {
            stage: Stage::Recommending,
            completed: 1,
            total: 3,
        });
        let event = rx.try_recv().unwrap();
        assert!((event.fraction() - 1.0 / 3.0).abs() < 1e-12);
        drop(rx);
        // Sending after the receiver is gone is not an error for the engine.
        tx.on_progress(event);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Aggregating.to_string(), "aggregating");
        assert_eq!(
            serde_json::to_string(&Stage::Recommending).unwrap(),
            r#""recommending""#
        );
    }
}
