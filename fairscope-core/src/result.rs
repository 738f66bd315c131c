//! The artifact handed back to callers at the end of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::{MetricKind, MetricResult};
use crate::recommend::Recommendation;

/// Metrics and ranked recommendations for one dataset. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub record_count: usize,
    pub protected_attributes: Vec<String>,
    /// Always demographic parity, equalized odds, calibration, in that order.
    pub metrics: Vec<MetricResult>,
    pub recommendations: Vec<Recommendation>,
}

impl AnalysisResult {
    pub fn metric(&self, kind: MetricKind) -> Option<&MetricResult> {
        self.metrics.iter().find(|m| m.kind == kind)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Terminal outcome of a run that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Completed(AnalysisResult),
    /// Cancelled between units of work; no partial result is exposed.
    Cancelled,
}

impl AnalysisOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisOutcome::Cancelled)
    }

    pub fn into_result(self) -> Option<AnalysisResult> {
        match self {
            AnalysisOutcome::Completed(result) => Some(result),
            AnalysisOutcome::Cancelled => None,
        }
    }
}
