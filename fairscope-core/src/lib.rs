//! # Fairscope Core
//!
//! Fairness auditing engine for binary classifiers. Given model scores,
//! ground-truth labels and protected-attribute memberships, it computes
//! group-disaggregated demographic parity, equalized odds and calibration,
//! classifies each value's severity, and produces a deterministic, ranked
//! list of remediation recommendations.
//!
//! All metric values follow one convention: 1.0 means no detected disparity,
//! lower means more disparity.

pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod progress;
pub mod recommend;
pub mod result;
pub mod severity;
pub mod source;
pub mod summary;

// Re-export commonly used types at the crate root.
pub use aggregate::{AttributeAggregate, ConfusionCounts, GroupAggregate, GroupKey};
pub use config::{AnalysisConfig, load_config};
pub use dataset::{Dataset, Record};
pub use error::{FairscopeError, Result, SourceError, ValidationError};
pub use metrics::{AttributeMetric, GroupMetric, MetricKind, MetricResult, MetricValue};
pub use orchestrator::{AnalysisOrchestrator, AnalysisState, analyze, run_analysis};
pub use progress::{NoopObserver, ProgressEvent, ProgressObserver, Stage};
pub use recommend::{Recommendation, RecommendationSeverity};
pub use result::{AnalysisOutcome, AnalysisResult};
pub use severity::{Severity, SeverityThresholds, classify};
pub use source::{CsvColumns, DatasetFormat, DatasetSource};
pub use summary::{FairnessSummary, RiskLevel};
pub use tokio_util::sync::CancellationToken;
