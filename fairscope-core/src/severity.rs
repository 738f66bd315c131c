//! Severity tiers for fairness metric values.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::metrics::MetricValue;

/// Outcome of classifying a single metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Warning,
    Error,
    Insufficient,
}

impl Severity {
    /// Whether this tier should trigger a remediation recommendation.
    pub fn is_violation(self) -> bool {
        matches!(self, Severity::Warning | Severity::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Success => write!(f, "success"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Insufficient => write!(f, "insufficient"),
        }
    }
}

/// Lower bounds of the `success` and `warning` tiers.
///
/// Values at or above `success` pass, values in `[warning, success)` warn,
/// anything lower is an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    #[serde(default = "default_success")]
    pub success: f64,
    #[serde(default = "default_warning")]
    pub warning: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            success: default_success(),
            warning: default_warning(),
        }
    }
}

fn default_success() -> f64 {
    0.8
}

fn default_warning() -> f64 {
    0.7
}

impl SeverityThresholds {
    pub fn new(success: f64, warning: f64) -> Result<Self, ValidationError> {
        let thresholds = Self { success, warning };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Both bounds must lie in [0, 1] with `warning <= success`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, value) in [("success", self.success), ("warning", self.warning)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::ThresholdOutOfRange {
                    name: name.into(),
                    value,
                });
            }
        }
        if self.warning > self.success {
            return Err(ValidationError::InvalidConfig {
                message: format!(
                    "warning threshold {} exceeds success threshold {}",
                    self.warning, self.success
                ),
            });
        }
        Ok(())
    }

    /// Map a metric value onto its severity tier.
    pub fn classify(&self, value: MetricValue) -> Severity {
        match value {
            MetricValue::Insufficient => Severity::Insufficient,
            MetricValue::Value(v) if v >= self.success => Severity::Success,
            MetricValue::Value(v) if v >= self.warning => Severity::Warning,
            MetricValue::Value(_) => Severity::Error,
        }
    }
}

/// Classify with the default thresholds.
pub fn classify(value: MetricValue) -> Severity {
    SeverityThresholds::default().classify(value)
}
