//! Executive roll-up of an analysis result.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::metrics::{MetricKind, MetricValue};
use crate::recommend::RecommendationSeverity;
use crate::result::AnalysisResult;
use crate::severity::{Severity, SeverityThresholds};

/// Coarse risk label for stakeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    NotAnalyzed,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low Risk"),
            RiskLevel::Moderate => write!(f, "Moderate Risk"),
            RiskLevel::High => write!(f, "High Risk"),
            RiskLevel::NotAnalyzed => write!(f, "Not Analyzed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricStatus {
    pub kind: MetricKind,
    pub value: MetricValue,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairnessSummary {
    /// Mean of the metric overalls that could be computed.
    pub overall_fairness: MetricValue,
    pub overall_severity: Severity,
    pub risk_level: RiskLevel,
    pub metrics: Vec<MetricStatus>,
    pub critical_count: usize,
    pub moderate_count: usize,
    pub insufficient_groups: usize,
}

impl FairnessSummary {
    pub fn from_result(result: &AnalysisResult, thresholds: &SeverityThresholds) -> Self {
        let metrics: Vec<MetricStatus> = result
            .metrics
            .iter()
            .map(|m| MetricStatus {
                kind: m.kind,
                value: m.overall,
                severity: thresholds.classify(m.overall),
            })
            .collect();

        let values: Vec<f64> = metrics.iter().filter_map(|m| m.value.value()).collect();
        let overall_fairness = if values.is_empty() {
            MetricValue::Insufficient
        } else {
            MetricValue::clamped(values.iter().sum::<f64>() / values.len() as f64)
        };

        let severities: Vec<Severity> = metrics.iter().map(|m| m.severity).collect();
        let risk_level = if severities.contains(&Severity::Error) {
            RiskLevel::High
        } else if severities.contains(&Severity::Warning) {
            RiskLevel::Moderate
        } else if severities.contains(&Severity::Success) {
            RiskLevel::Low
        } else {
            RiskLevel::NotAnalyzed
        };

        let count = |severity| {
            result
                .recommendations
                .iter()
                .filter(|r| r.severity == severity)
                .count()
        };

        // Calibration carries every group with its sample flag; count there once.
        let insufficient_groups = result
            .metric(MetricKind::Calibration)
            .map(|m| {
                m.by_group
                    .iter()
                    .flat_map(|a| &a.groups)
                    .filter(|g| g.insufficient_sample)
                    .count()
            })
            .unwrap_or(0);

        Self {
            overall_severity: thresholds.classify(overall_fairness),
            overall_fairness,
            risk_level,
            metrics,
            critical_count: count(RecommendationSeverity::Critical),
            moderate_count: count(RecommendationSeverity::Moderate),
            insufficient_groups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricResult;
    use chrono::Utc;
    use uuid::Uuid;

    fn result(values: [MetricValue; 3]) -> AnalysisResult {
        AnalysisResult {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            record_count: 100,
            protected_attributes: vec!["gender".into()],
            metrics: MetricKind::ALL
                .iter()
                .zip(values)
                .map(|(&kind, overall)| MetricResult {
                    kind,
                    overall,
                    by_group: Vec::new(),
                })
                .collect(),
            recommendations: Vec::new(),
        }
    }

    #[test]
    fn test_risk_levels() {
        let t = SeverityThresholds::default();
        let v = MetricValue::Value;
        let summary = FairnessSummary::from_result(&result([v(0.9), v(0.6), v(0.95)]), &t);
        assert_eq!(summary.risk_level, RiskLevel::High);

        let summary = FairnessSummary::from_result(&result([v(0.9), v(0.75), v(0.95)]), &t);
        assert_eq!(summary.risk_level, RiskLevel::Moderate);

        let summary = FairnessSummary::from_result(&result([v(0.9), v(0.85), v(0.95)]), &t);
        assert_eq!(summary.risk_level, RiskLevel::Low);
        assert_eq!(summary.overall_severity, Severity::Success);

        let i = MetricValue::Insufficient;
        let summary = FairnessSummary::from_result(&result([i, i, i]), &t);
        assert_eq!(summary.risk_level, RiskLevel::NotAnalyzed);
        assert_eq!(summary.overall_fairness, MetricValue::Insufficient);
    }

    #[test]
    fn test_overall_fairness_is_mean_of_available() {
        let t = SeverityThresholds::default();
        let summary = FairnessSummary::from_result(
            &result([
                MetricValue::Value(0.8),
                MetricValue::Insufficient,
                MetricValue::Value(0.6),
            ]),
            &t,
        );
        let overall = summary.overall_fairness.value().unwrap();
        assert!((overall - 0.7).abs() < 1e-12);
        assert_eq!(RiskLevel::Moderate.to_string(), "Moderate Risk");
    }
}
