//! Remediation recommendations derived from classified metrics.
//!
//! A fixed rule table maps each (metric, severity) pair to a title template and
//! an action set. Rules fire per attribute, only for `warning` and `error`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::metrics::{AttributeMetric, MetricKind, MetricResult};
use crate::severity::{Severity, SeverityThresholds};

/// Priority of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSeverity {
    Critical,
    Moderate,
    Info,
}

impl RecommendationSeverity {
    fn rank(self) -> u8 {
        match self {
            RecommendationSeverity::Critical => 0,
            RecommendationSeverity::Moderate => 1,
            RecommendationSeverity::Info => 2,
        }
    }
}

impl fmt::Display for RecommendationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationSeverity::Critical => write!(f, "critical"),
            RecommendationSeverity::Moderate => write!(f, "moderate"),
            RecommendationSeverity::Info => write!(f, "info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub severity: RecommendationSeverity,
    pub title: String,
    pub description: String,
    pub actions: Vec<String>,
    pub source_metric: MetricKind,
    pub attribute: String,
    /// `1 - value` of the attribute that triggered the rule; larger is worse.
    pub magnitude: f64,
}

struct Rule {
    kind: MetricKind,
    severity: Severity,
    title: &'static str,
    actions: &'static [&'static str],
}

const RULES: &[Rule] = &[
    Rule {
        kind: MetricKind::DemographicParity,
        severity: Severity::Error,
        title: "Demographic Parity Violation",
        actions: &[
            "Rebalance the training data across groups during preprocessing",
            "Apply reweighing so every group contributes equally to the training objective",
        ],
    },
    Rule {
        kind: MetricKind::DemographicParity,
        severity: Severity::Warning,
        title: "Demographic Parity Risk",
        actions: &[
            "Monitor per-group selection rates in production",
            "Use fairness-aware sampling when assembling training data",
        ],
    },
    Rule {
        kind: MetricKind::EqualizedOdds,
        severity: Severity::Error,
        title: "Equalized Odds Violation",
        actions: &[
            "Add fairness constraints to model training",
            "Apply post-hoc decision threshold adjustment per group",
        ],
    },
    Rule {
        kind: MetricKind::EqualizedOdds,
        severity: Severity::Warning,
        title: "Equalized Odds Risk",
        actions: &["Tune decision thresholds per group to align error rates"],
    },
    Rule {
        kind: MetricKind::Calibration,
        severity: Severity::Error,
        title: "Calibration Failure",
        actions: &["Recalibrate scores per group (e.g. isotonic regression)"],
    },
    Rule {
        kind: MetricKind::Calibration,
        severity: Severity::Warning,
        title: "Calibration Drift",
        actions: &["Monitor calibration per group over time"],
    },
];

fn rule_for(kind: MetricKind, severity: Severity) -> Option<&'static Rule> {
    RULES
        .iter()
        .find(|r| r.kind == kind && r.severity == severity)
}

fn describe(kind: MetricKind, metric: &AttributeMetric, value: f64) -> String {
    let attribute = &metric.attribute;
    let pct = value * 100.0;
    let extremes = metric.extremes();
    match (kind, extremes) {
        (MetricKind::DemographicParity, Some((lo, hi))) => format!(
            "Group '{}' receives positive predictions at {pct:.1}% of the rate of group '{}' \
             on '{attribute}'; the four-fifths rule expects at least 80%.",
            lo.group, hi.group
        ),
        (MetricKind::EqualizedOdds, Some((lo, hi))) => format!(
            "True- and false-positive rates diverge across '{attribute}' groups by up to {:.1} \
             points; group '{}' is furthest from the best-treated group '{}'.",
            100.0 - pct,
            lo.group,
            hi.group
        ),
        (MetricKind::Calibration, Some((lo, _))) => format!(
            "Predicted probabilities for '{attribute}' groups diverge from observed outcomes \
             (calibration {pct:.1}%); group '{}' is the least calibrated.",
            lo.group
        ),
        (kind, None) => format!(
            "{} on '{attribute}' scored {pct:.1}%.",
            kind.display_name()
        ),
    }
}

/// Apply the rule table to one attribute's value for `kind`.
pub fn recommend(
    kind: MetricKind,
    metric: &AttributeMetric,
    thresholds: &SeverityThresholds,
) -> Option<Recommendation> {
    let severity = thresholds.classify(metric.value);
    let value = metric.value.value()?;
    let rule = rule_for(kind, severity)?;
    let severity = match severity {
        Severity::Error => RecommendationSeverity::Critical,
        Severity::Warning => RecommendationSeverity::Moderate,
        Severity::Success | Severity::Insufficient => return None,
    };
    Some(Recommendation {
        severity,
        title: format!("{}: {}", rule.title, metric.attribute),
        description: describe(kind, metric, value),
        actions: rule.actions.iter().map(|a| a.to_string()).collect(),
        source_metric: kind,
        attribute: metric.attribute.clone(),
        magnitude: 1.0 - value,
    })
}

/// All recommendations triggered by one metric family, in attribute order.
pub fn recommend_for_metric(
    result: &MetricResult,
    thresholds: &SeverityThresholds,
) -> Vec<Recommendation> {
    result
        .by_group
        .iter()
        .filter_map(|attr| recommend(result.kind, attr, thresholds))
        .collect()
}

/// Ranking order: severity, then magnitude descending, then canonical metric order.
pub fn compare(a: &Recommendation, b: &Recommendation) -> Ordering {
    a.severity
        .rank()
        .cmp(&b.severity.rank())
        .then_with(|| b.magnitude.total_cmp(&a.magnitude))
        .then_with(|| a.source_metric.order().cmp(&b.source_metric.order()))
}

/// Sort in place. Stable, so equal entries keep their attribute order.
pub fn rank(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(compare);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{GroupMetric, MetricValue};
    use pretty_assertions::assert_eq;

    fn metric(attribute: &str, value: f64) -> AttributeMetric {
        AttributeMetric {
            attribute: attribute.into(),
            value: MetricValue::Value(value),
            groups: vec![
                GroupMetric {
                    group: "a".into(),
                    value: MetricValue::Value(1.0),
                    size: 100,
                    insufficient_sample: false,
                },
                GroupMetric {
                    group: "b".into(),
                    value: MetricValue::Value(value),
                    size: 100,
                    insufficient_sample: false,
                },
            ],
        }
    }

    #[test]
    fn test_rule_table_is_complete() {
        for kind in MetricKind::ALL {
            assert!(rule_for(kind, Severity::Error).is_some());
            assert!(rule_for(kind, Severity::Warning).is_some());
            assert!(rule_for(kind, Severity::Success).is_none());
        }
    }

    #[test]
    fn test_error_maps_to_critical() {
        let thresholds = SeverityThresholds::default();
        let rec = recommend(
            MetricKind::DemographicParity,
            &metric("gender", 0.5),
            &thresholds,
        )
        .unwrap();
        assert_eq!(rec.severity, RecommendationSeverity::Critical);
        assert_eq!(rec.title, "Demographic Parity Violation: gender");
        assert_eq!(rec.magnitude, 0.5);
        assert_eq!(rec.actions.len(), 2);
        assert!(rec.description.contains("'b'"));
        assert!(rec.description.contains("50.0%"));
    }

    #[test]
    fn test_warning_maps_to_moderate() {
        let thresholds = SeverityThresholds::default();
        let rec = recommend(MetricKind::Calibration, &metric("age", 0.75), &thresholds).unwrap();
        assert_eq!(rec.severity, RecommendationSeverity::Moderate);
        assert_eq!(rec.title, "Calibration Drift: age");
    }

    #[test]
    fn test_no_recommendation_for_success_or_insufficient() {
        let thresholds = SeverityThresholds::default();
        assert!(recommend(MetricKind::EqualizedOdds, &metric("age", 0.95), &thresholds).is_none());
        let mut insufficient = metric("age", 0.1);
        insufficient.value = MetricValue::Insufficient;
        assert!(recommend(MetricKind::EqualizedOdds, &insufficient, &thresholds).is_none());
    }

    #[test]
    fn test_ranking_order() {
        let thresholds = SeverityThresholds::default();
        let mut recs = vec![
            recommend(MetricKind::Calibration, &metric("age", 0.75), &thresholds).unwrap(),
            recommend(MetricKind::EqualizedOdds, &metric("race", 0.6), &thresholds).unwrap(),
            recommend(MetricKind::DemographicParity, &metric("race", 0.6), &thresholds).unwrap(),
            recommend(MetricKind::DemographicParity, &metric("gender", 0.4), &thresholds).unwrap(),
            recommend(MetricKind::EqualizedOdds, &metric("gender", 0.72), &thresholds).unwrap(),
        ];
        rank(&mut recs);
        let titles: Vec<_> = recs.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Demographic Parity Violation: gender",
                "Demographic Parity Violation: race",
                "Equalized Odds Violation: race",
                "Equalized Odds Risk: gender",
                "Calibration Drift: age",
            ]
        );
    }
}
