//! Equalized odds: equality of true-positive and false-positive rates across groups.

use super::{AttributeMetric, MetricValue, group_metric};
use crate::aggregate::AttributeAggregate;

/// Spread (max - min) of the defined values, if at least two are defined.
fn spread(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    Some(max - min)
}

fn max_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

pub fn equalized_odds(aggregate: &AttributeAggregate) -> AttributeMetric {
    let eligible = aggregate.eligible().count();
    let tprs: Vec<f64> = aggregate
        .eligible()
        .filter_map(|g| g.counts.true_positive_rate())
        .collect();
    let fprs: Vec<f64> = aggregate
        .eligible()
        .filter_map(|g| g.counts.false_positive_rate())
        .collect();

    let combined = match (spread(&tprs), spread(&fprs)) {
        _ if eligible < 2 => None,
        (Some(t), Some(f)) => Some(t.max(f)),
        (Some(t), None) => Some(t),
        (None, Some(f)) => Some(f),
        (None, None) => None,
    };

    let best_tpr = max_of(&tprs);
    let best_fpr = max_of(&fprs);

    let groups = aggregate
        .groups
        .iter()
        .map(|g| {
            if combined.is_none() || !g.is_eligible() {
                return group_metric(g, MetricValue::Insufficient);
            }
            let tpr_gap = g
                .counts
                .true_positive_rate()
                .zip(best_tpr)
                .map(|(rate, best)| (rate - best).abs());
            let fpr_gap = g
                .counts
                .false_positive_rate()
                .zip(best_fpr)
                .map(|(rate, best)| (rate - best).abs());
            let gap = match (tpr_gap, fpr_gap) {
                (Some(t), Some(f)) => Some(t.max(f)),
                (t, f) => t.or(f),
            };
            group_metric(g, gap.map(|gap| 1.0 - gap).into())
        })
        .collect();

    AttributeMetric {
        attribute: aggregate.attribute.clone(),
        value: combined.map(|c| 1.0 - c).into(),
        groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{ConfusionCounts, GroupAggregate, GroupKey};

    fn group(name: &str, tp: usize, fn_: usize, fp: usize, tn: usize) -> GroupAggregate {
        GroupAggregate {
            key: GroupKey::new("gender", name),
            counts: ConfusionCounts {
                true_positive: tp,
                false_positive: fp,
                true_negative: tn,
                false_negative: fn_,
                total: tp + fn_ + fp + tn,
            },
            insufficient_sample: false,
            bins: Vec::new(),
        }
    }

    fn attribute(groups: Vec<GroupAggregate>) -> AttributeAggregate {
        AttributeAggregate {
            attribute: "gender".into(),
            groups,
        }
    }

    #[test]
    fn test_identical_rates() {
        let result = equalized_odds(&attribute(vec![
            group("a", 40, 10, 5, 45),
            group("b", 80, 20, 10, 90),
        ]));
        assert_eq!(result.value, MetricValue::Value(1.0));
        assert_eq!(result.group("b").unwrap().value, MetricValue::Value(1.0));
    }

    #[test]
    fn test_tpr_gap_dominates() {
        // TPR: a = 0.8, b = 0.5; FPR: a = 0.1, b = 0.2
        let result = equalized_odds(&attribute(vec![
            group("a", 40, 10, 5, 45),
            group("b", 25, 25, 10, 40),
        ]));
        let value = result.value.value().unwrap();
        assert!((value - 0.7).abs() < 1e-12);
        // a holds the best TPR but trails b's FPR by 0.1
        let a = result.group("a").unwrap().value.value().unwrap();
        assert!((a - 0.9).abs() < 1e-12);
        let b = result.group("b").unwrap().value.value().unwrap();
        assert!((b - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_widening_tpr_gap_lowers_value() {
        let mut previous = f64::INFINITY;
        for tp_b in (10..=40).rev().step_by(5) {
            let result = equalized_odds(&attribute(vec![
                group("a", 40, 10, 5, 45),
                group("b", tp_b, 50 - tp_b, 5, 45),
            ]));
            let value = result.value.value().unwrap();
            assert!(value < previous || tp_b == 40, "not decreasing at tp_b={tp_b}");
            previous = value;
        }
    }

    #[test]
    fn test_undefined_tpr_falls_back_to_fpr() {
        // No actual positives anywhere: only FPR is defined.
        let result = equalized_odds(&attribute(vec![
            group("a", 0, 0, 10, 90),
            group("b", 0, 0, 30, 70),
        ]));
        let value = result.value.value().unwrap();
        assert!((value - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_insufficient_when_single_group() {
        let result = equalized_odds(&attribute(vec![group("a", 40, 10, 5, 45)]));
        assert_eq!(result.value, MetricValue::Insufficient);
        assert_eq!(result.groups[0].value, MetricValue::Insufficient);
    }

    #[test]
    fn test_insufficient_sample_group_excluded() {
        let mut tiny = group("tiny", 0, 3, 2, 0);
        tiny.insufficient_sample = true;
        let result = equalized_odds(&attribute(vec![
            group("a", 40, 10, 5, 45),
            group("b", 40, 10, 5, 45),
            tiny,
        ]));
        assert_eq!(result.value, MetricValue::Value(1.0));
        assert_eq!(result.group("tiny").unwrap().value, MetricValue::Insufficient);
    }
}
