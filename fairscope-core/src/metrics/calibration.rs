//! Calibration: agreement between predicted probability and observed outcome
//! frequency, measured per group as Expected Calibration Error (ECE).

use super::{AttributeMetric, MetricValue, group_metric};
use crate::aggregate::{AttributeAggregate, GroupAggregate};

/// Occupancy-weighted mean gap between predicted mean and observed rate over non-empty bins.
pub fn expected_calibration_error(group: &GroupAggregate) -> Option<f64> {
    let total: usize = group.bins.iter().map(|b| b.count).sum();
    if total == 0 {
        return None;
    }
    let weighted: f64 = group
        .bins
        .iter()
        .filter_map(|bin| {
            let gap = (bin.observed_rate()? - bin.predicted_mean()?).abs();
            Some(bin.count as f64 * gap)
        })
        .sum();
    Some(weighted / total as f64)
}

pub fn calibration(aggregate: &AttributeAggregate) -> AttributeMetric {
    let mut weighted_error = 0.0;
    let mut weight = 0usize;

    let groups = aggregate
        .groups
        .iter()
        .map(|g| {
            let ece = if g.is_eligible() {
                expected_calibration_error(g)
            } else {
                None
            };
            if let Some(ece) = ece {
                weighted_error += g.counts.total as f64 * ece;
                weight += g.counts.total;
            }
            group_metric(g, ece.map(|e| 1.0 - e).into())
        })
        .collect();

    let value = (weight > 0).then(|| 1.0 - weighted_error / weight as f64);

    AttributeMetric {
        attribute: aggregate.attribute.clone(),
        value: value.into(),
        groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{ConfusionCounts, GroupKey, ScoreBin, bin_index};

    /// Build a group from (score, positives, count) triples over 10 bins.
    fn group(name: &str, cells: &[(f64, usize, usize)], insufficient: bool) -> GroupAggregate {
        let mut bins = vec![ScoreBin::default(); 10];
        let mut total = 0;
        for &(score, positives, count) in cells {
            let bin = &mut bins[bin_index(score, 10)];
            bin.count += count;
            bin.score_sum += score * count as f64;
            bin.positives += positives;
            total += count;
        }
        GroupAggregate {
            key: GroupKey::new("age", name),
            counts: ConfusionCounts {
                total,
                ..ConfusionCounts::default()
            },
            insufficient_sample: insufficient,
            bins,
        }
    }

    fn attribute(groups: Vec<GroupAggregate>) -> AttributeAggregate {
        AttributeAggregate {
            attribute: "age".into(),
            groups,
        }
    }

    #[test]
    fn test_perfect_calibration() {
        let result = calibration(&attribute(vec![
            group("young", &[(0.25, 5, 20), (0.75, 15, 20)], false),
            group("old", &[(0.5, 20, 40)], false),
        ]));
        assert_eq!(result.value, MetricValue::Value(1.0));
        assert_eq!(result.group("young").unwrap().value, MetricValue::Value(1.0));
    }

    #[test]
    fn test_ece_weighting() {
        // Bin at 0.9 observes 0.5 (gap 0.4, weight 10); bin at 0.5 observes 0.5 (gap 0, weight 30).
        let g = group("a", &[(0.9, 5, 10), (0.5, 15, 30)], false);
        let ece = expected_calibration_error(&g).unwrap();
        assert!((ece - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_overall_is_size_weighted() {
        let result = calibration(&attribute(vec![
            // ECE 0.4, size 10
            group("a", &[(0.9, 5, 10)], false),
            // ECE 0.0, size 30
            group("b", &[(0.5, 15, 30)], false),
        ]));
        let value = result.value.value().unwrap();
        assert!((value - 0.9).abs() < 1e-12);
        let a = result.group("a").unwrap().value.value().unwrap();
        assert!((a - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_small_groups_are_insufficient() {
        let result = calibration(&attribute(vec![
            group("big", &[(0.5, 20, 40)], false),
            group("tiny", &[(0.9, 0, 5)], true),
        ]));
        assert_eq!(result.value, MetricValue::Value(1.0));
        assert_eq!(result.group("tiny").unwrap().value, MetricValue::Insufficient);

        let result = calibration(&attribute(vec![group("tiny", &[(0.9, 0, 5)], true)]));
        assert_eq!(result.value, MetricValue::Insufficient);
    }
}
