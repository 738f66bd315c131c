//! Demographic parity: equality of positive-prediction rates across groups.
//!
//! The attribute value is the four-fifths-rule ratio `min_rate / max_rate`
//! over eligible groups; each group is reported relative to the most-favored
//! group's rate.

use super::{AttributeMetric, MetricValue, group_metric};
use crate::aggregate::AttributeAggregate;

pub fn demographic_parity(aggregate: &AttributeAggregate) -> AttributeMetric {
    let rates: Vec<f64> = aggregate
        .eligible()
        .filter_map(|g| g.counts.positive_rate())
        .collect();

    let max_rate = rates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_rate = rates.iter().copied().fold(f64::INFINITY, f64::min);

    // Fewer than two comparable groups, or nobody selected at all: the ratio is undefined.
    let defined = rates.len() >= 2 && max_rate > 0.0;
    if !defined {
        tracing::debug!(
            attribute = %aggregate.attribute,
            eligible = rates.len(),
            "Demographic parity undefined for attribute"
        );
    }

    let groups = aggregate
        .groups
        .iter()
        .map(|g| {
            let value = match g.counts.positive_rate() {
                Some(rate) if defined && g.is_eligible() => MetricValue::clamped(rate / max_rate),
                _ => MetricValue::Insufficient,
            };
            group_metric(g, value)
        })
        .collect();

    AttributeMetric {
        attribute: aggregate.attribute.clone(),
        value: if defined {
            MetricValue::clamped(min_rate / max_rate)
        } else {
            MetricValue::Insufficient
        },
        groups,
    }
}
