//! Fairness metric families computed from per-group aggregates.
//!
//! Every value lives in [0, 1] where 1.0 means no detected disparity. Each
//! family is computed per protected attribute, then [`combine`] folds the
//! attribute-level results into one [`MetricResult`] whose overall value is
//! the worst (minimum) attribute.

pub mod calibration;
pub mod equalized_odds;
pub mod parity;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::aggregate::AttributeAggregate;

/// A metric value, or the marker for "not enough data to say".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Value(f64),
    Insufficient,
}

impl MetricValue {
    /// Wrap `v`, clamping into [0, 1].
    pub fn clamped(v: f64) -> Self {
        MetricValue::Value(v.clamp(0.0, 1.0))
    }

    pub fn value(self) -> Option<f64> {
        match self {
            MetricValue::Value(v) => Some(v),
            MetricValue::Insufficient => None,
        }
    }

    pub fn is_insufficient(self) -> bool {
        matches!(self, MetricValue::Insufficient)
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(MetricValue::Insufficient, MetricValue::clamped)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Value(v) => write!(f, "{:.1}%", v * 100.0),
            MetricValue::Insufficient => write!(f, "insufficient"),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Value(v) => serializer.serialize_f64(*v),
            MetricValue::Insufficient => serializer.serialize_str("insufficient"),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(MetricValue::Value(v)),
            Repr::Text(t) if t == "insufficient" => Ok(MetricValue::Insufficient),
            Repr::Text(t) => Err(serde::de::Error::custom(format!(
                "expected a number or \"insufficient\", got \"{t}\""
            ))),
        }
    }
}

/// The three metric families, in canonical reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    DemographicParity,
    EqualizedOdds,
    Calibration,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [
        MetricKind::DemographicParity,
        MetricKind::EqualizedOdds,
        MetricKind::Calibration,
    ];

    /// Position in the canonical order; used as a ranking tie-break.
    pub fn order(self) -> usize {
        match self {
            MetricKind::DemographicParity => 0,
            MetricKind::EqualizedOdds => 1,
            MetricKind::Calibration => 2,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            MetricKind::DemographicParity => "Demographic Parity",
            MetricKind::EqualizedOdds => "Equalized Odds",
            MetricKind::Calibration => "Calibration",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::DemographicParity => write!(f, "demographicParity"),
            MetricKind::EqualizedOdds => write!(f, "equalizedOdds"),
            MetricKind::Calibration => write!(f, "calibration"),
        }
    }
}

/// One group's value within an attribute breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMetric {
    pub group: String,
    pub value: MetricValue,
    pub size: usize,
    pub insufficient_sample: bool,
}

/// Attribute-level value plus the per-group breakdown, groups in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMetric {
    pub attribute: String,
    pub value: MetricValue,
    pub groups: Vec<GroupMetric>,
}

impl AttributeMetric {
    pub fn group(&self, group: &str) -> Option<&GroupMetric> {
        self.groups.iter().find(|g| g.group == group)
    }

    /// Eligible groups with the lowest and highest values, if any have a value.
    pub fn extremes(&self) -> Option<(&GroupMetric, &GroupMetric)> {
        let mut valued = self
            .groups
            .iter()
            .filter(|g| !g.insufficient_sample)
            .filter_map(|g| g.value.value().map(|v| (g, v)));
        let (first, v) = valued.next()?;
        let (mut lo, mut hi) = ((first, v), (first, v));
        for (g, v) in valued {
            if v < lo.1 {
                lo = (g, v);
            }
            if v > hi.1 {
                hi = (g, v);
            }
        }
        Some((lo.0, hi.0))
    }
}

/// Result of one metric family across all analyzed attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricResult {
    #[serde(rename = "name")]
    pub kind: MetricKind,
    pub overall: MetricValue,
    pub by_group: Vec<AttributeMetric>,
}

impl MetricResult {
    pub fn attribute(&self, attribute: &str) -> Option<&AttributeMetric> {
        self.by_group.iter().find(|a| a.attribute == attribute)
    }

    /// Per-group value lookup.
    pub fn value(&self, attribute: &str, group: &str) -> Option<MetricValue> {
        self.attribute(attribute)?.group(group).map(|g| g.value)
    }
}

/// All three families for one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeScores {
    pub demographic_parity: AttributeMetric,
    pub equalized_odds: AttributeMetric,
    pub calibration: AttributeMetric,
}

impl AttributeScores {
    pub fn get(&self, kind: MetricKind) -> &AttributeMetric {
        match kind {
            MetricKind::DemographicParity => &self.demographic_parity,
            MetricKind::EqualizedOdds => &self.equalized_odds,
            MetricKind::Calibration => &self.calibration,
        }
    }
}

/// Compute every metric family for one attribute's aggregate.
pub fn score_attribute(aggregate: &AttributeAggregate) -> AttributeScores {
    AttributeScores {
        demographic_parity: parity::demographic_parity(aggregate),
        equalized_odds: equalized_odds::equalized_odds(aggregate),
        calibration: calibration::calibration(aggregate),
    }
}

/// Fold attribute-level results into one [`MetricResult`]; the worst attribute sets `overall`.
pub fn combine(kind: MetricKind, attributes: Vec<AttributeMetric>) -> MetricResult {
    let overall = attributes
        .iter()
        .filter_map(|a| a.value.value())
        .min_by(f64::total_cmp)
        .map_or(MetricValue::Insufficient, MetricValue::Value);
    MetricResult {
        kind,
        overall,
        by_group: attributes,
    }
}

/// Build the per-group entry for `group` with the given value.
pub(crate) fn group_metric(
    group: &crate::aggregate::GroupAggregate,
    value: MetricValue,
) -> GroupMetric {
    GroupMetric {
        group: group.key.group.clone(),
        value,
        size: group.counts.total,
        insufficient_sample: group.insufficient_sample,
    }
}
