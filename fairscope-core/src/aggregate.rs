//! Per-group confusion counts for one protected attribute.
//!
//! A single pass over the dataset buckets every record by its group value,
//! fills the confusion cell for (predicted, actual), and accumulates the
//! record's score into that group's calibration histogram.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{AnalysisConfig, MAX_BINS};
use crate::dataset::Dataset;
use crate::error::ValidationError;

/// (attribute, group value) pair identifying one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub attribute: String,
    pub group: String,
}

impl GroupKey {
    pub fn new(attribute: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            group: group.into(),
        }
    }
}

/// Confusion-matrix cells for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
    pub total: usize,
}

impl ConfusionCounts {
    pub fn record(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.true_positive += 1,
            (true, false) => self.false_positive += 1,
            (false, false) => self.true_negative += 1,
            (false, true) => self.false_negative += 1,
        }
        self.total += 1;
    }

    pub fn positive_predictions(&self) -> usize {
        self.true_positive + self.false_positive
    }

    /// Share of the group receiving a positive prediction. `None` for an empty group.
    pub fn positive_rate(&self) -> Option<f64> {
        ratio(self.positive_predictions(), self.total)
    }

    /// True-positive rate. `None` when the group has no actual positives.
    pub fn true_positive_rate(&self) -> Option<f64> {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    /// False-positive rate. `None` when the group has no actual negatives.
    pub fn false_positive_rate(&self) -> Option<f64> {
        ratio(self.false_positive, self.false_positive + self.true_negative)
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

/// Occupancy of one calibration bin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBin {
    pub count: usize,
    pub score_sum: f64,
    /// Running Neumaier correction for `score_sum`.
    #[serde(default)]
    pub score_compensation: f64,
    pub positives: usize,
}

impl ScoreBin {
    /// Add one record's score and outcome.
    pub fn add(&mut self, score: f64, positive: bool) {
        let sum = self.score_sum + score;
        if self.score_sum.abs() >= score.abs() {
            self.score_compensation += (self.score_sum - sum) + score;
        } else {
            self.score_compensation += (score - sum) + self.score_sum;
        }
        self.score_sum = sum;
        self.count += 1;
        if positive {
            self.positives += 1;
        }
    }

    pub fn predicted_mean(&self) -> Option<f64> {
        (self.count > 0).then(|| (self.score_sum + self.score_compensation) / self.count as f64)
    }

    pub fn observed_rate(&self) -> Option<f64> {
        ratio(self.positives, self.count)
    }
}

/// Index of the equal-width bin over [0, 1] holding `score`. A score of 1.0 lands in the last bin.
pub fn bin_index(score: f64, bins: usize) -> usize {
    let idx = (score * bins as f64).floor() as usize;
    idx.min(bins.saturating_sub(1))
}

/// Everything the metric families need to know about one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAggregate {
    pub key: GroupKey,
    pub counts: ConfusionCounts,
    /// Set when `counts.total` is below the configured minimum group size.
    pub insufficient_sample: bool,
    pub bins: Vec<ScoreBin>,
}

impl GroupAggregate {
    pub fn is_eligible(&self) -> bool {
        !self.insufficient_sample
    }
}

/// Groups of one attribute, in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeAggregate {
    pub attribute: String,
    pub groups: Vec<GroupAggregate>,
}

impl AttributeAggregate {
    pub fn get(&self, group: &str) -> Option<&GroupAggregate> {
        self.groups.iter().find(|g| g.key.group == group)
    }

    pub fn eligible(&self) -> impl Iterator<Item = &GroupAggregate> {
        self.groups.iter().filter(|g| g.is_eligible())
    }
}

/// Aggregate confusion counts and score histograms for a single protected attribute.
pub fn aggregate(
    dataset: &Dataset,
    attribute: &str,
    config: &AnalysisConfig,
) -> Result<AttributeAggregate, ValidationError> {
    if !dataset.has_attribute(attribute) {
        return Err(ValidationError::UnknownAttribute {
            name: attribute.to_string(),
        });
    }
    if config.bins > MAX_BINS {
        return Err(ValidationError::InvalidConfig {
            message: format!("bins = {} exceeds the maximum of {MAX_BINS}", config.bins),
        });
    }
    let threshold = dataset.effective_threshold(config);
    let bins = config.bins.max(1);

    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<GroupAggregate> = Vec::new();

    for (i, record) in dataset.records.iter().enumerate() {
        let group = record
            .group(attribute)
            .ok_or_else(|| ValidationError::MissingAttribute {
                index: i,
                attribute: attribute.to_string(),
            })?;
        let slot = *index.entry(group).or_insert_with(|| {
            groups.push(GroupAggregate {
                key: GroupKey::new(attribute, group),
                counts: ConfusionCounts::default(),
                insufficient_sample: false,
                bins: vec![ScoreBin::default(); bins],
            });
            groups.len() - 1
        });

        let entry = &mut groups[slot];
        entry
            .counts
            .record(record.predicted_positive(threshold), record.true_label);
        entry.bins[bin_index(record.predicted_score, bins)]
            .add(record.predicted_score, record.true_label);
    }

    for group in &mut groups {
        group.insufficient_sample = group.counts.total < config.min_group_size;
        if group.insufficient_sample {
            tracing::warn!(
                attribute,
                group = %group.key.group,
                size = group.counts.total,
                min = config.min_group_size,
                "Group below minimum sample size"
            );
        }
    }

    tracing::debug!(attribute, groups = groups.len(), "Aggregated confusion counts");
    Ok(AttributeAggregate {
        attribute: attribute.to_string(),
        groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;

    fn dataset() -> Dataset {
        let mut records = Vec::new();
        // group "a": 2 TP, 1 FP, 1 TN, 1 FN
        for (score, label) in [(0.9, true), (0.8, true), (0.7, false), (0.1, false), (0.2, true)] {
            records.push(Record::new(score, label).with_attribute("g", "a"));
        }
        // group "b": 1 TN
        records.push(Record::new(0.3, false).with_attribute("g", "b"));
        Dataset::new(records, ["g"])
    }

    fn config(min_group_size: usize) -> AnalysisConfig {
        let mut config = AnalysisConfig::for_attributes(["g"]);
        config.min_group_size = min_group_size;
        config
    }

    #[test]
    fn test_confusion_cells() {
        let agg = aggregate(&dataset(), "g", &config(1)).unwrap();
        assert_eq!(agg.groups.len(), 2);
        let a = agg.get("a").unwrap();
        assert_eq!(
            a.counts,
            ConfusionCounts {
                true_positive: 2,
                false_positive: 1,
                true_negative: 1,
                false_negative: 1,
                total: 5,
            }
        );
        assert_eq!(a.counts.positive_rate(), Some(0.6));
        assert_eq!(a.counts.true_positive_rate(), Some(2.0 / 3.0));
        assert_eq!(a.counts.false_positive_rate(), Some(0.5));

        let b = agg.get("b").unwrap();
        assert_eq!(b.counts.true_positive_rate(), None);
        assert_eq!(b.counts.false_positive_rate(), Some(0.0));
    }

    #[test]
    fn test_first_seen_order() {
        let mut ds = dataset();
        ds.records.rotate_right(1);
        let agg = aggregate(&ds, "g", &config(1)).unwrap();
        let order: Vec<_> = agg.groups.iter().map(|g| g.key.group.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_insufficient_sample_flag() {
        let agg = aggregate(&dataset(), "g", &config(3)).unwrap();
        assert!(!agg.get("a").unwrap().insufficient_sample);
        assert!(agg.get("b").unwrap().insufficient_sample);
        assert_eq!(agg.eligible().count(), 1);
    }

    #[test]
    fn test_rejects_oversized_bin_count() {
        let mut config = config(1);
        config.bins = usize::MAX;
        assert!(matches!(
            aggregate(&dataset(), "g", &config),
            Err(ValidationError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_unknown_attribute() {
        let err = aggregate(&dataset(), "race", &config(1)).unwrap_err();
        assert_eq!(err, ValidationError::UnknownAttribute { name: "race".into() });
    }

    #[test]
    fn test_score_histogram() {
        let agg = aggregate(&dataset(), "g", &config(1)).unwrap();
        let a = agg.get("a").unwrap();
        assert_eq!(a.bins.len(), 10);
        assert_eq!(a.bins[9].count, 1);
        assert_eq!(a.bins[8].positives, 1);
        let occupied: usize = a.bins.iter().map(|b| b.count).sum();
        assert_eq!(occupied, 5);
    }

    #[test]
    fn test_bin_mean_is_exact_for_repeated_scores() {
        let mut bin = ScoreBin::default();
        for i in 0..1000 {
            bin.add(0.1, i < 100);
        }
        assert_eq!(bin.predicted_mean(), Some(0.1));
        assert_eq!(bin.observed_rate(), Some(0.1));

        let mut bin = ScoreBin::default();
        for i in 0..300 {
            bin.add(0.7, i < 210);
        }
        assert_eq!(bin.predicted_mean(), bin.observed_rate());
    }

    #[test]
    fn test_bin_index_edges() {
        assert_eq!(bin_index(0.0, 10), 0);
        assert_eq!(bin_index(0.099, 10), 0);
        assert_eq!(bin_index(0.25, 10), 2);
        assert_eq!(bin_index(1.0, 10), 9);
        assert_eq!(bin_index(0.5, 1), 0);
    }

    #[test]
    fn test_explicit_predicted_label_wins() {
        let records = vec![
            Record::new(0.9, true)
                .with_attribute("g", "a")
                .with_predicted_label(false),
        ];
        let ds = Dataset::new(records, ["g"]);
        let agg = aggregate(&ds, "g", &config(1)).unwrap();
        assert_eq!(agg.groups[0].counts.false_negative, 1);
    }
}
