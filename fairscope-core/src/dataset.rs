//! Evaluated population: one record per individual scored by the model.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::config::AnalysisConfig;
use crate::error::ValidationError;

/// Decision threshold applied when neither the dataset nor the config sets one.
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.5;

/// One evaluated individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Protected attribute name -> categorical group value (e.g. `gender -> female`).
    pub attributes: HashMap<String, String>,
    /// Model's positive-class probability, in [0, 1].
    pub predicted_score: f64,
    /// Ground-truth outcome.
    #[serde(deserialize_with = "deserialize_label")]
    pub true_label: bool,
    /// Explicit model decision. Derived from the score when absent.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub predicted_label: Option<bool>,
}

impl Record {
    pub fn new(predicted_score: f64, true_label: bool) -> Self {
        Self {
            attributes: HashMap::new(),
            predicted_score,
            true_label,
            predicted_label: None,
        }
    }

    /// Builder-style setter for a protected attribute value.
    pub fn with_attribute(mut self, name: impl Into<String>, group: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), group.into());
        self
    }

    /// Builder-style setter for an explicit predicted label.
    pub fn with_predicted_label(mut self, label: bool) -> Self {
        self.predicted_label = Some(label);
        self
    }

    /// The record's group value for `attribute`, if any.
    pub fn group(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute).map(String::as_str)
    }

    /// Effective model decision under `threshold`.
    pub fn predicted_positive(&self, threshold: f64) -> bool {
        self.predicted_label
            .unwrap_or(self.predicted_score >= threshold)
    }
}

/// Ordered records plus the decision threshold and the attributes they carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub records: Vec<Record>,
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,
    pub protected_attributes: Vec<String>,
}

fn default_decision_threshold() -> f64 {
    DEFAULT_DECISION_THRESHOLD
}

impl Dataset {
    pub fn new<I, S>(records: Vec<Record>, protected_attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records,
            decision_threshold: DEFAULT_DECISION_THRESHOLD,
            protected_attributes: protected_attributes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_decision_threshold(mut self, threshold: f64) -> Self {
        self.decision_threshold = threshold;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.protected_attributes.iter().any(|a| a == name)
    }

    /// Threshold in force for a run: the config override, else the dataset's own.
    pub fn effective_threshold(&self, config: &AnalysisConfig) -> f64 {
        config
            .decision_threshold
            .unwrap_or(self.decision_threshold)
    }

    /// Check the dataset's own invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.records.is_empty() {
            return Err(ValidationError::EmptyDataset);
        }
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            return Err(ValidationError::ThresholdOutOfRange {
                name: "decision_threshold".into(),
                value: self.decision_threshold,
            });
        }
        for (index, record) in self.records.iter().enumerate() {
            if !(0.0..=1.0).contains(&record.predicted_score) {
                return Err(ValidationError::ScoreOutOfRange {
                    index,
                    score: record.predicted_score,
                });
            }
            for attribute in &self.protected_attributes {
                if record.group(attribute).is_none() {
                    return Err(ValidationError::MissingAttribute {
                        index,
                        attribute: attribute.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Check that this dataset can be analyzed under `config`.
    pub fn validate_for(&self, config: &AnalysisConfig) -> Result<(), ValidationError> {
        config.validate()?;
        self.validate()?;
        if let Some(unknown) = config
            .protected_attributes
            .iter()
            .find(|name| !self.has_attribute(name))
        {
            return Err(ValidationError::UnknownAttribute {
                name: unknown.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelRepr {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl LabelRepr {
    fn into_bool<E: serde::de::Error>(self) -> Result<bool, E> {
        match self {
            LabelRepr::Bool(b) => Ok(b),
            LabelRepr::Int(0) => Ok(false),
            LabelRepr::Int(1) => Ok(true),
            LabelRepr::Int(other) => Err(E::custom(format!("label must be 0 or 1, got {other}"))),
            LabelRepr::Text(text) => {
                parse_label(&text).ok_or_else(|| E::custom(format!("unrecognized label '{text}'")))
            }
        }
    }
}

/// Parse the textual label spellings accepted in dataset files.
pub fn parse_label(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "positive" => Some(true),
        "0" | "false" | "no" | "n" | "negative" => Some(false),
        _ => None,
    }
}

fn deserialize_label<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    LabelRepr::deserialize(deserializer)?.into_bool()
}

fn deserialize_optional_label<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<LabelRepr>::deserialize(deserializer)?
        .map(LabelRepr::into_bool)
        .transpose()
}
