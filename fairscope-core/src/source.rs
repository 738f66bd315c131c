//! Dataset loading from JSON, JSONL and CSV files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::dataset::{Dataset, Record, parse_label};
use crate::error::SourceError;

/// On-disk layout of a dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetFormat {
    /// Either an array of records or a full dataset object.
    Json,
    /// One record object per line.
    Jsonl,
    /// Header row, then one record per row.
    Csv,
}

impl DatasetFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl FromStr for DatasetFormat {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(DatasetFormat::Json),
            "jsonl" | "ndjson" => Ok(DatasetFormat::Jsonl),
            "csv" => Ok(DatasetFormat::Csv),
            other => Err(SourceError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetFormat::Json => write!(f, "json"),
            DatasetFormat::Jsonl => write!(f, "jsonl"),
            DatasetFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Column names used when reading CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvColumns {
    pub score: String,
    pub label: String,
    pub prediction: Option<String>,
    pub delimiter: char,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            score: "predicted_score".into(),
            label: "true_label".into(),
            prediction: None,
            delimiter: ',',
        }
    }
}

/// A dataset file plus the settings needed to interpret it.
#[derive(Debug, Clone)]
pub struct DatasetSource {
    pub path: PathBuf,
    pub format: DatasetFormat,
    /// Protected attributes to carry. Empty means "infer from the file".
    pub attributes: Vec<String>,
    pub columns: CsvColumns,
    pub decision_threshold: Option<f64>,
}

impl DatasetSource {
    /// Source with the format inferred from the extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let path = path.into();
        let format = DatasetFormat::from_path(&path).ok_or_else(|| {
            SourceError::UnsupportedFormat {
                format: path
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "<none>".into()),
            }
        })?;
        Ok(Self::new(path, format))
    }

    pub fn new(path: impl Into<PathBuf>, format: DatasetFormat) -> Self {
        Self {
            path: path.into(),
            format,
            attributes: Vec::new(),
            columns: CsvColumns::default(),
            decision_threshold: None,
        }
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_columns(mut self, columns: CsvColumns) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_decision_threshold(mut self, threshold: f64) -> Self {
        self.decision_threshold = Some(threshold);
        self
    }

    /// Read and parse the file.
    pub async fn load(&self) -> Result<Dataset, SourceError> {
        let content =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| SourceError::Io {
                    path: self.path.clone(),
                    source,
                })?;
        let dataset = self.parse(&content)?;
        tracing::info!(
            path = %self.path.display(),
            format = %self.format,
            records = dataset.len(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Parse file contents according to this source's format.
    pub fn parse(&self, content: &str) -> Result<Dataset, SourceError> {
        let mut dataset = match self.format {
            DatasetFormat::Json => self.parse_json(content)?,
            DatasetFormat::Jsonl => self.parse_jsonl(content)?,
            DatasetFormat::Csv => self.parse_csv(content)?,
        };
        if let Some(threshold) = self.decision_threshold {
            dataset.decision_threshold = threshold;
        }
        Ok(dataset)
    }

    fn parse_json(&self, content: &str) -> Result<Dataset, SourceError> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|source| SourceError::Json {
                location: self.path.display().to_string(),
                source,
            })?;
        if value.is_array() {
            let records: Vec<Record> =
                serde_json::from_value(value).map_err(|source| SourceError::Json {
                    location: self.path.display().to_string(),
                    source,
                })?;
            return Ok(self.assemble(records));
        }
        let mut dataset: Dataset =
            serde_json::from_value(value).map_err(|source| SourceError::Json {
                location: self.path.display().to_string(),
                source,
            })?;
        if !self.attributes.is_empty() {
            dataset.protected_attributes = self.attributes.clone();
        }
        Ok(dataset)
    }

    fn parse_jsonl(&self, content: &str) -> Result<Dataset, SourceError> {
        let mut records = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(line).map_err(|source| SourceError::Json {
                location: format!("{} line {}", self.path.display(), i + 1),
                source,
            })?;
            records.push(record);
        }
        Ok(self.assemble(records))
    }

    fn parse_csv(&self, content: &str) -> Result<Dataset, SourceError> {
        let delimiter = self.columns.delimiter;
        let mut lines = content.lines().enumerate();
        let header: Vec<String> = lines
            .next()
            .map(|(_, l)| split_row(l, delimiter, 1))
            .ok_or(SourceError::Malformed {
                line: 1,
                message: "empty CSV file".into(),
            })??;

        let position = |name: &str| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| SourceError::MissingColumn {
                    column: name.to_string(),
                })
        };
        let score_idx = position(&self.columns.score)?;
        let label_idx = position(&self.columns.label)?;
        let prediction_idx = self
            .columns
            .prediction
            .as_deref()
            .map(position)
            .transpose()?;

        let attributes: Vec<String> = if self.attributes.is_empty() {
            header
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != score_idx && *i != label_idx && Some(*i) != prediction_idx)
                .map(|(_, h)| h.clone())
                .collect()
        } else {
            self.attributes.clone()
        };
        let attribute_idx = attributes
            .iter()
            .map(|a| position(a).map(|i| (a.clone(), i)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::new();
        for (i, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = i + 1;
            let fields = split_row(line, delimiter, line_no)?;
            if fields.len() != header.len() {
                return Err(SourceError::Malformed {
                    line: line_no,
                    message: format!("expected {} fields, found {}", header.len(), fields.len()),
                });
            }
            let score: f64 = fields[score_idx].parse().map_err(|_| SourceError::Malformed {
                line: line_no,
                message: format!("invalid score '{}'", fields[score_idx]),
            })?;
            let label = parse_label(&fields[label_idx]).ok_or_else(|| SourceError::Malformed {
                line: line_no,
                message: format!("invalid label '{}'", fields[label_idx]),
            })?;
            let predicted_label = match prediction_idx {
                Some(idx) => Some(parse_label(&fields[idx]).ok_or_else(|| {
                    SourceError::Malformed {
                        line: line_no,
                        message: format!("invalid prediction '{}'", fields[idx]),
                    }
                })?),
                None => None,
            };
            let attributes: HashMap<String, String> = attribute_idx
                .iter()
                .map(|(name, idx)| (name.clone(), fields[*idx].clone()))
                .collect();
            records.push(Record {
                attributes,
                predicted_score: score,
                true_label: label,
                predicted_label,
            });
        }

        Ok(Dataset::new(records, attributes))
    }

    /// Wrap bare records, inferring the attribute list when none was given.
    fn assemble(&self, records: Vec<Record>) -> Dataset {
        let attributes = if self.attributes.is_empty() {
            let mut names: Vec<String> = records
                .first()
                .map(|r| r.attributes.keys().cloned().collect())
                .unwrap_or_default();
            names.sort();
            names
        } else {
            self.attributes.clone()
        };
        Dataset::new(records, attributes)
    }
}

/// Split one CSV row on `delimiter`.
///
/// A field wrapped in double quotes may contain the delimiter, and `""` inside
/// it is a literal quote. Quoted fields cannot span lines.
fn split_row(line: &str, delimiter: char, line_no: usize) -> Result<Vec<String>, SourceError> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            c => field.push(c),
        }
    }
    if in_quotes {
        return Err(SourceError::Malformed {
            line: line_no,
            message: "unterminated quoted field".into(),
        });
    }
    fields.push(field.trim().to_string());
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CSV: &str = "gender,age,predicted_score,true_label\n\
                       female,young,0.8,1\n\
                       male,old,0.3,0\n";

    const JSONL: &str = r#"{"attributes": {"gender": "female", "age": "young"}, "predicted_score": 0.8, "true_label": 1}
{"attributes": {"gender": "male", "age": "old"}, "predicted_score": 0.3, "true_label": false}
"#;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DatasetFormat::from_path(Path::new("data.JSONL")),
            Some(DatasetFormat::Jsonl)
        );
        assert_eq!(DatasetFormat::from_path(Path::new("data.parquet")), None);
        assert!(DatasetSource::from_path("data.xlsx").is_err());
    }

    #[test]
    fn test_csv_and_jsonl_agree() {
        let csv = DatasetSource::new("d.csv", DatasetFormat::Csv)
            .with_attributes(["age", "gender"])
            .parse(CSV)
            .unwrap();
        let jsonl = DatasetSource::new("d.jsonl", DatasetFormat::Jsonl)
            .with_attributes(["age", "gender"])
            .parse(JSONL)
            .unwrap();
        assert_eq!(csv, jsonl);
        assert_eq!(csv.len(), 2);
    }

    #[test]
    fn test_csv_infers_attributes() {
        let ds = DatasetSource::new("d.csv", DatasetFormat::Csv)
            .parse(CSV)
            .unwrap();
        assert_eq!(ds.protected_attributes, vec!["gender", "age"]);
        assert_eq!(ds.records[0].group("gender"), Some("female"));
        assert!(ds.records[0].true_label);
    }

    #[test]
    fn test_csv_errors() {
        let source = DatasetSource::new("d.csv", DatasetFormat::Csv);
        let err = source
            .parse("gender,predicted_score,true_label\nfemale,high,1\n")
            .unwrap_err();
        assert!(matches!(err, SourceError::Malformed { line: 2, .. }));

        let err = source.parse("gender,score,true_label\n").unwrap_err();
        assert!(matches!(err, SourceError::MissingColumn { .. }));

        let err = source
            .parse("gender,predicted_score,true_label\nfemale,0.4\n")
            .unwrap_err();
        assert!(matches!(err, SourceError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_csv_quoted_fields() {
        let source = DatasetSource::new("d.csv", DatasetFormat::Csv);
        let dataset = source
            .parse(
                "region,predicted_score,true_label\n\
                 \"Portland, OR\",0.7,1\n\
                 \"The \"\"Hub\"\"\",0.2,0\n",
            )
            .unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.records[0].group("region"), Some("Portland, OR"));
        assert_eq!(dataset.records[1].group("region"), Some("The \"Hub\""));

        let err = source
            .parse("region,predicted_score,true_label\n\"Portland, OR,0.7,1\n")
            .unwrap_err();
        assert!(matches!(err, SourceError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_csv_custom_columns() {
        let columns = CsvColumns {
            score: "prob".into(),
            label: "y".into(),
            prediction: Some("yhat".into()),
            delimiter: ';',
        };
        let ds = DatasetSource::new("d.csv", DatasetFormat::Csv)
            .with_columns(columns)
            .parse("race;prob;y;yhat\nx;0.9;yes;no\n")
            .unwrap();
        assert_eq!(ds.protected_attributes, vec!["race"]);
        assert_eq!(ds.records[0].predicted_label, Some(false));
    }

    #[test]
    fn test_json_dataset_object() {
        let source = DatasetSource::new("d.json", DatasetFormat::Json).with_decision_threshold(0.7);
        let ds = source
            .parse(
                r#"{"records": [{"attributes": {"gender": "f"}, "predicted_score": 0.6, "true_label": true}],
                    "protected_attributes": ["gender"]}"#,
            )
            .unwrap();
        assert_eq!(ds.decision_threshold, 0.7);
        assert_eq!(ds.protected_attributes, vec!["gender"]);
    }

    #[test]
    fn test_jsonl_reports_line() {
        let err = DatasetSource::new("d.jsonl", DatasetFormat::Jsonl)
            .parse("{\"attributes\": {}, \"predicted_score\": 0.1, \"true_label\": 0}\nnot json\n")
            .unwrap_err();
        match err {
            SourceError::Json { location, .. } => assert!(location.ends_with("line 2")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("population.csv");
        tokio::fs::write(&path, CSV).await.unwrap();
        let ds = DatasetSource::from_path(&path)
            .unwrap()
            .with_attributes(["gender"])
            .load()
            .await
            .unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.protected_attributes, vec!["gender"]);

        let missing = DatasetSource::new(dir.path().join("nope.csv"), DatasetFormat::Csv)
            .load()
            .await;
        assert!(matches!(missing, Err(SourceError::Io { .. })));
    }
}
