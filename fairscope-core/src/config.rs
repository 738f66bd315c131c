//! Configuration for fairness analysis runs.
//!
//! Uses `figment` for layered configuration: defaults -> user config -> workspace
//! config -> environment -> explicit overrides. Configuration is loaded from
//! `~/.config/fairscope/config.toml` and/or `.fairscope/config.toml` in the
//! workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ValidationError;
use crate::severity::SeverityThresholds;

/// Upper bound on calibration bins; every group allocates one slot per bin.
pub const MAX_BINS: usize = 1000;

/// Parameters of a single analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Protected attributes to analyze, in reporting order.
    #[serde(default)]
    pub protected_attributes: Vec<String>,
    /// Overrides the dataset's own decision threshold when set.
    #[serde(default)]
    pub decision_threshold: Option<f64>,
    /// Groups with fewer records are flagged as insufficient samples.
    #[serde(default = "default_min_group_size")]
    pub min_group_size: usize,
    /// Number of equal-width score bins used for calibration.
    #[serde(default = "default_bins")]
    pub bins: usize,
    /// Upper bound on per-attribute worker threads. `None` uses available parallelism.
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// Severity tier boundaries.
    #[serde(default)]
    pub thresholds: SeverityThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            protected_attributes: Vec::new(),
            decision_threshold: None,
            min_group_size: default_min_group_size(),
            bins: default_bins(),
            max_workers: None,
            thresholds: SeverityThresholds::default(),
        }
    }
}

fn default_min_group_size() -> usize {
    30
}

fn default_bins() -> usize {
    10
}

impl AnalysisConfig {
    /// Config analyzing the given attributes with all other settings at their defaults.
    pub fn for_attributes<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected_attributes: attributes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Check the configuration on its own, independent of any dataset.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.protected_attributes.is_empty() {
            return Err(ValidationError::NoProtectedAttributes);
        }
        for (i, name) in self.protected_attributes.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ValidationError::InvalidConfig {
                    message: "protected attribute names must not be empty".into(),
                });
            }
            if self.protected_attributes[..i].contains(name) {
                return Err(ValidationError::InvalidConfig {
                    message: format!("protected attribute '{name}' listed more than once"),
                });
            }
        }
        if let Some(threshold) = self.decision_threshold
            && !(0.0..=1.0).contains(&threshold)
        {
            return Err(ValidationError::ThresholdOutOfRange {
                name: "decision_threshold".into(),
                value: threshold,
            });
        }
        if self.bins == 0 {
            return Err(ValidationError::InvalidConfig {
                message: "calibration requires at least one bin".into(),
            });
        }
        if self.bins > MAX_BINS {
            return Err(ValidationError::InvalidConfig {
                message: format!("bins = {} exceeds the maximum of {MAX_BINS}", self.bins),
            });
        }
        if self.max_workers == Some(0) {
            return Err(ValidationError::InvalidConfig {
                message: "max_workers must be at least 1".into(),
            });
        }
        self.thresholds.validate()
    }

    /// Number of worker threads to use for `units` independent units of work.
    pub fn worker_count(&self, units: usize) -> usize {
        let available = self.max_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        available.clamp(1, units.max(1))
    }
}

/// Path of the workspace-local config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".fairscope").join("config.toml")
}

/// Path of the user-level config file, if a home directory can be resolved.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "fairscope", "fairscope")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `FAIRSCOPE_`)
/// 3. Workspace-local config (`.fairscope/config.toml`)
/// 4. User config (`~/.config/fairscope/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&AnalysisConfig>,
) -> Result<AnalysisConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AnalysisConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // FAIRSCOPE_MIN_GROUP_SIZE, FAIRSCOPE_THRESHOLDS__SUCCESS, etc.
    figment = figment.merge(Env::prefixed("FAIRSCOPE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}
