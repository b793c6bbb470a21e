//! Configuration schema for ckpt
//!
//! Configuration is stored as JSON at `<root>/config`

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Report settings
    pub report: ReportConfig,

    /// Checkpoint cache settings
    pub checkpoints: CheckpointConfig,

    /// Experiment record settings
    pub experiments: ExperimentConfig,
}

/// Report aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReportConfig {
    /// Flattened configuration keys never shown as columns
    pub ignore_config: Vec<String>,

    /// Metric keys never shown as columns
    pub ignore_metrics: Vec<String>,

    /// Rendered in place of a metric a record does not have
    pub missing_value: String,

    /// Decimal places for metric values
    pub float_precision: usize,

    /// Shortest id prefix ever displayed
    pub min_short_hash: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            ignore_config: vec![],
            ignore_metrics: vec![],
            missing_value: String::new(),
            float_precision: 4,
            min_short_hash: 7,
        }
    }
}

/// Compression applied to checkpoint payload files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Raw bytes
    #[default]
    None,
    /// gzip, files get a `.gz` suffix
    Gzip,
}

impl Compression {
    /// Suffix appended to logical filenames
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
        }
    }
}

/// Checkpoint cache settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CheckpointConfig {
    /// Compression for payload files opened through a checkpoint
    pub compression: Compression,

    /// Only treat sealed checkpoints as cache hits
    pub require_complete: bool,
}

/// Experiment record settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExperimentConfig {
    /// Accumulate results but never write the record
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.report.float_precision, 4);
        assert_eq!(config.report.min_short_hash, 7);
        assert_eq!(config.checkpoints.compression, Compression::None);
        assert!(!config.experiments.dry_run);
    }

    #[test]
    fn parse_partial_kebab_case() {
        let config: Config = serde_json::from_str(
            r#"{"report": {"ignore-config": ["seed"]}, "checkpoints": {"compression": "gzip"}}"#,
        )
        .unwrap();

        assert_eq!(config.report.ignore_config, vec!["seed".to_string()]);
        assert_eq!(config.report.min_short_hash, 7);
        assert_eq!(config.checkpoints.compression, Compression::Gzip);
        assert_eq!(Compression::Gzip.suffix(), ".gz");
    }
}
