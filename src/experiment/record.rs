//! Experiment record data model

use crate::error::{CkptError, CkptResult};
use crate::hash::digest_of;
use crate::report::flatten;
use crate::report::metrics::MetricRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Current on-disk record layout
pub const FORMAT_VERSION: u32 = 1;

/// Ground truth and predictions kept for scoring at report time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawResult {
    pub ground_truth: Vec<f64>,
    pub predictions: Vec<f64>,
}

impl RawResult {
    pub fn new(ground_truth: Vec<f64>, predictions: Vec<f64>) -> Self {
        Self {
            ground_truth,
            predictions,
        }
    }

    fn is_finite(&self) -> bool {
        self.ground_truth
            .iter()
            .chain(&self.predictions)
            .all(|v| v.is_finite())
    }
}

/// What a run produced; exactly one form is authoritative per record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Outcome {
    /// Metrics reduced during the run
    Metrics { metrics: BTreeMap<String, f64> },
    /// Raw predictions, scored on demand
    RawResults { results: BTreeMap<String, RawResult> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Metadata {
    pub start_time: DateTime<Utc>,
    pub stop_time: Option<DateTime<Utc>>,
}

/// One end-to-end run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExperimentRecord {
    pub format_version: u32,
    pub name: String,
    pub configuration: Map<String, Value>,
    pub metadata: Metadata,
    pub outcome: Option<Outcome>,
    /// Checkpoint addresses the run went through
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checkpoints: Vec<String>,
}

/// The fields that define a record's identity
#[derive(Serialize)]
struct Identity<'a> {
    configuration: &'a Map<String, Value>,
    outcome: &'a Option<Outcome>,
    metadata: &'a Metadata,
}

impl ExperimentRecord {
    /// Start a record now
    pub fn new(name: impl Into<String>, configuration: Map<String, Value>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            name: name.into(),
            configuration,
            metadata: Metadata {
                start_time: Utc::now(),
                stop_time: None,
            },
            outcome: None,
            checkpoints: Vec::new(),
        }
    }

    /// Merge pre-computed metrics, later values winning
    pub fn add_metrics(
        &mut self,
        metrics: impl IntoIterator<Item = (String, f64)>,
    ) -> CkptResult<()> {
        let metrics: Vec<(String, f64)> = metrics.into_iter().collect();
        if let Some((key, _)) = metrics.iter().find(|(_, v)| !v.is_finite()) {
            return Err(self.non_finite(key));
        }

        let outcome = self.outcome.get_or_insert_with(|| Outcome::Metrics {
            metrics: BTreeMap::new(),
        });

        match outcome {
            Outcome::Metrics { metrics: existing } => {
                existing.extend(metrics);
                Ok(())
            }
            Outcome::RawResults { .. } => Err(CkptError::MixedOutcome(self.name.clone())),
        }
    }

    /// Store raw predictions under `name`
    pub fn add_results(&mut self, name: impl Into<String>, result: RawResult) -> CkptResult<()> {
        let name = name.into();
        if result.ground_truth.len() != result.predictions.len() {
            return Err(CkptError::LengthMismatch {
                name,
                truth: result.ground_truth.len(),
                predicted: result.predictions.len(),
            });
        }
        if !result.is_finite() {
            return Err(self.non_finite(&name));
        }

        let outcome = self.outcome.get_or_insert_with(|| Outcome::RawResults {
            results: BTreeMap::new(),
        });

        match outcome {
            Outcome::RawResults { results } => {
                results.insert(name, result);
                Ok(())
            }
            Outcome::Metrics { .. } => Err(CkptError::MixedOutcome(self.name.clone())),
        }
    }

    /// Check that the record can be stored and read back
    ///
    /// JSON has no NaN or infinity, and a configuration whose flattened
    /// keys collide cannot be reported.
    pub fn validate(&self) -> CkptResult<()> {
        flatten(&self.configuration)?;
        match &self.outcome {
            Some(Outcome::Metrics { metrics }) => {
                if let Some((key, _)) = metrics.iter().find(|(_, v)| !v.is_finite()) {
                    return Err(self.non_finite(key));
                }
            }
            Some(Outcome::RawResults { results }) => {
                if let Some((key, _)) = results.iter().find(|(_, r)| !r.is_finite()) {
                    return Err(self.non_finite(key));
                }
            }
            None => {}
        }
        Ok(())
    }

    fn non_finite(&self, key: &str) -> CkptError {
        CkptError::NonFiniteValue {
            experiment: self.name.clone(),
            key: key.to_string(),
        }
    }

    /// True if no metric or result was ever added
    pub fn is_empty(&self) -> bool {
        match &self.outcome {
            None => true,
            Some(Outcome::Metrics { metrics }) => metrics.is_empty(),
            Some(Outcome::RawResults { results }) => results.is_empty(),
        }
    }

    /// Digest of configuration, outcome and metadata
    pub fn content_address(&self) -> CkptResult<String> {
        digest_of(&Identity {
            configuration: &self.configuration,
            outcome: &self.outcome,
            metadata: &self.metadata,
        })
    }

    /// Stored metrics, or metrics derived from raw results via `registry`
    pub fn metrics(&self, registry: &MetricRegistry) -> BTreeMap<String, f64> {
        match &self.outcome {
            None => BTreeMap::new(),
            Some(Outcome::Metrics { metrics }) => metrics.clone(),
            Some(Outcome::RawResults { results }) => registry.evaluate(results),
        }
    }
}
