//! Pipelines of labelled stages
//!
//! A pipeline fits its stages in order, feeding each stage's transformed
//! output to the next. Fitting goes through the checkpoint chain, so an
//! unchanged prefix of a pipeline is restored instead of refit.
//!
//! Pipeline definitions map a stage label to its parameters and keep
//! their order:
//!
//! ```toml
//! [scaler]
//! with_std = false
//!
//! [model]
//! alpha = 0.5
//! ```

use crate::checkpoint::CheckpointChain;
use crate::error::{CkptError, CkptResult};
use crate::experiment::{ExperimentRecord, RawResult};
use crate::hash::ParamMap;
use crate::stage::{
    compute_cached, FitInput, FitStep, Fittable, PipelineStage, Predictable, Stage, Transformable,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

type BoxedStage<X, Y> = Box<dyn PipelineStage<X, Y>>;

/// Builds a stage from its parameters
pub type StageBuilder<X, Y> = Box<dyn Fn(&ParamMap) -> CkptResult<BoxedStage<X, Y>>>;

/// Stage constructors by label
pub struct StageFactory<X, Y> {
    builders: BTreeMap<String, StageBuilder<X, Y>>,
}

impl<X, Y> Default for StageFactory<X, Y> {
    fn default() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }
}

impl<X, Y> StageFactory<X, Y> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, label: impl Into<String>, builder: F) -> &mut Self
    where
        F: Fn(&ParamMap) -> CkptResult<BoxedStage<X, Y>> + 'static,
    {
        self.builders.insert(label.into(), Box::new(builder));
        self
    }

    pub fn build(&self, label: &str, params: &ParamMap) -> CkptResult<BoxedStage<X, Y>> {
        let builder = self
            .builders
            .get(label)
            .ok_or_else(|| CkptError::UnknownStage(label.to_string()))?;
        builder(params)
    }
}

impl<X, Y> fmt::Debug for StageFactory<X, Y> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.builders.keys()).finish()
    }
}

/// Ordered, labelled stages
pub struct Pipeline<X, Y> {
    labels: Vec<String>,
    stages: Vec<BoxedStage<X, Y>>,
}

impl<X, Y> Pipeline<X, Y> {
    pub fn new(stages: Vec<(String, BoxedStage<X, Y>)>) -> CkptResult<Self> {
        if stages.is_empty() {
            return Err(CkptError::EmptyPipeline);
        }
        let (labels, stages) = stages.into_iter().unzip();
        Ok(Self { labels, stages })
    }

    /// Build every stage of a `label -> params` definition
    pub fn from_config(config: &Map<String, Value>, factory: &StageFactory<X, Y>) -> CkptResult<Self> {
        let mut stages = Vec::with_capacity(config.len());
        for (label, params) in config {
            stages.push((label.clone(), factory.build(label, &stage_params(label, params)?)?));
        }
        Self::new(stages)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Labels joined with `+`
    pub fn name(&self) -> String {
        self.labels.join("+")
    }

    /// Non-default parameters per label
    pub fn params(&self) -> Map<String, Value> {
        self.labels
            .iter()
            .zip(&self.stages)
            .map(|(label, stage)| (label.clone(), Value::Object(stage.changed_params())))
            .collect()
    }

    /// Fit every stage, transforming the data between stages
    ///
    /// With a chain, each fit is cached as a `<Stage>.fit` checkpoint keyed
    /// by the data it sees.
    pub fn fit(&mut self, x: X, y: Option<Y>, mut chain: Option<&mut CheckpointChain>) -> CkptResult<()>
    where
        X: Serialize,
        Y: Serialize,
    {
        let last = self.stages.len() - 1;
        let (mut x, mut y) = (x, y);

        for (i, stage) in self.stages.iter_mut().enumerate() {
            match chain.as_deref_mut() {
                Some(chain) => {
                    let input = FitInput { x: &x, y: y.as_ref() };
                    compute_cached(chain, &mut FitStep::new(&mut **stage), &input)?;
                }
                None => {
                    debug!("Fitting {} without checkpoints", stage.name());
                    stage.fit(&x, y.as_ref())?;
                }
            }

            if i < last {
                (x, y) = transformable(&**stage)?.transform(x, y)?;
            }
        }
        Ok(())
    }

    /// Transform through all but the last stage, predict with the last
    pub fn predict(&self, x: X) -> CkptResult<Y> {
        let Some((last, init)) = self.stages.split_last() else {
            return Err(CkptError::EmptyPipeline);
        };

        let (x, _) = init.iter().try_fold((x, None), |(x, y), stage| {
            transformable(&**stage)?.transform(x, y)
        })?;
        predictable(&**last)?.predict(&x)
    }

    /// Predictions next to `y_true`, kept for scoring at report time
    pub fn evaluate(&self, x: X, y_true: &Y) -> CkptResult<RawResult>
    where
        Y: AsRef<[f64]>,
    {
        let predictions = self.predict(x)?;
        Ok(RawResult::new(
            y_true.as_ref().to_vec(),
            predictions.as_ref().to_vec(),
        ))
    }
}

impl<X, Y> fmt::Debug for Pipeline<X, Y> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("labels", &self.labels).finish()
    }
}

fn transformable<X, Y>(stage: &dyn PipelineStage<X, Y>) -> CkptResult<&dyn Transformable<X, Y>> {
    stage.as_transformable().ok_or_else(|| CkptError::MissingFacet {
        stage: stage.name(),
        facet: "transform",
    })
}

fn predictable<X, Y>(stage: &dyn PipelineStage<X, Y>) -> CkptResult<&dyn Predictable<X, Y>> {
    stage.as_predictable().ok_or_else(|| CkptError::MissingFacet {
        stage: stage.name(),
        facet: "predict",
    })
}

fn stage_params(label: &str, params: &Value) -> CkptResult<ParamMap> {
    match params {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(ParamMap::new()),
        other => Err(CkptError::User(format!(
            "Parameters of stage '{}' must be a table, got {}",
            label, other
        ))),
    }
}

/// Read a pipeline definition
///
/// Accepts `.json` and `.toml` definitions, and stored experiment
/// records, whose configuration is returned.
pub fn load_pipeline_config(path: &Path) -> CkptResult<Map<String, Value>> {
    let content = fs::read_to_string(path)
        .map_err(|e| CkptError::io(format!("reading pipeline config {}", path.display()), e))?;

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let value: Value = match extension {
        "json" => serde_json::from_str(&content)?,
        "toml" => toml::from_str(&content)?,
        other => {
            return Err(CkptError::UnsupportedFormat(format!(
                "{} (extension '{}', expected json or toml)",
                path.display(),
                other
            )))
        }
    };

    let Value::Object(map) = value else {
        return Err(CkptError::UnsupportedFormat(format!(
            "{} is not a table of stages",
            path.display()
        )));
    };

    if map.contains_key("format-version") {
        let record: ExperimentRecord = serde_json::from_value(Value::Object(map))?;
        debug!("Using configuration of stored experiment '{}'", record.name);
        return Ok(record.configuration);
    }
    Ok(map)
}

/// One stage of a run plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStage {
    pub label: String,
    pub params: Value,
}

/// What a run would execute, without building any stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelinePlan {
    pub name: String,
    pub stages: Vec<PlannedStage>,
    pub dry_run: bool,
    pub checkpoints: bool,
}

impl PipelinePlan {
    pub fn from_config(config: &Map<String, Value>, dry_run: bool, checkpoints: bool) -> CkptResult<Self> {
        if config.is_empty() {
            return Err(CkptError::EmptyPipeline);
        }

        let mut stages = Vec::with_capacity(config.len());
        for (label, params) in config {
            stages.push(PlannedStage {
                label: label.clone(),
                params: Value::Object(stage_params(label, params)?),
            });
        }

        Ok(Self {
            name: config.keys().cloned().collect::<Vec<_>>().join("+"),
            stages,
            dry_run,
            checkpoints,
        })
    }
}
