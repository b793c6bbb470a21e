//! Experiment recording
//!
//! A run accumulates metrics or raw results inside an [`ExperimentScope`].
//! When the scope ends, the record is written once under its content
//! address; a run that produced nothing is not recorded.

pub mod record;
pub mod short_hash;
pub mod store;

pub use record::{ExperimentRecord, Metadata, Outcome, RawResult, FORMAT_VERSION};
pub use short_hash::{unique_prefix_len, ShortHashIndex};
pub use store::{ExperimentStore, RecordLocation, StoredRecord};

use crate::checkpoint::{Checkpoint, CheckpointChain, Dependency};
use crate::config::Context;
use crate::error::CkptResult;
use crate::hash::ParamMap;
use chrono::Utc;
use serde_json::{Map, Value};
use std::rc::Rc;
use tracing::{info, warn};

/// Open a recording scope for one run
pub fn record(ctx: &Context, name: impl Into<String>, configuration: Map<String, Value>) -> ExperimentScope {
    ExperimentScope::begin(ctx, name, configuration)
}

/// Accumulates the outcome of one run
///
/// Call [`ExperimentScope::finish`] to persist and observe errors. A
/// scope dropped without finishing persists on a best-effort basis and
/// only logs failures.
pub struct ExperimentScope {
    store: ExperimentStore,
    dry_run: bool,
    record: ExperimentRecord,
    chain: CheckpointChain,
    finished: bool,
}

impl ExperimentScope {
    pub fn begin(ctx: &Context, name: impl Into<String>, configuration: Map<String, Value>) -> Self {
        let record = ExperimentRecord::new(name, configuration);
        info!("Running experiment '{}'", record.name);

        Self {
            store: ExperimentStore::new(ctx),
            dry_run: ctx.config().experiments.dry_run,
            record,
            chain: CheckpointChain::new(ctx),
            finished: false,
        }
    }

    /// Exercise everything but the final write
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn record(&self) -> &ExperimentRecord {
        &self.record
    }

    pub fn add_metrics(
        &mut self,
        metrics: impl IntoIterator<Item = (String, f64)>,
    ) -> CkptResult<()> {
        let metrics: Vec<(String, f64)> = metrics.into_iter().collect();
        for (key, value) in &metrics {
            info!("Added metric: {} = {}", key, value);
        }
        self.record.add_metrics(metrics)
    }

    pub fn add_results(
        &mut self,
        name: impl Into<String>,
        ground_truth: Vec<f64>,
        predictions: Vec<f64>,
    ) -> CkptResult<()> {
        let name = name.into();
        info!("Added results: {} ({} predictions)", name, predictions.len());
        self.record
            .add_results(name, RawResult::new(ground_truth, predictions))
    }

    /// Append a checkpoint to this run's chain
    pub fn add_checkpoint(
        &mut self,
        name: impl Into<String>,
        params: ParamMap,
        dependencies: Vec<Dependency>,
    ) -> Rc<Checkpoint> {
        self.chain.add(name, params, dependencies)
    }

    /// This run's checkpoint chain, for cached stages and pipelines
    pub fn chain_mut(&mut self) -> &mut CheckpointChain {
        &mut self.chain
    }

    /// Persist the record
    ///
    /// Returns the address the record is (or, in a dry run, would be)
    /// stored under, or `None` if nothing was added.
    pub fn finish(mut self) -> CkptResult<Option<String>> {
        self.finished = true;
        self.persist()
    }

    fn persist(&mut self) -> CkptResult<Option<String>> {
        info!("Experiment done, saving config and results.");
        self.record.metadata.stop_time = Some(Utc::now());
        // Unresolved checkpoints never produced output for this run
        self.record.checkpoints = self
            .chain
            .iter()
            .filter_map(|c| c.address().ok().map(str::to_string))
            .collect();

        if self.record.is_empty() {
            info!(
                "Experiment '{}' produced no metrics or results, not recording",
                self.record.name
            );
            return Ok(None);
        }

        if self.dry_run {
            self.record.validate()?;
            let address = self.record.content_address()?;
            info!("Dry run, not saving experiment {}", address);
            return Ok(Some(address));
        }

        self.store.save(&self.record).map(Some)
    }
}

impl Drop for ExperimentScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.persist() {
            warn!("Failed to save experiment '{}': {}", self.record.name, e);
        }
    }
}
