//! ckpt - content-addressed checkpoints for staged pipelines
//!
//! Each pipeline stage's output is cached under a digest of the stage
//! name, its parameters, its input files and everything its predecessor
//! wrote. Finished runs are stored as experiment records that can be
//! scored, pruned and tabulated long after the run.

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod experiment;
pub mod hash;
pub mod pipeline;
pub mod report;
pub mod stage;
pub mod ui;

pub use checkpoint::{Checkpoint, CheckpointChain, CheckpointState, Dependency};
pub use config::{Config, Context};
pub use error::{CkptError, CkptResult};
pub use experiment::{record, ExperimentScope, ExperimentStore};
pub use pipeline::{Pipeline, StageFactory};
pub use report::MetricRegistry;
pub use stage::{compute_cached, CachedStage, Fittable, PipelineStage, Predictable, Stage, Transformable};
