//! Rerun command - preview re-running a stored experiment

use super::run::print_plan;
use crate::cli::args::RerunArgs;
use crate::config::Context;
use crate::error::CkptResult;
use crate::experiment::ExperimentStore;
use crate::pipeline::PipelinePlan;
use tracing::info;

/// Execute the rerun command
///
/// Reruns are always dry runs with checkpoints enabled.
pub fn execute(args: RerunArgs, ctx: &Context) -> CkptResult<()> {
    let stored = ExperimentStore::new(ctx).resolve(&args.id)?;
    info!("Rerunning experiment {} ('{}')", stored.address, stored.record.name);

    let plan = PipelinePlan::from_config(&stored.record.configuration, true, true)?;
    print_plan(&plan)
}
