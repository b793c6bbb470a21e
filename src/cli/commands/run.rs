//! Run command - resolve a pipeline definition into a run plan
//!
//! Stage implementations live in the programs embedding this crate, so
//! the binary stops at the plan: which stages would run, with which
//! parameters, and whether results would be recorded.

use crate::cli::args::RunArgs;
use crate::config::Context;
use crate::error::CkptResult;
use crate::pipeline::{load_pipeline_config, PipelinePlan};
use crate::ui::{self, UiContext};
use tracing::info;

/// Execute the run command
pub fn execute(args: RunArgs, ctx: &Context) -> CkptResult<()> {
    let config = load_pipeline_config(&args.config)?;
    let dry_run = args.dry_run || ctx.config().experiments.dry_run;
    let plan = PipelinePlan::from_config(&config, dry_run, !args.no_checkpoints)?;

    info!("Loaded pipeline '{}' from {}", plan.name, args.config.display());
    print_plan(&plan)
}

pub(super) fn print_plan(plan: &PipelinePlan) -> CkptResult<()> {
    println!("{}", serde_json::to_string_pretty(plan)?);
    if plan.dry_run {
        ui::remark(&UiContext::detect(), "Dry run: the experiment record will not be written");
    }
    Ok(())
}
