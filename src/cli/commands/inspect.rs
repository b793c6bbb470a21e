//! Inspect command - show one stored experiment

use crate::cli::args::InspectArgs;
use crate::config::Context;
use crate::error::CkptResult;
use crate::experiment::{ExperimentStore, Outcome, RecordLocation, StoredRecord};
use crate::hash::scalar_repr;
use crate::report::{flatten, MetricRegistry};
use crate::ui::{self, UiContext};

/// Execute the inspect command
pub fn execute(args: InspectArgs, ctx: &Context) -> CkptResult<()> {
    let stored = ExperimentStore::new(ctx).resolve(&args.id)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stored.record)?);
        return Ok(());
    }

    print_record(&UiContext::detect(), &stored, ctx)
}

fn print_record(ui_ctx: &UiContext, stored: &StoredRecord, ctx: &Context) -> CkptResult<()> {
    let record = &stored.record;
    let precision = ctx.config().report.float_precision;

    ui::section(ui_ctx, &format!("Experiment {}", stored.address));
    ui::key_value(ui_ctx, "name", &record.name);
    ui::key_value(ui_ctx, "started", &record.metadata.start_time.to_rfc3339());
    if let Some(stop) = record.metadata.stop_time {
        ui::key_value(ui_ctx, "stopped", &stop.to_rfc3339());
    }
    let location = match &stored.location {
        RecordLocation::Blob(path) => path.display().to_string(),
        RecordLocation::Legacy(path) => format!("{} (read-only layout)", path.display()),
    };
    ui::key_value(ui_ctx, "location", &location);

    ui::section(ui_ctx, "Configuration");
    for (key, value) in flatten(&record.configuration)? {
        ui::key_value(ui_ctx, &key, &scalar_repr(&value));
    }

    let kind = match &record.outcome {
        Some(Outcome::RawResults { .. }) => "Metrics (from raw results)",
        _ => "Metrics",
    };
    ui::section(ui_ctx, kind);
    for (key, value) in record.metrics(&MetricRegistry::with_defaults()) {
        ui::key_value(ui_ctx, &key, &format!("{:.*}", precision, value));
    }

    if !record.checkpoints.is_empty() {
        ui::section(ui_ctx, "Checkpoints");
        for address in &record.checkpoints {
            let state = if ctx.checkpoints_dir().join(address).is_dir() {
                "present"
            } else {
                "missing"
            };
            ui::key_value(ui_ctx, address, state);
        }
    }

    Ok(())
}
