//! Report command - tabulate stored experiments

use crate::cli::args::{OutputFormat, ReportArgs};
use crate::config::Context;
use crate::error::{CkptError, CkptResult};
use crate::report::{self, MetricRegistry, ReportQuery};
use crate::ui::{self, UiContext};
use std::fs;
use tracing::debug;

/// Execute the report command
pub fn execute(args: ReportArgs, ctx: &Context) -> CkptResult<()> {
    let query = ReportQuery {
        ids: args.ids,
        pipe: args.pipe,
        config_filters: args
            .config_filters
            .iter()
            .map(|f| ReportQuery::parse_filter(f))
            .collect::<CkptResult<_>>()?,
        sort_by: args.sort_by,
        descending: args.desc,
    };
    debug!("Report query: {:?}", query);

    let registry = MetricRegistry::with_defaults();
    let table = report::build_report(ctx, &registry, &query)?;

    let report_config = &ctx.config().report;
    let rendered = match args.output_format {
        OutputFormat::Pretty => report::render_pretty(&table, report_config),
        OutputFormat::Csv => report::render_csv(&table, report_config),
    };

    match args.filename {
        Some(path) => {
            fs::write(&path, rendered)
                .map_err(|e| CkptError::io(format!("writing report {}", path.display()), e))?;
            ui::step_ok(
                &UiContext::detect(),
                &format!("Wrote {} row(s) to {}", table.rows.len(), path.display()),
            );
        }
        None => print!("{}", rendered),
    }

    Ok(())
}
