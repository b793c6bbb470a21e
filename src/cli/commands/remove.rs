//! Remove command - delete stored experiments

use crate::cli::args::RemoveArgs;
use crate::config::Context;
use crate::error::CkptResult;
use crate::experiment::{ExperimentStore, StoredRecord};
use crate::ui::{self, UiContext};

/// Execute the remove command
///
/// Every id is resolved before anything is deleted.
pub fn execute(args: RemoveArgs, ctx: &Context) -> CkptResult<()> {
    let ui_ctx = UiContext::detect().with_auto_yes(args.yes);
    let store = ExperimentStore::new(ctx);

    let mut targets: Vec<StoredRecord> = Vec::new();
    for id in &args.ids {
        let stored = store.resolve(id)?;
        if !targets.iter().any(|t| t.address == stored.address) {
            targets.push(stored);
        }
    }

    let prompt = format!("Remove {} experiment(s)?", targets.len());
    if !ui::confirm(&ui_ctx, &prompt, true)? {
        ui::step_warn(&ui_ctx, "Nothing removed");
        return Ok(());
    }

    for stored in &targets {
        store.remove(stored)?;
        ui::step_ok(
            &ui_ctx,
            &format!("Removed {} ({})", stored.address, stored.record.name),
        );
    }

    Ok(())
}
