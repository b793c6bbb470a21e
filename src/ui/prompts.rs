//! Confirmation prompts

use super::context::UiContext;
use crate::error::{CkptError, CkptResult};

/// Ask a yes/no question
///
/// Auto-approved with `--yes`. Non-interactive runs get `default`
/// without prompting.
pub fn confirm(ctx: &UiContext, message: &str, default: bool) -> CkptResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    cliclack::confirm(message)
        .initial_value(default)
        .interact()
        .map_err(|e| CkptError::User(format!("Prompt failed: {}", e)))
}
