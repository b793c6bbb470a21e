//! Terminal output for the `ckpt` binary
//!
//! Styled output and confirmation prompts via `cliclack`, with plain
//! fallbacks when stdout or stdin is not a terminal.

mod context;
mod output;
mod prompts;

pub use context::UiContext;
pub use output::{key_value, remark, section, step_ok, step_warn};
pub use prompts::confirm;
