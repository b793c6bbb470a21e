//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, Context};
use crate::error::CkptResult;
use crate::ui::{self, UiContext};

/// Execute the config command
pub fn execute(args: ConfigArgs, ctx: &Context) -> CkptResult<()> {
    let manager = ConfigManager::new(ctx.root());

    match args.action {
        None | Some(ConfigAction::Show) => show_config(ctx.config())?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(&manager, force)?,
    }

    Ok(())
}

fn show_config(config: &Config) -> CkptResult<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn init_config(manager: &ConfigManager, force: bool) -> CkptResult<()> {
    let ui_ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn(
            &ui_ctx,
            &format!("Config already exists at {} (use --force to overwrite)", path.display()),
        );
        return Ok(());
    }

    manager.save(&Config::default())?;
    ui::step_ok(&ui_ctx, &format!("Configuration written to {}", path.display()));
    Ok(())
}
