//! `azkv reset`: forget every vault and cached login.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{open_context, prompt_error, Cli};
use crate::errors::Result;

/// Execute the `reset` command.
pub fn execute(cli: &Cli, force: bool) -> Result<()> {
    let mut ctx = open_context(cli)?;
    let count = ctx.registry.len();

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove all {count} vault(s) and cached logins?"))
            .default(false)
            .interact()
            .map_err(prompt_error)?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    ctx.registry.reset()?;
    output::success(&format!(
        "Registry reset ({count} vault(s) removed) at {}",
        ctx.registry.path().display()
    ));
    Ok(())
}
