//! `azkv list`: table of secrets in every active vault.

use chrono::Utc;

use crate::cli::output;
use crate::cli::{ensure_logged_in, gather_secrets, open_context, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let mut ctx = open_context(cli)?;
    ensure_logged_in(&mut ctx.registry)?;

    let rows = gather_secrets(&ctx.registry);
    output::print_secrets_table(&rows, Utc::now(), ctx.settings.expiry_window());
    Ok(())
}
