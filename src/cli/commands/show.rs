//! `azkv show`: pick a secret, print it, and copy its value.

use chrono::Utc;
use console::style;

use crate::cli::output;
use crate::cli::{ensure_logged_in, open_context, select_secret, Cli};
use crate::errors::{AzkvError, Result};

/// Execute the `show` command.
pub fn execute(cli: &Cli, name: Option<&str>, no_copy: bool) -> Result<()> {
    let mut ctx = open_context(cli)?;
    ensure_logged_in(&mut ctx.registry)?;

    let (vault_url, secret_name) = select_secret(&ctx.registry, name)?;
    let client = ctx
        .registry
        .get(&vault_url)
        .ok_or_else(|| AzkvError::VaultNotRegistered(vault_url.clone()))?;
    let secret = client.get_secret(&secret_name)?;

    println!("{}", style(format!("Secret: {}", secret.name)).bold());
    println!("{}", style(format!("Vault:  {vault_url}")).dim());
    output::print_expiry(&secret, Utc::now(), ctx.settings.expiry_window());
    println!();

    let value = secret.value.unwrap_or_default();
    println!("{value}");

    if !no_copy {
        copy_to_clipboard(&value);
    }

    Ok(())
}

/// Best-effort clipboard copy; failures only produce a warning.
#[cfg(feature = "clipboard")]
fn copy_to_clipboard(value: &str) {
    match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(value.to_string())) {
        Ok(()) => output::tip("Value copied to clipboard."),
        Err(e) => output::warning(&format!("Could not copy to clipboard: {e}")),
    }
}

#[cfg(not(feature = "clipboard"))]
fn copy_to_clipboard(_value: &str) {
    output::tip("Clipboard support not compiled in.");
}
