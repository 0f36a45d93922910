//! `azkv vaults`: add, remove, log in to, and select vaults.

use dialoguer::{Confirm, MultiSelect};

use crate::cli::output;
use crate::cli::{prompt_error, prompt_vault_url, resolve_vault_url, Cli, VaultAction};
use crate::errors::{AzkvError, Result};
use crate::vault::{normalize_vault_url, LoginOutcome, VaultRegistry};

/// Execute a `vaults` subcommand.
pub fn execute(cli: &Cli, action: &VaultAction) -> Result<()> {
    let mut ctx = crate::cli::open_context(cli)?;
    let registry = &mut ctx.registry;

    match action {
        VaultAction::Add { vault_url } => add(registry, vault_url.as_deref()),
        VaultAction::Remove { vault_url, force } => remove(registry, vault_url.as_deref(), *force),
        VaultAction::Login { vault_url, force } => login(registry, vault_url.as_deref(), *force),
        VaultAction::Logout { vault_url } => logout(registry, vault_url.as_deref()),
        VaultAction::Select { enable_all } => select(registry, *enable_all),
        VaultAction::List => {
            output::print_vaults_table(registry.clients());
            Ok(())
        }
    }
}

/// Add a vault (prompting for its URL if needed), log in, and persist.
pub fn add(registry: &mut VaultRegistry, vault_url: Option<&str>) -> Result<()> {
    let url = match vault_url {
        Some(raw) => normalize_vault_url(raw)?,
        None => prompt_vault_url()?,
    };
    if registry.contains(&url) {
        return Err(AzkvError::DuplicateVault(url));
    }

    let mut client = registry.new_client(&url)?;
    client.login(false)?;
    registry.add_client(client)?;

    output::success(&format!("Added vault {url}"));
    Ok(())
}

fn remove(registry: &mut VaultRegistry, vault_url: Option<&str>, force: bool) -> Result<()> {
    let url = resolve_vault_url(registry, vault_url, "Select vault to remove")?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove vault {url}?"))
            .default(false)
            .interact()
            .map_err(prompt_error)?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    if registry.remove_client(&url)? {
        output::success(&format!("Removed vault {url}"));
    } else {
        output::warning(&format!("Vault {url} was not registered; nothing removed"));
    }
    Ok(())
}

fn login(registry: &mut VaultRegistry, vault_url: Option<&str>, force: bool) -> Result<()> {
    let url = resolve_vault_url(registry, vault_url, "Select vault to log in to")?;
    match registry.login_vault(&url, force)? {
        LoginOutcome::Fresh => output::success(&format!("Logged in to {url}")),
        LoginOutcome::Reused => output::success(&format!("Reused cached login for {url}")),
    }
    Ok(())
}

fn logout(registry: &mut VaultRegistry, vault_url: Option<&str>) -> Result<()> {
    let url = resolve_vault_url(registry, vault_url, "Select vault to log out of")?;
    registry.logout(&url)?;
    output::success(&format!("Cached login for {url} removed"));
    Ok(())
}

fn select(registry: &mut VaultRegistry, enable_all: bool) -> Result<()> {
    if registry.is_empty() {
        return Err(AzkvError::NoVaults);
    }

    if enable_all {
        registry.activate_all()?;
        output::success(&format!("All {} vault(s) active", registry.len()));
        return Ok(());
    }

    let items: Vec<(String, bool)> = registry
        .clients()
        .map(|c| (c.vault_url().to_string(), c.is_active()))
        .collect();

    let chosen = MultiSelect::new()
        .with_prompt("Select active vaults (space to toggle, enter to save)")
        .items_checked(&items)
        .interact()
        .map_err(prompt_error)?;

    let urls: Vec<String> = chosen.into_iter().map(|i| items[i].0.clone()).collect();
    registry.select_active(&urls)?;

    output::success(&format!("{} vault(s) active", urls.len()));
    Ok(())
}
