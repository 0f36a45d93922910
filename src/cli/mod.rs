//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dialoguer::{FuzzySelect, Input, Select};

use crate::backend::AzureCliAuthenticator;
use crate::config::{resolve_config_dir, AppSettings};
use crate::errors::{AzkvError, Result};
use crate::vault::{
    normalize_vault_url, vault_short_name, OperationOutput, Secret, VaultOperation,
    VaultRegistry,
};

/// azkv CLI: Azure Key Vault secrets across vaults.
#[derive(Parser)]
#[command(
    name = "azkv",
    about = "Browse, view, edit and check Azure Key Vault secrets",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory (default: ~/.azkv)
    #[arg(long, env = "AZKV_HOME", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Increase diagnostic output (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Select a secret across active vaults, print it and copy it
    Show {
        /// Secret name (pre-fills the fuzzy search)
        name: Option<String>,
        /// Do not copy the value to the clipboard
        #[arg(long)]
        no_copy: bool,
    },

    /// Print secret names containing TEXT (case-insensitive)
    Find {
        /// Substring to search for
        text: String,
    },

    /// Edit a secret's value in your editor
    Edit {
        /// Secret name (pre-fills the fuzzy search)
        name: Option<String>,
    },

    /// Report expired and soon-to-expire secrets
    Check,

    /// List secrets of all active vaults
    List,

    /// Manage vaults (add, remove, login, select)
    Vaults {
        #[command(subcommand)]
        action: VaultAction,
    },

    /// Remove all vaults and cached logins
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell)
        shell: String,
    },
}

/// Vault subcommands.
#[derive(clap::Subcommand)]
pub enum VaultAction {
    /// Add a new vault and log in to it
    Add {
        /// URL of the Key Vault (prompted if omitted)
        #[arg(long)]
        vault_url: Option<String>,
    },

    /// Remove a vault
    Remove {
        /// URL of the Key Vault (prompted if omitted)
        #[arg(long)]
        vault_url: Option<String>,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Log in to a vault
    Login {
        /// URL of the Key Vault (prompted if omitted)
        #[arg(long)]
        vault_url: Option<String>,
        /// Ignore the cached login and authenticate again
        #[arg(long)]
        force: bool,
    },

    /// Forget a vault's cached login
    Logout {
        /// URL of the Key Vault (prompted if omitted)
        #[arg(long)]
        vault_url: Option<String>,
    },

    /// Choose which vaults are active
    Select {
        /// Activate every vault without prompting
        #[arg(long)]
        enable_all: bool,
    },

    /// List registered vaults
    List,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Loaded configuration plus the vault registry it points at.
pub struct Context {
    pub settings: AppSettings,
    pub registry: VaultRegistry,
}

/// Resolve the config directory, load `config.toml`, and load the registry.
pub fn open_context(cli: &Cli) -> Result<Context> {
    let config_dir = resolve_config_dir(cli.config_dir.as_deref())?;
    let settings = AppSettings::load(&config_dir)?;

    let authenticator =
        AzureCliAuthenticator::new(settings.tenant_id.clone(), settings.request_timeout());
    let registry = VaultRegistry::open(
        settings.settings_path(&config_dir),
        Arc::new(authenticator),
        settings.reauth_policy(),
    )?;

    Ok(Context { settings, registry })
}

/// Make sure at least one vault exists (prompting to add one) and log
/// every vault in.
pub fn ensure_logged_in(registry: &mut VaultRegistry) -> Result<()> {
    if registry.is_empty() {
        output::info("No vaults configured yet.");
        commands::vaults::add(registry, None)?;
    }
    registry.login_all()
}

pub(crate) fn prompt_error(e: dialoguer::Error) -> AzkvError {
    AzkvError::CommandFailed(format!("prompt: {e}"))
}

/// Ask for a vault URL until a valid one is entered.
pub fn prompt_vault_url() -> Result<String> {
    let raw: String = Input::new()
        .with_prompt("Enter Vault URL")
        .validate_with(|input: &String| -> std::result::Result<(), String> {
            normalize_vault_url(input)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()
        .map_err(prompt_error)?;
    normalize_vault_url(&raw)
}

/// Use `arg` if given (it must be registered), otherwise let the user pick.
pub fn resolve_vault_url(
    registry: &VaultRegistry,
    arg: Option<&str>,
    prompt: &str,
) -> Result<String> {
    if let Some(raw) = arg {
        let url = normalize_vault_url(raw)?;
        if !registry.contains(&url) {
            return Err(AzkvError::VaultNotRegistered(url));
        }
        return Ok(url);
    }

    let urls = registry.vault_urls();
    if urls.is_empty() {
        return Err(AzkvError::NoVaults);
    }

    let idx = Select::new()
        .with_prompt(prompt)
        .items(&urls)
        .default(0)
        .interact()
        .map_err(prompt_error)?;
    Ok(urls[idx].clone())
}

/// Secret metadata from every active vault as `(vault_url, secret)` pairs,
/// sorted by secret name. Vaults that fail are reported as warnings.
pub fn gather_secrets(registry: &VaultRegistry) -> Vec<(String, Secret)> {
    let mut rows = Vec::new();
    for (url, result) in registry.run_across_active(&VaultOperation::GetSecrets) {
        match result {
            Ok(OperationOutput::Secrets(secrets)) => {
                rows.extend(secrets.into_iter().map(|s| (url.clone(), s)));
            }
            Ok(_) => {}
            Err(e) => output::warning(&format!("{}: {e}", vault_short_name(&url))),
        }
    }
    rows.sort_by(|a, b| a.1.name.cmp(&b.1.name).then_with(|| a.0.cmp(&b.0)));
    rows
}

/// Display label for a secret in pickers: `[kv-prod] db-password`.
pub fn secret_label(vault_url: &str, name: &str) -> String {
    format!("[{}] {}", vault_short_name(vault_url), name)
}

/// Let the user fuzzy-pick a secret across active vaults.
///
/// If `name` matches exactly one secret it is returned without prompting.
/// Returns `(vault_url, secret_name)`.
pub fn select_secret(registry: &VaultRegistry, name: Option<&str>) -> Result<(String, String)> {
    let rows = gather_secrets(registry);
    if rows.is_empty() {
        return Err(AzkvError::CommandFailed(
            "no secrets found in the active vaults".into(),
        ));
    }

    if let Some(wanted) = name {
        let exact: Vec<&(String, Secret)> = rows.iter().filter(|(_, s)| s.name == wanted).collect();
        if let [(url, secret)] = exact.as_slice() {
            return Ok((url.clone(), secret.name.clone()));
        }
    }

    let labels: Vec<String> = rows
        .iter()
        .map(|(url, s)| secret_label(url, &s.name))
        .collect();

    let picked = FuzzySelect::new()
        .with_prompt("Select a secret")
        .items(&labels)
        .with_initial_text(name.unwrap_or_default())
        .default(0)
        .interact_opt()
        .map_err(prompt_error)?;

    match picked {
        Some(idx) => {
            let (url, secret) = &rows[idx];
            Ok((url.clone(), secret.name.clone()))
        }
        None => Err(AzkvError::UserCancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn secret_label_uses_short_vault_name() {
        assert_eq!(
            secret_label("https://kv-prod.vault.azure.net", "db-password"),
            "[kv-prod] db-password"
        );
    }

    #[test]
    fn parses_vault_subcommands() {
        let cli = Cli::try_parse_from([
            "azkv",
            "vaults",
            "login",
            "--vault-url",
            "https://kv.vault.azure.net",
            "--force",
        ])
        .unwrap();
        match cli.command {
            Commands::Vaults {
                action: VaultAction::Login { vault_url, force },
            } => {
                assert_eq!(vault_url.as_deref(), Some("https://kv.vault.azure.net"));
                assert!(force);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn verbose_is_counted() {
        let cli = Cli::try_parse_from(["azkv", "-vv", "check"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
