//! `azkv check`: report expired and soon-to-expire secrets.

use chrono::{DateTime, Duration, Utc};
use console::style;

use crate::cli::{ensure_logged_in, gather_secrets, open_context, secret_label, Cli};
use crate::errors::Result;
use crate::vault::{ExpiryStatus, Secret};

/// Secrets of the active vaults grouped by expiry state.
#[derive(Debug, Default)]
pub struct ExpiryReport<'a> {
    pub expired: Vec<&'a (String, Secret)>,
    pub expiring_soon: Vec<&'a (String, Secret)>,
    pub valid: Vec<&'a (String, Secret)>,
}

impl<'a> ExpiryReport<'a> {
    /// Group `rows`. Secrets without an expiry count as valid.
    pub fn build(rows: &'a [(String, Secret)], now: DateTime<Utc>, window: Duration) -> Self {
        let mut report = Self::default();
        for row in rows {
            match row.1.expiry_status_at(now, window) {
                ExpiryStatus::Expired => report.expired.push(row),
                ExpiryStatus::ExpiringSoon => report.expiring_soon.push(row),
                ExpiryStatus::Valid | ExpiryStatus::NoExpiry => report.valid.push(row),
            }
        }
        report
    }

    pub fn is_clean(&self) -> bool {
        self.expired.is_empty() && self.expiring_soon.is_empty()
    }
}

/// Execute the `check` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let mut ctx = open_context(cli)?;
    ensure_logged_in(&mut ctx.registry)?;

    let rows = gather_secrets(&ctx.registry);
    let report = ExpiryReport::build(&rows, Utc::now(), ctx.settings.expiry_window());

    if report.is_clean() {
        println!("{}", style("No expired secrets found!").green());
        return Ok(());
    }

    print_group("Expired", &report.expired, |s| style(s).red().to_string());
    print_group("Soon to expire", &report.expiring_soon, |s| {
        style(s).yellow().to_string()
    });
    print_group("Not expired", &report.valid, |s| style(s).dim().to_string());

    Ok(())
}

fn print_group(title: &str, rows: &[&(String, Secret)], paint: impl Fn(String) -> String) {
    if rows.is_empty() {
        return;
    }
    println!("{}", style(format!("{title} ({})", rows.len())).bold());
    for (url, secret) in rows {
        let expires = secret
            .expires_on
            .map(|t| format!(" ({})", t.format("%Y-%m-%d")))
            .unwrap_or_default();
        println!("  {}", paint(format!("{}{expires}", secret_label(url, &secret.name))));
    }
    println!();
}
