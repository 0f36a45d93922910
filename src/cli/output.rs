//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use chrono::{DateTime, Duration, Utc};
use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::vault::{vault_short_name, ExpiryStatus, Secret, VaultClient};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Human label for an expiry status.
pub fn status_label(status: ExpiryStatus) -> &'static str {
    match status {
        ExpiryStatus::Expired => "expired",
        ExpiryStatus::ExpiringSoon => "expiring soon",
        ExpiryStatus::Valid => "ok",
        ExpiryStatus::NoExpiry => "no expiry",
    }
}

fn format_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Print the expiry line of a secret, red if expired, yellow if soon.
pub fn print_expiry(secret: &Secret, now: DateTime<Utc>, window: Duration) {
    let Some(expires) = secret.expires_on else {
        return;
    };
    let line = format!("Expires: {}", format_time(Some(expires)));
    match secret.expiry_status_at(now, window) {
        ExpiryStatus::Expired => println!("{}", style(line).red()),
        ExpiryStatus::ExpiringSoon => println!("{}", style(line).yellow()),
        _ => println!("{}", style(line).dim()),
    }
}

/// Print a table of secrets (Vault, Name, Expires, Status).
pub fn print_secrets_table(rows: &[(String, Secret)], now: DateTime<Utc>, window: Duration) {
    if rows.is_empty() {
        info("No secrets in the active vaults.");
        tip("Run `azkv vaults select` to change which vaults are active.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Vault", "Name", "Expires", "Status"]);

    for (url, s) in rows {
        table.add_row(vec![
            vault_short_name(url).to_string(),
            s.name.clone(),
            format_time(s.expires_on),
            status_label(s.expiry_status_at(now, window)).to_string(),
        ]);
    }

    println!("{table}");
}

/// Print a table of registered vaults (URL, Active, Last login).
pub fn print_vaults_table<'a>(clients: impl Iterator<Item = &'a VaultClient>) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Vault", "Active", "Last login"]);

    let mut any = false;
    for client in clients {
        any = true;
        table.add_row(vec![
            client.vault_url().to_string(),
            if client.is_active() { "yes" } else { "no" }.to_string(),
            format_time(client.settings().last_login_time()),
        ]);
    }

    if !any {
        info("No vaults registered.");
        tip("Run `azkv vaults add` to add your first vault.");
        return;
    }

    println!("{table}");
}
