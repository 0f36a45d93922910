//! `azkv find`: print secret names containing a substring.

use crate::cli::output;
use crate::cli::{ensure_logged_in, gather_secrets, open_context, secret_label, Cli};
use crate::errors::Result;
use crate::vault::Secret;

/// Execute the `find` command.
pub fn execute(cli: &Cli, text: &str) -> Result<()> {
    let mut ctx = open_context(cli)?;
    ensure_logged_in(&mut ctx.registry)?;

    let rows = gather_secrets(&ctx.registry);
    if rows.is_empty() {
        output::info("No secrets found.");
        return Ok(());
    }

    let matches = filter_by_name(&rows, text);
    if matches.is_empty() {
        output::info(&format!("No secret names contain '{text}'."));
        return Ok(());
    }

    for (url, secret) in matches {
        println!("{}", secret_label(url, &secret.name));
    }
    Ok(())
}

/// Rows whose secret name contains `text`, ignoring case.
pub fn filter_by_name<'a>(rows: &'a [(String, Secret)], text: &str) -> Vec<&'a (String, Secret)> {
    let needle = text.to_lowercase();
    rows.iter()
        .filter(|(_, s)| s.name.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(url: &str, name: &str) -> (String, Secret) {
        (
            url.to_string(),
            Secret {
                name: name.to_string(),
                expires_on: None,
                value: None,
            },
        )
    }

    #[test]
    fn matches_case_insensitively() {
        let rows = vec![
            row("https://a.vault.azure.net", "Db-Password"),
            row("https://a.vault.azure.net", "api-key"),
            row("https://b.vault.azure.net", "db-user"),
        ];
        let names: Vec<&str> = filter_by_name(&rows, "DB")
            .into_iter()
            .map(|(_, s)| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Db-Password", "db-user"]);
    }

    #[test]
    fn no_match_is_empty() {
        let rows = vec![row("https://a.vault.azure.net", "api-key")];
        assert!(filter_by_name(&rows, "token").is_empty());
    }
}
