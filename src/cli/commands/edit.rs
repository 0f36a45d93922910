//! `azkv edit`: open a secret's value in an editor.
//!
//! Fetches the selected secret, writes its value to a private temporary
//! file, launches `$VISUAL` / `$EDITOR` / `vi`, and stores the edited value
//! back in the vault when it changed.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use zeroize::Zeroize;

use crate::cli::output;
use crate::cli::{ensure_logged_in, open_context, select_secret, Cli};
use crate::errors::{AzkvError, Result};
use crate::vault::Secret;

/// Execute the `edit` command.
pub fn execute(cli: &Cli, name: Option<&str>) -> Result<()> {
    let mut ctx = open_context(cli)?;
    ensure_logged_in(&mut ctx.registry)?;

    let (vault_url, secret_name) = select_secret(&ctx.registry, name)?;
    let client = ctx
        .registry
        .get(&vault_url)
        .ok_or_else(|| AzkvError::VaultNotRegistered(vault_url.clone()))?;

    let mut current = client.get_secret(&secret_name)?.value.unwrap_or_default();
    let tmp_path = write_temp_file(&current)?;

    let editor = find_editor();
    let status = Command::new(&editor)
        .arg(&tmp_path)
        .status()
        .map_err(|e| AzkvError::EditorError(format!("failed to launch '{editor}': {e}")));

    let status = match status {
        Ok(status) => status,
        Err(e) => {
            secure_delete(&tmp_path);
            current.zeroize();
            return Err(e);
        }
    };

    if !status.success() {
        secure_delete(&tmp_path);
        current.zeroize();
        return Err(AzkvError::EditorError(format!(
            "editor exited with code {}",
            status.code().unwrap_or(-1)
        )));
    }

    let edited = fs::read_to_string(&tmp_path)
        .map_err(|e| AzkvError::EditorError(format!("failed to read edited file: {e}")));
    secure_delete(&tmp_path);
    let mut edited = match edited {
        Ok(s) => s,
        Err(e) => {
            current.zeroize();
            return Err(e);
        }
    };

    let outcome = match changed_value(&current, &edited) {
        Some(value) => {
            let secret = Secret::new(secret_name.clone(), value);
            let res = client.set_secret(&secret);
            if let Some(mut v) = secret.value {
                v.zeroize();
            }
            res.map(|()| true)
        }
        None => Ok(false),
    };

    current.zeroize();
    edited.zeroize();

    if outcome? {
        output::success(&format!("Updated '{secret_name}' in {vault_url}"));
    } else {
        output::info("No changes detected.");
    }
    Ok(())
}

/// The trimmed edited value, or `None` when it equals the original.
pub fn changed_value(original: &str, edited: &str) -> Option<String> {
    let edited = edited.trim();
    if edited == original.trim() {
        None
    } else {
        Some(edited.to_string())
    }
}

/// Write `value` to a fresh 0600 temp file and return its path.
fn write_temp_file(value: &str) -> Result<PathBuf> {
    let filename = format!(
        "azkv-edit-{}-{}.txt",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
    );
    let tmp_path = std::env::temp_dir().join(filename);

    #[cfg(unix)]
    let mut file = {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&tmp_path)
            .map_err(|e| AzkvError::EditorError(format!("failed to create temp file: {e}")))?
    };

    #[cfg(not(unix))]
    let mut file = fs::File::create(&tmp_path)
        .map_err(|e| AzkvError::EditorError(format!("failed to create temp file: {e}")))?;

    file.write_all(value.as_bytes())?;
    file.flush()?;
    Ok(tmp_path)
}

/// Find the user's preferred editor.
fn find_editor() -> String {
    ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|e| !e.is_empty())
        .unwrap_or_else(|| "vi".to_string())
}

/// Overwrite a file with zeros, then delete it. Best effort.
fn secure_delete(path: &Path) {
    if let Ok(metadata) = fs::metadata(path) {
        let len = metadata.len() as usize;
        if len > 0 {
            if let Ok(mut file) = fs::OpenOptions::new().write(true).open(path) {
                let _ = file.write_all(&vec![0u8; len]);
                let _ = file.flush();
            }
        }
    }
    let _ = fs::remove_file(path);
}
