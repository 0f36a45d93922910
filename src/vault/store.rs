//! Settings file I/O.
//!
//! The registry is the only writer. Writes go to a temp file in the same
//! directory and are renamed over the target, so readers never see a
//! half-written file. Concurrent processes are last-writer-wins.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::errors::Result;

/// Read the raw settings file. Returns `None` if it does not exist.
///
/// Decoding is left to the caller so that invalid UTF-8 is treated as a
/// malformed store rather than an I/O failure.
pub fn read_store(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Replace the settings file atomically, creating its directory if needed.
pub fn write_store(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    // Auth records live in here; the file is owner-only from creation on.
    #[cfg(unix)]
    let mut file = {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp_path)?;
        // A leftover temp file keeps its old mode; `mode` only applies on create.
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file
    };

    #[cfg(not(unix))]
    let mut file = fs::File::create(&tmp_path)?;

    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Last modification time of the settings file, `None` if it is missing.
pub fn modified_at(path: &Path) -> Result<Option<DateTime<Utc>>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(DateTime::<Utc>::from(meta.modified()?))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn read_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_store(&dir.path().join("settings.json")).unwrap().is_none());
        assert!(modified_at(&dir.path().join("settings.json")).unwrap().is_none());
    }

    #[test]
    fn write_creates_parent_and_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        write_store(&path, b"{\"a\":1}").unwrap();
        write_store(&path, b"{}").unwrap();

        assert_eq!(read_store(&path).unwrap().as_deref(), Some(&b"{}"[..]));
        assert!(modified_at(&path).unwrap().is_some());
        // No temp file left behind.
        assert!(!dir.path().join("nested").join(".settings.json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn written_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        write_store(&path, b"{}").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn leftover_world_readable_temp_file_is_tightened() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let tmp = dir.path().join(".settings.json.tmp");
        fs::write(&tmp, b"stale").unwrap();
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o644)).unwrap();

        write_store(&path, b"{}").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn read_returns_raw_bytes_even_if_not_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, [b'{', 0xff, 0xfe, b'}']).unwrap();

        assert_eq!(
            read_store(&path).unwrap(),
            Some(vec![b'{', 0xff, 0xfe, b'}'])
        );
    }
}
