//! Filesystem primitives used by the orchestrator and the config store.
//!
//! Every failure carries the operation and the path it touched.

use crate::error::{MkcdError, Result};
use chrono::Local;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Missing parent directories are created first.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| MkcdError::fs("create directory", parent, e))?;
    }
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| MkcdError::fs("create tempfile in", dir, e))?;
    tmp.write_all(data)
        .map_err(|e| MkcdError::fs("write", tmp.path().to_path_buf(), e))?;
    tmp.persist(path)
        .map_err(|e| MkcdError::fs("persist", path, e.error))?;
    Ok(())
}

/// Create `path` and any missing parents. Idempotent for existing directories;
/// an existing non-directory is an error.
///
/// Returns the directories this call actually created, outermost first.
pub fn ensure_dir(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_dir() {
        return Ok(Vec::new());
    }
    if path.exists() {
        return Err(MkcdError::Conflict(format!(
            "path exists but is not a directory: {}",
            path.display()
        )));
    }
    let mut missing: Vec<PathBuf> = path
        .ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
        .map(Path::to_path_buf)
        .collect();
    missing.reverse();
    std::fs::create_dir_all(path).map_err(|e| MkcdError::fs("create directory", path, e))?;
    Ok(missing)
}

/// Create an empty file if it does not already exist. Returns true if created.
/// Existing files are never truncated.
pub fn touch(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    std::fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .map_err(|e| MkcdError::fs("create file", path, e))?;
    Ok(true)
}

/// Copy `path` to `<path>.backup-YYYYMMDD-HHMMSS` and return the backup path.
pub fn backup_file(path: &Path) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".backup-{stamp}"));
    let backup = PathBuf::from(name);
    std::fs::copy(path, &backup).map_err(|e| MkcdError::fs("back up", path, e))?;
    tracing::debug!(source = %path.display(), backup = %backup.display(), "created backup");
    Ok(backup)
}

/// Create a symbolic link at `link` pointing to `target`.
pub fn symlink(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    let res = std::os::unix::fs::symlink(target, link);
    #[cfg(windows)]
    let res = if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    };
    res.map_err(|e| MkcdError::fs("create symlink", link, e))
}

/// Copy every file under `src` into `dest`, preserving relative layout.
/// Files that already exist in `dest` are left alone. Returns the number copied.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf());
            MkcdError::fs("read template entry", path, e.into())
        })?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let out = dest.join(rel);
        if entry.file_type().is_dir() {
            ensure_dir(&out)?;
        } else if !out.exists() {
            std::fs::copy(entry.path(), &out).map_err(|e| MkcdError::fs("copy", entry.path(), e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Parse an octal permission string such as `755` or `0700`.
pub fn parse_mode(raw: &str) -> Result<u32> {
    let digits = raw.trim().trim_start_matches("0o");
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|_| MkcdError::InvalidPlan(format!("permission mode '{raw}' is not octal")))?;
    if digits.is_empty() || mode > 0o7777 {
        return Err(MkcdError::InvalidPlan(format!(
            "permission mode '{raw}' is out of range (expected 000-7777)"
        )));
    }
    Ok(mode)
}

/// Apply Unix permission bits to `path`. Returns false on platforms without them.
pub fn set_mode(path: &Path, mode: u32) -> Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .map_err(|e| MkcdError::fs("set permissions on", path, e))?;
        Ok(true)
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/mkcd.conf");
        atomic_write(&path, b"data").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "data");
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x/y");
        let created = ensure_dir(&path).unwrap();
        assert_eq!(created, vec![dir.path().join("x"), dir.path().join("x/y")]);
        assert!(ensure_dir(&path).unwrap().is_empty());
        assert!(path.is_dir());
    }

    #[test]
    fn ensure_dir_rejects_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(ensure_dir(&path), Err(MkcdError::Conflict(_))));
    }

    #[test]
    fn touch_keeps_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("main.py");
        assert!(touch(&path).unwrap());
        std::fs::write(&path, "print()").unwrap();
        assert!(!touch(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "print()");
    }

    #[test]
    fn backup_copies_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("README.md");
        std::fs::write(&path, "old").unwrap();
        let backup = backup_file(&path).unwrap();
        assert!(backup.to_string_lossy().contains("README.md.backup-"));
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "old");
    }

    #[test]
    fn copy_tree_skips_existing_files() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("src")).unwrap();
        std::fs::write(src.path().join("src/index.js"), "// tpl").unwrap();
        std::fs::write(src.path().join("package.json"), "{}").unwrap();
        std::fs::write(dest.path().join("package.json"), "mine").unwrap();

        let copied = copy_tree(src.path(), dest.path()).unwrap();
        assert_eq!(copied, 1);
        assert_eq!(
            std::fs::read_to_string(dest.path().join("package.json")).unwrap(),
            "mine"
        );
        assert!(dest.path().join("src/index.js").exists());
    }

    #[test]
    fn parse_mode_accepts_octal() {
        assert_eq!(parse_mode("755").unwrap(), 0o755);
        assert_eq!(parse_mode("0700").unwrap(), 0o700);
        assert!(parse_mode("888").is_err());
        assert!(parse_mode("rwx").is_err());
        assert!(parse_mode("17777").is_err());
    }
}
