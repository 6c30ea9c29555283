use crate::error::{MkcdError, Result};
use std::path::{Component, Path, PathBuf};

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

pub const CONFIG_DIR: &str = ".config/mkcd";
pub const CONFIG_FILE: &str = "mkcd.conf";
pub const TEMPLATES_DIR: &str = "templates";
pub const EXPIRY_MARKER: &str = ".mkcd-expire";

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "MKCD_CONFIG";

pub fn home_dir() -> Result<PathBuf> {
    home::home_dir()
        .filter(|h| !h.as_os_str().is_empty())
        .ok_or(MkcdError::HomeNotFound)
}

/// `~/.config/mkcd`
pub fn config_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join(CONFIG_DIR))
}

/// `~/.config/mkcd/mkcd.conf`
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// `~/.config/mkcd/templates`, or a relative fallback when HOME is unset.
pub fn default_templates_dir() -> PathBuf {
    config_dir()
        .map(|d| d.join(TEMPLATES_DIR))
        .unwrap_or_else(|_| PathBuf::from(CONFIG_DIR).join(TEMPLATES_DIR))
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Expand a leading `~` or `~/` to the home directory.
pub fn expand_tilde(raw: &str) -> Result<PathBuf> {
    if raw == "~" {
        return home_dir();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return Ok(home_dir()?.join(rest));
    }
    Ok(PathBuf::from(raw))
}

/// Lexically normalize `path`: drop `.` components and collapse repeated
/// separators. `..` components are kept as-is; callers that care reject them.
pub fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Resolve `raw` to an absolute, normalized path, expanding `~` and joining
/// relative paths onto `base`.
pub fn absolutize(raw: &str, base: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(raw)?;
    let joined = if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    };
    Ok(normalize(&joined))
}

/// Number of named segments in `path`; the root and prefixes do not count.
pub fn depth(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .count()
}

/// Quote `path` for a POSIX shell. Paths made only of safe characters are
/// returned unchanged.
pub fn shell_quote(path: &Path) -> String {
    let s = path.to_string_lossy();
    let safe = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+,:@%~".contains(c));
    if safe {
        s.into_owned()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
