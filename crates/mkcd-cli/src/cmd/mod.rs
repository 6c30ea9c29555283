pub mod config;
pub mod create;
pub mod profile;

use anyhow::Context as _;
use mkcd_core::config::Config;
use mkcd_core::report::{ConsoleOptions, ConsoleReporter};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Global flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub config_path: PathBuf,
    pub json: bool,
    pub dry_run: bool,
    pub force: bool,
    pub interactive: bool,
    pub backup: bool,
    pub quiet: bool,
    pub debug: bool,
}

impl Context {
    pub fn load_config(&self) -> anyhow::Result<Config> {
        Config::load(&self.config_path)
            .with_context(|| format!("failed to load config from {}", self.config_path.display()))
    }

    pub fn save_config(&self, config: &Config) -> anyhow::Result<()> {
        config
            .save(&self.config_path)
            .with_context(|| format!("failed to save config to {}", self.config_path.display()))
    }

    pub fn reporter(&self, config: &Config) -> ConsoleReporter {
        ConsoleReporter::new(ConsoleOptions {
            quiet: self.quiet,
            debug: self.debug,
            colors: config.output.colors,
            icons: config.output.icons,
            non_interactive: false,
        })
    }
}

/// Open `path` in `$EDITOR`, `$VISUAL` or `vi` and wait for it to exit.
pub fn open_in_editor(path: &Path) -> anyhow::Result<()> {
    let line = ["EDITOR", "VISUAL"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string());
    let mut parts = line.split_whitespace();
    let program = parts.next().unwrap_or("vi");

    tracing::debug!(editor = program, path = %path.display(), "opening file in editor");
    let status = Command::new(program)
        .args(parts)
        .arg(path)
        .status()
        .with_context(|| format!("failed to start editor '{program}'"))?;
    if !status.success() {
        anyhow::bail!("editor '{program}' exited with {status}");
    }
    Ok(())
}
