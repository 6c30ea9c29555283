use super::{open_in_editor, Context};
use crate::output::print_json;
use anyhow::Context as _;
use clap::Subcommand;
use mkcd_core::config::{Config, WarnLevel};
use mkcd_core::io;
use mkcd_core::report::Reporter;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write a default config file
    Init,

    /// Print the effective configuration
    Show,

    /// Open the config file in $EDITOR, then re-validate it
    Edit,

    /// Check the config for mistakes
    Validate,

    /// Replace the config file with the defaults
    Reset,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(ctx: &Context, subcmd: ConfigSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Init => init(ctx),
        ConfigSubcommand::Show => show(ctx),
        ConfigSubcommand::Edit => edit(ctx),
        ConfigSubcommand::Validate => validate(ctx),
        ConfigSubcommand::Reset => reset(ctx),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(ctx: &Context) -> anyhow::Result<()> {
    let path = &ctx.config_path;
    if path.exists() && !ctx.force {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    let config = Config::default();
    let reporter = ctx.reporter(&config);
    if ctx.dry_run {
        reporter.info(&format!("[dry-run] would write default config to {}", path.display()));
        return Ok(());
    }

    ctx.save_config(&config)?;
    io::ensure_dir(&config.templates_dir()).with_context(|| {
        format!(
            "failed to create template directory {}",
            config.templates.directory
        )
    })?;
    reporter.success(&format!("Created config at {}", path.display()));
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    if ctx.json {
        return print_json(&config);
    }
    let source = if ctx.config_path.exists() {
        ctx.config_path.display().to_string()
    } else {
        format!("{} (not found, showing defaults)", ctx.config_path.display())
    };
    println!("# {source}");
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}

// ---------------------------------------------------------------------------
// edit
// ---------------------------------------------------------------------------

fn edit(ctx: &Context) -> anyhow::Result<()> {
    if !ctx.config_path.exists() {
        ctx.save_config(&Config::default())?;
    }
    open_in_editor(&ctx.config_path)?;
    let config = ctx
        .load_config()
        .context("config is invalid after editing; run `mkcd config edit` again to fix it")?;
    ctx.reporter(&config).success("Config is valid");
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(ctx: &Context) -> anyhow::Result<()> {
    let config = Config::load_unchecked(&ctx.config_path)
        .with_context(|| format!("failed to read {}", ctx.config_path.display()))?;
    let warnings = config.validate();

    if ctx.json {
        let value = serde_json::json!({
            "path": ctx.config_path,
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// reset
// ---------------------------------------------------------------------------

fn reset(ctx: &Context) -> anyhow::Result<()> {
    let config = Config::default();
    let reporter = ctx.reporter(&config);
    let confirmed = ctx.force
        || reporter.confirm(
            &format!("Reset {} to defaults?", ctx.config_path.display()),
            false,
        )?;
    if !confirmed {
        reporter.warning("Reset cancelled (use --force to skip the prompt)");
        return Ok(());
    }
    if ctx.dry_run {
        reporter.info(&format!(
            "[dry-run] would reset {} to defaults",
            ctx.config_path.display()
        ));
        return Ok(());
    }

    if ctx.backup && ctx.config_path.exists() {
        let backup = io::backup_file(&ctx.config_path)?;
        reporter.info(&format!("Saved previous config to {}", backup.display()));
    }
    ctx.save_config(&config)?;
    reporter.success("Config reset to defaults");
    Ok(())
}
