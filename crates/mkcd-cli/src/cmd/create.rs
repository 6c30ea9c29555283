use super::Context;
use crate::output::print_json;
use anyhow::Context as _;
use clap::Args;
use mkcd_core::documents::BuiltinDocuments;
use mkcd_core::editor::SystemEditors;
use mkcd_core::orchestrator::{Collaborators, Orchestrator, OrchestratorOptions};
use mkcd_core::paths;
use mkcd_core::report::Reporter;
use mkcd_core::settings::{merge_layers, IgnoreFlavor, LicenseFlavor, Settings};
use mkcd_core::vcs::GitCli;
use mkcd_core::MkcdError;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Workspace options. Shared by `mkcd <dir>` and `mkcd profile create`.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Initialize a git repository
    #[arg(long)]
    pub git: bool,

    /// Add a git remote (implies --git)
    #[arg(long, value_name = "URL", conflicts_with = "symlink")]
    pub git_remote: Option<String>,

    /// Copy files from a local template
    #[arg(short = 't', long, value_name = "NAME")]
    pub template: Option<String>,

    /// Open the workspace in an editor; `--editor=NAME` picks one
    #[arg(
        long,
        value_name = "NAME",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = ""
    )]
    pub editor: Option<String>,

    /// Open the workspace in the detected editor
    #[arg(long)]
    pub open_editor: bool,

    /// Generate README.md
    #[arg(long)]
    pub readme: bool,

    /// Generate .gitignore: go, node, python or general
    #[arg(long, value_name = "FLAVOR")]
    pub gitignore: Option<IgnoreFlavor>,

    /// Generate LICENSE: mit or apache-2.0
    #[arg(long, value_name = "LICENSE")]
    pub license: Option<LicenseFlavor>,

    /// Create empty files (comma-separated)
    #[arg(long, value_name = "FILES", value_delimiter = ',')]
    pub touch: Vec<String>,

    /// Permissions for the directory, e.g. 755
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Permissions for parent directories this run creates
    #[arg(long, value_name = "MODE")]
    pub parent_mode: Option<String>,

    /// Create a symlink to TARGET instead of a directory
    #[arg(short = 's', long, value_name = "TARGET", conflicts_with = "temp")]
    pub symlink: Option<String>,

    /// Create the directory under the configured temp dir
    #[arg(long)]
    pub temp: bool,

    /// Mark the workspace to expire after a duration such as 7d
    #[arg(long, value_name = "DURATION")]
    pub expire: Option<String>,
}

impl SettingsArgs {
    /// The explicit invocation layer: only flags the user passed are set.
    pub fn to_settings(&self) -> Settings {
        let flag = |on: bool| on.then_some(true);
        Settings {
            git: flag(self.git),
            git_remote: self.git_remote.clone(),
            template: self.template.clone(),
            editor: flag(self.open_editor || self.editor.is_some()),
            editor_name: self.editor.clone().filter(|n| !n.trim().is_empty()),
            readme: flag(self.readme),
            gitignore: self.gitignore,
            license: self.license,
            touch: (!self.touch.is_empty()).then(|| self.touch.clone()),
            mode: self.mode.clone(),
            parent_mode: self.parent_mode.clone(),
            symlink: self.symlink.clone(),
            temp: flag(self.temp),
            expire: self.expire.clone(),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct CreateArgs {
    /// Directory to create
    pub directory: Option<String>,

    /// Profile to apply (default: core.default_profile)
    #[arg(short = 'p', long)]
    pub profile: Option<String>,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(ctx: &Context, args: CreateArgs) -> anyhow::Result<()> {
    let Some(directory) = args.directory.as_deref() else {
        anyhow::bail!("a directory name is required (see `mkcd --help`)");
    };

    let config = ctx.load_config()?;
    let reporter = ctx.reporter(&config);

    let profile = match config.get_profile(args.profile.as_deref()) {
        Ok(p) => p.clone(),
        Err(e) if args.profile.is_some() => {
            return Err(e).context("failed to select profile");
        }
        Err(e) => {
            reporter.debug(&format!("{e}; using an empty profile"));
            Settings::default()
        }
    };
    let plan = merge_layers(&config.defaults_layer(), &profile, &args.settings.to_settings());
    tracing::debug!(?plan, "resolved plan");

    let vcs = GitCli::new(&config.git.user_name, &config.git.user_email);
    let editors = SystemEditors::new(config.core.editor_timeout_secs.map(Duration::from_secs));
    let with = Collaborators {
        vcs: &vcs,
        editors: &editors,
        documents: &BuiltinDocuments,
        reporter: &reporter,
    };
    let opts = OrchestratorOptions {
        dry_run: ctx.dry_run,
        force: ctx.force,
        interactive: ctx.interactive,
        backup: ctx.backup,
    };

    let report = Orchestrator::new(&config, opts, with)?
        .run(directory, &plan)
        .map_err(|e| match e {
            MkcdError::StepFailed { .. } => anyhow::Error::new(e),
            other => anyhow::Error::new(other).context(format!("cannot create '{directory}'")),
        })?;

    if ctx.json {
        return print_json(&report);
    }
    if report.cancelled {
        return Ok(());
    }

    let quoted = paths::shell_quote(&report.target);
    if report.dry_run {
        reporter.info(&format!("[dry-run] would change directory: cd {quoted}"));
        return Ok(());
    }

    if report.warnings.is_empty() {
        reporter.success(&format!("Workspace ready: {}", report.target.display()));
    } else {
        reporter.warning(&format!(
            "Workspace ready with {} warning(s): {}",
            report.warnings.len(),
            report.target.display()
        ));
    }
    // Consumed by the shell wrapper, so printed even when quiet.
    println!("cd {quoted}");
    Ok(())
}
