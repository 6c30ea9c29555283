//! The create pipeline: resolve and vet the target, then run an ordered list
//! of steps, each guarded by a precondition and tagged with a failure policy.

mod step;

pub use step::{plan_steps, FailurePolicy, Step, StepKind};

use crate::config::Config;
use crate::documents::{DocumentContext, DocumentGenerator, DocumentKind};
use crate::editor::{EditorLauncher, LaunchOutcome};
use crate::error::{MkcdError, Result};
use crate::io;
use crate::paths;
use crate::report::Reporter;
use crate::safety::{PathValidator, SafetyViolation};
use crate::settings::{self, ResolvedPlan};
use crate::vcs::{CommitOutcome, Presence, VersionControl};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    /// Evaluate preconditions and describe effects without performing them.
    pub dry_run: bool,
    /// Downgrade safety rejections to warnings and overwrite existing files.
    pub force: bool,
    /// Show the plan and ask before mutating anything.
    pub interactive: bool,
    /// Back up files before they are overwritten.
    pub backup: bool,
}

/// The backends a run talks to.
pub struct Collaborators<'a> {
    pub vcs: &'a dyn VersionControl,
    pub editors: &'a dyn EditorLauncher,
    pub documents: &'a dyn DocumentGenerator,
    pub reporter: &'a dyn Reporter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum StepOutcome {
    /// The effect ran.
    Done(String),
    /// Dry-run: the effect would have run.
    Planned(String),
    /// Nothing to do; the desired state already holds.
    Satisfied(String),
    /// Soft failure, recorded as a warning.
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: String,
    pub policy: FailurePolicy,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub target: PathBuf,
    pub dry_run: bool,
    pub cancelled: bool,
    pub steps: Vec<StepRecord>,
    pub warnings: Vec<String>,
}

enum Precondition {
    Pending,
    Satisfied(String),
}

pub struct Orchestrator<'a> {
    config: &'a Config,
    opts: OrchestratorOptions,
    with: Collaborators<'a>,
    base: PathBuf,
}

impl<'a> Orchestrator<'a> {
    /// Relative targets resolve against the current directory.
    pub fn new(config: &'a Config, opts: OrchestratorOptions, with: Collaborators<'a>) -> Result<Self> {
        let base = std::env::current_dir()?;
        Ok(Self::with_base(config, opts, with, base))
    }

    pub fn with_base(
        config: &'a Config,
        opts: OrchestratorOptions,
        with: Collaborators<'a>,
        base: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            opts,
            with,
            base: base.into(),
        }
    }

    fn backups_enabled(&self) -> bool {
        self.opts.backup || self.config.core.backup_enabled
    }

    // -----------------------------------------------------------------------
    // Target resolution and validation
    // -----------------------------------------------------------------------

    /// Resolve `raw` to the absolute target path and vet it against the
    /// safety policy. With `force`, a rejected path that still resolves is
    /// accepted with a warning.
    pub fn resolve_target(&self, raw: &str, plan: &ResolvedPlan, warnings: &mut Vec<String>) -> Result<PathBuf> {
        let base = if plan.temp {
            self.config.temp_base()
        } else {
            self.base.clone()
        };
        let validator = PathValidator::with_base(self.config.safety_policy(), &base);
        match validator.validate(raw) {
            Ok(path) => Ok(path),
            Err(MkcdError::Safety { violation, .. }) if self.opts.force && downgradable(&violation) => {
                let message = format!("safety check overridden for '{raw}': {violation}");
                self.with.reporter.warning(&message);
                tracing::warn!(path = raw, rule = violation.kind(), "safety check overridden");
                warnings.push(message);
                paths::absolutize(raw, &base)
            }
            Err(e) => Err(e),
        }
    }

    // -----------------------------------------------------------------------
    // Run
    // -----------------------------------------------------------------------

    pub fn run(&self, raw: &str, plan: &ResolvedPlan) -> Result<RunReport> {
        plan.check()?;
        let mut report = RunReport {
            target: PathBuf::new(),
            dry_run: self.opts.dry_run,
            cancelled: false,
            steps: Vec::new(),
            warnings: Vec::new(),
        };
        report.target = self.resolve_target(raw, plan, &mut report.warnings)?;
        let target = report.target.clone();
        let steps = plan_steps(plan, self.config)?;
        tracing::info!(target = %target.display(), steps = steps.len(), dry_run = self.opts.dry_run, "starting run");

        if self.opts.interactive && !self.opts.dry_run {
            let items: Vec<String> = steps.iter().map(Step::describe).collect();
            self.with
                .reporter
                .list(&format!("About to set up {}:", target.display()), &items);
            if !self.with.reporter.confirm("Proceed?", true)? {
                self.with.reporter.info("Cancelled; nothing was changed");
                report.cancelled = true;
                return Ok(report);
            }
        }

        for step in &steps {
            let outcome = self.drive(step, &target)?;
            if let StepOutcome::Failed(msg) = &outcome {
                report.warnings.push(msg.clone());
            }
            report.steps.push(StepRecord {
                step: step.label(),
                policy: step.policy,
                outcome,
            });
        }

        tracing::info!(target = %target.display(), warnings = report.warnings.len(), "run finished");
        Ok(report)
    }

    /// Run one step through precondition, effect and failure policy.
    fn drive(&self, step: &Step, target: &Path) -> Result<StepOutcome> {
        let reporter = self.with.reporter;
        tracing::debug!(step = %step.label(), "evaluating step");

        let attempt = self.precondition(step, target).and_then(|pre| match pre {
            Precondition::Satisfied(why) => Ok(StepOutcome::Satisfied(why)),
            Precondition::Pending if self.opts.dry_run => {
                Ok(StepOutcome::Planned(format!("would {}", step.describe())))
            }
            Precondition::Pending => self.execute(step, target).map(StepOutcome::Done),
        });

        match attempt {
            Ok(outcome) => {
                match &outcome {
                    StepOutcome::Done(msg) => reporter.success(msg),
                    StepOutcome::Planned(msg) => reporter.info(&format!("[dry-run] {msg}")),
                    StepOutcome::Satisfied(msg) => reporter.info(msg),
                    StepOutcome::Failed(_) => {}
                }
                Ok(outcome)
            }
            Err(e) => match step.policy {
                FailurePolicy::Abort => {
                    tracing::debug!(step = %step.label(), error = %e, "step aborted run");
                    Err(MkcdError::StepFailed {
                        step: step.label(),
                        source: Box::new(e),
                    })
                }
                FailurePolicy::Warn => {
                    let msg = format!("{} failed: {e}", step.label());
                    reporter.warning(&msg);
                    Ok(StepOutcome::Failed(msg))
                }
            },
        }
    }

    // -----------------------------------------------------------------------
    // Preconditions
    // -----------------------------------------------------------------------

    fn precondition(&self, step: &Step, target: &Path) -> Result<Precondition> {
        use Precondition::*;

        match &step.kind {
            StepKind::CreateDirectory { .. } => {
                if target.is_dir() && !is_symlink(target) {
                    Ok(Satisfied(format!("Directory already exists: {}", target.display())))
                } else if target.exists() || is_symlink(target) {
                    Err(MkcdError::Conflict(format!(
                        "path exists but is not a directory: {}",
                        target.display()
                    )))
                } else {
                    Ok(Pending)
                }
            }
            StepKind::CreateSymlink { target: link_to } => {
                let link_to = self.link_destination(link_to)?;
                if !link_to.exists() {
                    return Err(MkcdError::not_found(
                        "symlink target",
                        link_to.display().to_string(),
                    ));
                }
                if let Ok(current) = std::fs::read_link(target) {
                    if current == link_to {
                        return Ok(Satisfied(format!(
                            "Symlink already points at {}",
                            link_to.display()
                        )));
                    }
                }
                let occupied = std::fs::symlink_metadata(target).ok();
                match occupied {
                    None => Ok(Pending),
                    Some(meta) if meta.is_dir() => Err(MkcdError::Conflict(format!(
                        "a directory already exists at {}",
                        target.display()
                    ))),
                    Some(_) if self.opts.force => Ok(Pending),
                    Some(_) => Err(MkcdError::Conflict(format!(
                        "{} already exists (use --force to replace it)",
                        target.display()
                    ))),
                }
            }
            StepKind::ApplyTemplate { name } => {
                let dir = self.config.templates_dir().join(name);
                if dir.is_dir() {
                    Ok(Pending)
                } else {
                    Err(MkcdError::not_found("template", name.clone()))
                }
            }
            StepKind::TouchFile { name } => {
                let path = contained(target, name)?;
                if path.exists() {
                    Ok(Satisfied(format!("{name} already exists")))
                } else {
                    Ok(Pending)
                }
            }
            StepKind::Generate(doc) => {
                let path = target.join(doc.file_name());
                if path.exists() && !self.opts.force {
                    Ok(Satisfied(format!(
                        "{} already exists (use --force to regenerate)",
                        doc.file_name()
                    )))
                } else {
                    Ok(Pending)
                }
            }
            StepKind::InitRepository { .. } => {
                if self.with.vcs.is_repository(target) {
                    Ok(Satisfied("Git repository already initialized".to_string()))
                } else {
                    Ok(Pending)
                }
            }
            StepKind::AddRemote { name, url } => {
                if !self.with.vcs.is_repository(target) {
                    return Ok(Pending);
                }
                match self.with.vcs.remote_url(target, name)? {
                    None => Ok(Pending),
                    Some(existing) if existing == *url => {
                        Ok(Satisfied(format!("Remote {name} already set to {url}")))
                    }
                    Some(existing) => Err(MkcdError::Conflict(format!(
                        "remote '{name}' already points at {existing}"
                    ))),
                }
            }
            StepKind::InitialCommit { .. } => Ok(Pending),
            StepKind::RecordExpiry { after } => {
                settings::parse_expiry(after)?;
                Ok(Pending)
            }
            StepKind::LaunchEditor { name } => {
                self.resolve_editor(name.as_deref())?;
                Ok(Pending)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Effects
    // -----------------------------------------------------------------------

    fn execute(&self, step: &Step, target: &Path) -> Result<String> {
        tracing::debug!(step = %step.label(), target = %target.display(), "executing step");

        match &step.kind {
            StepKind::CreateDirectory { mode, parent_mode } => {
                let created = io::ensure_dir(target)?;
                if let Some(m) = parent_mode {
                    for dir in created.iter().filter(|d| d.as_path() != target) {
                        self.apply_mode(dir, *m)?;
                    }
                }
                if let Some(m) = mode {
                    self.apply_mode(target, *m)?;
                }
                Ok(format!("Created directory {}", target.display()))
            }
            StepKind::CreateSymlink { target: link_to } => {
                let link_to = self.link_destination(link_to)?;
                if let Some(parent) = target.parent() {
                    io::ensure_dir(parent)?;
                }
                if let Ok(meta) = std::fs::symlink_metadata(target) {
                    if meta.is_file() && self.backups_enabled() {
                        io::backup_file(target)?;
                    }
                    std::fs::remove_file(target).map_err(|e| MkcdError::fs("remove", target, e))?;
                }
                io::symlink(&link_to, target)?;
                Ok(format!(
                    "Created symlink {} -> {}",
                    target.display(),
                    link_to.display()
                ))
            }
            StepKind::ApplyTemplate { name } => {
                let dir = self.config.templates_dir().join(name);
                let copied = io::copy_tree(&dir, target)?;
                Ok(format!("Applied template '{name}' ({copied} files)"))
            }
            StepKind::TouchFile { name } => {
                let path = contained(target, name)?;
                if let Some(parent) = path.parent() {
                    io::ensure_dir(parent)?;
                }
                io::touch(&path)?;
                Ok(format!("Created {name}"))
            }
            StepKind::Generate(doc) => self.generate(*doc, target),
            StepKind::InitRepository { branch } => {
                match self.with.vcs.init(target, branch)? {
                    Presence::Created => Ok(format!("Initialized git repository on branch {branch}")),
                    Presence::AlreadyPresent => Ok("Git repository already initialized".to_string()),
                }
            }
            StepKind::AddRemote { name, url } => {
                match self.with.vcs.add_remote(target, name, url)? {
                    Presence::Created => Ok(format!("Added remote {name}: {url}")),
                    Presence::AlreadyPresent => Ok(format!("Remote {name} already set to {url}")),
                }
            }
            StepKind::InitialCommit { message } => {
                match self.with.vcs.commit_all(target, message)? {
                    CommitOutcome::Committed(hash) => Ok(format!("Created initial commit {hash}")),
                    CommitOutcome::NothingToCommit => Ok("Nothing to commit".to_string()),
                }
            }
            StepKind::RecordExpiry { after } => {
                let expires = chrono::Local::now() + settings::parse_expiry(after)?;
                let marker = target.join(paths::EXPIRY_MARKER);
                io::atomic_write(&marker, format!("{}\n", expires.to_rfc3339()).as_bytes())?;
                Ok(format!("Workspace expires at {}", expires.format("%Y-%m-%d %H:%M")))
            }
            StepKind::LaunchEditor { name } => {
                let editor = self.resolve_editor(name.as_deref())?;
                match self.with.editors.launch(&editor, target)? {
                    LaunchOutcome::Spawned { .. } | LaunchOutcome::Exited => {
                        Ok(format!("Opened {} in {}", target.display(), editor.name))
                    }
                    LaunchOutcome::TimedOut { after } => Err(MkcdError::Editor(format!(
                        "{} did not exit within {}s",
                        editor.name,
                        after.as_secs()
                    ))),
                }
            }
        }
    }

    fn generate(&self, doc: DocumentKind, target: &Path) -> Result<String> {
        let path = target.join(doc.file_name());
        let ctx = DocumentContext::for_target(
            target,
            &self.config.git.user_name,
            &self.config.git.user_email,
        );
        let content = self.with.documents.render(doc, &ctx)?;
        let existed = path.exists();
        if existed && self.backups_enabled() {
            let backup = io::backup_file(&path)?;
            self.with
                .reporter
                .debug(&format!("Backed up {} to {}", doc.file_name(), backup.display()));
        }
        io::atomic_write(&path, content.as_bytes())?;
        let verb = if existed { "Regenerated" } else { "Generated" };
        Ok(format!("{verb} {}", doc.label()))
    }

    fn resolve_editor(&self, name: Option<&str>) -> Result<crate::editor::EditorInfo> {
        match name {
            Some(n) => self.with.editors.find(n),
            None => self.with.editors.detect(),
        }
    }

    fn apply_mode(&self, path: &Path, mode: u32) -> Result<()> {
        if !io::set_mode(path, mode)? {
            self.with.reporter.warning(&format!(
                "permissions {mode:o} not applied to {}: unsupported on this platform",
                path.display()
            ));
        }
        Ok(())
    }

    fn link_destination(&self, raw: &str) -> Result<PathBuf> {
        paths::absolutize(raw, &self.base)
    }
}

/// Only rules about where the path points can be overridden; a path that
/// cannot be resolved at all stays fatal.
fn downgradable(violation: &SafetyViolation) -> bool {
    !matches!(
        violation,
        SafetyViolation::Empty | SafetyViolation::HomeUnresolved
    )
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// Join a relative file name onto `target`, refusing anything that would
/// land outside it.
fn contained(target: &Path, name: &str) -> Result<PathBuf> {
    let rel = Path::new(name);
    let escapes = name.trim().is_empty()
        || rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(MkcdError::InvalidPlan(format!(
            "file name '{name}' must be relative to the workspace"
        )));
    }
    Ok(target.join(rel))
}
