use crate::config::Config;
use crate::documents::DocumentKind;
use crate::error::Result;
use crate::io;
use crate::settings::ResolvedPlan;
use serde::Serialize;

/// What happens to the run when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the run and exit non-zero.
    Abort,
    /// Record a warning and continue.
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    CreateDirectory {
        mode: Option<u32>,
        parent_mode: Option<u32>,
    },
    CreateSymlink {
        target: String,
    },
    ApplyTemplate {
        name: String,
    },
    TouchFile {
        name: String,
    },
    Generate(DocumentKind),
    InitRepository {
        branch: String,
    },
    AddRemote {
        name: String,
        url: String,
    },
    InitialCommit {
        message: String,
    },
    RecordExpiry {
        after: String,
    },
    LaunchEditor {
        name: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub kind: StepKind,
    pub policy: FailurePolicy,
}

impl Step {
    fn abort(kind: StepKind) -> Self {
        Self {
            kind,
            policy: FailurePolicy::Abort,
        }
    }

    fn warn(kind: StepKind) -> Self {
        Self {
            kind,
            policy: FailurePolicy::Warn,
        }
    }

    /// Short name used in logs and error chains.
    pub fn label(&self) -> String {
        match &self.kind {
            StepKind::CreateDirectory { .. } => "create directory".to_string(),
            StepKind::CreateSymlink { .. } => "create symlink".to_string(),
            StepKind::ApplyTemplate { name } => format!("template {name}"),
            StepKind::TouchFile { name } => format!("touch {name}"),
            StepKind::Generate(doc) => format!("generate {}", doc.file_name()),
            StepKind::InitRepository { .. } => "git init".to_string(),
            StepKind::AddRemote { name, .. } => format!("git remote add {name}"),
            StepKind::InitialCommit { .. } => "initial commit".to_string(),
            StepKind::RecordExpiry { .. } => "expiry marker".to_string(),
            StepKind::LaunchEditor { .. } => "launch editor".to_string(),
        }
    }

    /// What the step would do, phrased to follow "would".
    pub fn describe(&self) -> String {
        match &self.kind {
            StepKind::CreateDirectory { mode, parent_mode } => {
                let mut text = "create the directory".to_string();
                if let Some(m) = mode {
                    text.push_str(&format!(" with mode {m:o}"));
                }
                if let Some(m) = parent_mode {
                    text.push_str(&format!(" (new parents {m:o})"));
                }
                text
            }
            StepKind::CreateSymlink { target } => format!("create a symlink to {target}"),
            StepKind::ApplyTemplate { name } => format!("copy files from template '{name}'"),
            StepKind::TouchFile { name } => format!("create empty file {name}"),
            StepKind::Generate(doc) => format!("generate {}", doc.label()),
            StepKind::InitRepository { branch } => {
                format!("initialize a git repository on branch {branch}")
            }
            StepKind::AddRemote { name, url } => format!("add git remote {name} -> {url}"),
            StepKind::InitialCommit { message } => format!("commit all files as '{message}'"),
            StepKind::RecordExpiry { after } => format!("mark the workspace to expire in {after}"),
            StepKind::LaunchEditor { name: Some(n) } => format!("open the workspace in {n}"),
            StepKind::LaunchEditor { name: None } => {
                "open the workspace in the detected editor".to_string()
            }
        }
    }
}

/// Turn a resolved plan into the ordered step list for one run.
pub fn plan_steps(plan: &ResolvedPlan, config: &Config) -> Result<Vec<Step>> {
    let mut steps = Vec::new();

    match &plan.symlink {
        Some(target) => steps.push(Step::abort(StepKind::CreateSymlink {
            target: target.clone(),
        })),
        None => steps.push(Step::abort(StepKind::CreateDirectory {
            mode: plan.mode.as_deref().map(io::parse_mode).transpose()?,
            parent_mode: plan.parent_mode.as_deref().map(io::parse_mode).transpose()?,
        })),
    }

    if let Some(name) = &plan.template {
        steps.push(Step::warn(StepKind::ApplyTemplate { name: name.clone() }));
    }

    let documents: Vec<DocumentKind> = [
        plan.readme.then_some(DocumentKind::Readme),
        plan.gitignore.map(DocumentKind::Ignore),
        plan.license.map(DocumentKind::License),
    ]
    .into_iter()
    .flatten()
    .collect();

    // An empty placeholder would leave the generated document "satisfied".
    for name in &plan.touch {
        let bare = name.trim_start_matches("./");
        if documents.iter().any(|doc| doc.file_name() == bare) {
            tracing::debug!(file = %name, "touch skipped, document is generated");
            continue;
        }
        steps.push(Step::warn(StepKind::TouchFile { name: name.clone() }));
    }

    for doc in documents {
        steps.push(Step::abort(StepKind::Generate(doc)));
    }

    // A remote needs a repository to live in.
    if plan.git || plan.git_remote.is_some() {
        steps.push(Step::abort(StepKind::InitRepository {
            branch: config.git.default_branch.clone(),
        }));
        if let Some(url) = &plan.git_remote {
            steps.push(Step::abort(StepKind::AddRemote {
                name: config.git.default_remote_name.clone(),
                url: url.clone(),
            }));
        }
        steps.push(Step::warn(StepKind::InitialCommit {
            message: "Initial commit".to_string(),
        }));
    }

    if let Some(after) = &plan.expire {
        steps.push(Step::warn(StepKind::RecordExpiry {
            after: after.clone(),
        }));
    }

    if plan.editor {
        steps.push(Step::warn(StepKind::LaunchEditor {
            name: plan.editor_name.clone(),
        }));
    }

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{IgnoreFlavor, LicenseFlavor};

    fn labels(steps: &[Step]) -> Vec<String> {
        steps.iter().map(Step::label).collect()
    }

    #[test]
    fn full_plan_is_ordered() {
        let plan = ResolvedPlan {
            git: true,
            git_remote: Some("https://example.com/x.git".into()),
            template: Some("basic".into()),
            editor: true,
            readme: true,
            gitignore: Some(IgnoreFlavor::Go),
            license: Some(LicenseFlavor::Mit),
            touch: vec!["main.go".into()],
            expire: Some("1d".into()),
            ..ResolvedPlan::default()
        };
        let steps = plan_steps(&plan, &Config::default()).unwrap();
        assert_eq!(
            labels(&steps),
            vec![
                "create directory",
                "template basic",
                "touch main.go",
                "generate README.md",
                "generate .gitignore",
                "generate LICENSE",
                "git init",
                "git remote add origin",
                "initial commit",
                "expiry marker",
                "launch editor",
            ]
        );
    }

    #[test]
    fn failure_policies() {
        let plan = ResolvedPlan {
            git: true,
            readme: true,
            editor: true,
            touch: vec!["a".into()],
            ..ResolvedPlan::default()
        };
        let steps = plan_steps(&plan, &Config::default()).unwrap();
        let policy = |label: &str| steps.iter().find(|s| s.label() == label).unwrap().policy;
        assert_eq!(policy("create directory"), FailurePolicy::Abort);
        assert_eq!(policy("touch a"), FailurePolicy::Warn);
        assert_eq!(policy("generate README.md"), FailurePolicy::Abort);
        assert_eq!(policy("git init"), FailurePolicy::Abort);
        assert_eq!(policy("initial commit"), FailurePolicy::Warn);
        assert_eq!(policy("launch editor"), FailurePolicy::Warn);
    }

    #[test]
    fn touching_a_generated_document_is_dropped() {
        let plan = ResolvedPlan {
            readme: true,
            license: Some(LicenseFlavor::Mit),
            touch: vec!["README.md".into(), "./LICENSE".into(), ".gitignore".into()],
            ..ResolvedPlan::default()
        };
        let steps = plan_steps(&plan, &Config::default()).unwrap();
        assert_eq!(
            labels(&steps),
            vec![
                "create directory",
                "touch .gitignore",
                "generate README.md",
                "generate LICENSE",
            ]
        );
    }

    #[test]
    fn symlink_replaces_directory_step() {
        let plan = ResolvedPlan {
            symlink: Some("/srv/data".into()),
            ..ResolvedPlan::default()
        };
        let steps = plan_steps(&plan, &Config::default()).unwrap();
        assert_eq!(labels(&steps), vec!["create symlink"]);
    }

    #[test]
    fn remote_implies_repository() {
        let plan = ResolvedPlan {
            git_remote: Some("git@example.com:me/x.git".into()),
            ..ResolvedPlan::default()
        };
        let steps = plan_steps(&plan, &Config::default()).unwrap();
        assert_eq!(steps[1].label(), "git init");
    }

    #[test]
    fn modes_are_parsed_into_the_step() {
        let plan = ResolvedPlan {
            mode: Some("700".into()),
            ..ResolvedPlan::default()
        };
        let steps = plan_steps(&plan, &Config::default()).unwrap();
        assert_eq!(steps[0].describe(), "create the directory with mode 700");
    }
}
