//! Editor detection and launch.

use crate::error::{MkcdError, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorInfo {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Higher wins during auto-detection.
    pub priority: u32,
    /// GUI editors are spawned and not awaited.
    pub gui: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    Spawned { pid: u32 },
    Exited,
    TimedOut { after: Duration },
}

pub trait EditorLauncher {
    /// Best available editor: `EDITOR`, then `VISUAL`, then the catalog.
    fn detect(&self) -> Result<EditorInfo>;

    /// Resolve an editor by display name or command.
    fn find(&self, name: &str) -> Result<EditorInfo>;

    fn launch(&self, editor: &EditorInfo, path: &Path) -> Result<LaunchOutcome>;
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// (display name, command, priority, gui)
const CATALOG: &[(&str, &str, u32, bool)] = &[
    ("Visual Studio Code", "code", 100, true),
    ("VSCode Insiders", "code-insiders", 95, true),
    ("Cursor", "cursor", 90, true),
    ("Sublime Text", "subl", 85, true),
    ("Zed", "zed", 80, true),
    ("IntelliJ IDEA", "idea", 75, true),
    ("GoLand", "goland", 75, true),
    ("PyCharm", "pycharm", 75, true),
    ("WebStorm", "webstorm", 75, true),
    ("Neovim", "nvim", 60, false),
    ("Vim", "vim", 55, false),
    ("Emacs", "emacs", 50, false),
    ("Nano", "nano", 30, false),
];

fn catalog() -> impl Iterator<Item = EditorInfo> {
    CATALOG.iter().map(|&(name, command, priority, gui)| EditorInfo {
        name: name.to_string(),
        command: command.to_string(),
        args: Vec::new(),
        priority,
        gui,
    })
}

fn is_gui_command(command: &str) -> bool {
    let base = Path::new(command)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    CATALOG.iter().any(|&(_, c, _, gui)| gui && c == base)
}

/// Build an entry from an `EDITOR`-style value such as `code --wait`.
fn from_command_line(name: &str, line: &str, priority: u32) -> Option<EditorInfo> {
    let mut parts = line.split_whitespace();
    let command = parts.next()?.to_string();
    Some(EditorInfo {
        name: name.to_string(),
        gui: is_gui_command(&command),
        args: parts.map(str::to_string).collect(),
        command,
        priority,
    })
}

fn installed(command: &str) -> bool {
    which::which(command).is_ok()
}

// ---------------------------------------------------------------------------
// SystemEditors
// ---------------------------------------------------------------------------

pub struct SystemEditors {
    editor_env: Option<String>,
    visual_env: Option<String>,
    timeout: Option<Duration>,
}

impl SystemEditors {
    /// Reads `EDITOR` and `VISUAL` from the environment. `timeout` bounds how
    /// long a foreground editor may run.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self::with_env(
            std::env::var("EDITOR").ok(),
            std::env::var("VISUAL").ok(),
            timeout,
        )
    }

    pub fn with_env(
        editor_env: Option<String>,
        visual_env: Option<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            editor_env: editor_env.filter(|v| !v.trim().is_empty()),
            visual_env: visual_env.filter(|v| !v.trim().is_empty()),
            timeout,
        }
    }

    /// Every usable editor, best first.
    pub fn available(&self) -> Vec<EditorInfo> {
        let mut found: Vec<EditorInfo> = [
            ("Environment Editor", &self.editor_env, 1000),
            ("Visual Editor", &self.visual_env, 999),
        ]
        .into_iter()
        .filter_map(|(name, value, priority)| {
            value
                .as_deref()
                .and_then(|line| from_command_line(name, line, priority))
        })
        .chain(catalog())
        .filter(|e| installed(&e.command))
        .collect();
        // Stable sort keeps catalog order among equal priorities.
        found.sort_by(|a, b| b.priority.cmp(&a.priority));
        found
    }

    fn wait(&self, mut child: std::process::Child, editor: &EditorInfo) -> Result<LaunchOutcome> {
        let status = match self.timeout {
            None => child.wait(),
            Some(after) => {
                let pid = child.id();
                let (tx, rx) = std::sync::mpsc::channel();
                std::thread::spawn(move || {
                    let _ = tx.send(child.wait());
                });
                match rx.recv_timeout(after) {
                    Ok(status) => status,
                    Err(_) => {
                        kill_process(pid);
                        tracing::warn!(editor = %editor.command, secs = after.as_secs(), "editor timed out");
                        return Ok(LaunchOutcome::TimedOut { after });
                    }
                }
            }
        }
        .map_err(|e| MkcdError::Editor(format!("failed waiting for {}: {e}", editor.name)))?;

        if status.success() {
            Ok(LaunchOutcome::Exited)
        } else {
            Err(MkcdError::Editor(format!(
                "{} exited with {status}",
                editor.name
            )))
        }
    }
}

impl EditorLauncher for SystemEditors {
    fn detect(&self) -> Result<EditorInfo> {
        self.available()
            .into_iter()
            .next()
            .ok_or_else(|| MkcdError::not_found("editor", "(auto-detect)"))
    }

    fn find(&self, name: &str) -> Result<EditorInfo> {
        let wanted = name.trim();
        if let Some(entry) = catalog().find(|e| {
            e.name.eq_ignore_ascii_case(wanted) || e.command.eq_ignore_ascii_case(wanted)
        }) {
            return if installed(&entry.command) {
                Ok(entry)
            } else {
                Err(MkcdError::Editor(format!(
                    "{} is not installed ('{}' not on PATH)",
                    entry.name, entry.command
                )))
            };
        }
        match from_command_line(wanted, wanted, 0) {
            Some(custom) if installed(&custom.command) => Ok(custom),
            _ => Err(MkcdError::not_found("editor", wanted)),
        }
    }

    fn launch(&self, editor: &EditorInfo, path: &Path) -> Result<LaunchOutcome> {
        let mut cmd = Command::new(&editor.command);
        cmd.args(&editor.args).arg(path);
        tracing::debug!(editor = %editor.command, path = %path.display(), gui = editor.gui, "launching editor");

        if editor.gui {
            let child = cmd
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| MkcdError::Editor(format!("failed to start {}: {e}", editor.name)))?;
            return Ok(LaunchOutcome::Spawned { pid: child.id() });
        }

        let child = cmd
            .spawn()
            .map_err(|e| MkcdError::Editor(format!("failed to start {}: {e}", editor.name)))?;
        self.wait(child, editor)
    }
}

/// SIGKILL by PID. Best-effort.
fn kill_process(pid: u32) {
    #[cfg(unix)]
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    #[cfg(windows)]
    let _ = Command::new("taskkill")
        .args(["/F", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editors(editor: Option<&str>) -> SystemEditors {
        SystemEditors::with_env(editor.map(str::to_string), None, None)
    }

    #[test]
    fn environment_editor_wins() {
        let found = editors(Some("sh -c true")).detect().unwrap();
        assert_eq!(found.command, "sh");
        assert_eq!(found.args, vec!["-c", "true"]);
        assert_eq!(found.priority, 1000);
        assert!(!found.gui);
    }

    #[test]
    fn blank_environment_is_ignored() {
        let e = SystemEditors::with_env(Some("  ".into()), Some(String::new()), None);
        assert!(e.editor_env.is_none());
        assert!(e.visual_env.is_none());
    }

    #[test]
    fn gui_flag_follows_catalog() {
        assert!(is_gui_command("code"));
        assert!(is_gui_command("/usr/local/bin/subl"));
        assert!(!is_gui_command("vim"));
        assert!(!is_gui_command("my-editor"));
    }

    #[test]
    fn unknown_editor_is_not_found() {
        let err = editors(None).find("no-such-editor-xyz").unwrap_err();
        assert!(matches!(err, MkcdError::NotFound { kind: "editor", .. }));
    }

    #[test]
    fn any_command_on_path_can_be_named() {
        let found = editors(None).find("sh").unwrap();
        assert_eq!(found.command, "sh");
        assert_eq!(found.priority, 0);
    }

    #[cfg(unix)]
    #[test]
    fn foreground_editor_is_awaited() {
        let e = editors(None);
        let info = e.find("true").unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(e.launch(&info, dir.path()).unwrap(), LaunchOutcome::Exited);

        let failing = e.find("false").unwrap();
        assert!(matches!(
            e.launch(&failing, dir.path()),
            Err(MkcdError::Editor(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn foreground_timeout_kills_editor() {
        let e = SystemEditors::with_env(None, None, Some(Duration::from_millis(200)));
        let sleeper = EditorInfo {
            name: "sleep".into(),
            command: "sleep".into(),
            args: Vec::new(),
            priority: 0,
            gui: false,
        };
        let outcome = e.launch(&sleeper, Path::new("30")).unwrap();
        assert!(matches!(outcome, LaunchOutcome::TimedOut { .. }));
    }
}
