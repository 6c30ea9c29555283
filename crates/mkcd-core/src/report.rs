//! User-facing output: leveled messages, lists, tables and prompts.
//!
//! Everything a reporter prints goes to stderr. Stdout is reserved for the
//! `cd` hand-off line and machine-readable output.

use crate::error::{MkcdError, Result};
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use std::cell::RefCell;
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
    Debug,
}

pub trait Reporter {
    fn emit(&self, level: Level, message: &str);

    fn success(&self, message: &str) {
        self.emit(Level::Success, message);
    }

    fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    fn warning(&self, message: &str) {
        self.emit(Level::Warning, message);
    }

    fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }

    fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }

    fn list(&self, title: &str, items: &[String]);

    fn table(&self, headers: &[&str], rows: &[Vec<String>]);

    /// Yes/no question. Returns `default` when prompting is not possible.
    fn confirm(&self, question: &str, default: bool) -> Result<bool>;

    /// Pick one of `options`, returning its index. Falls back to the first.
    fn select(&self, question: &str, options: &[String]) -> Result<usize>;

    /// Free-text answer. Falls back to `default`.
    fn input(&self, question: &str, default: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Table rendering
// ---------------------------------------------------------------------------

/// Render rows as left-aligned columns separated by two spaces, with a dashed
/// rule under the header.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<String>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{cell:w$}")
            })
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(line(headers.iter().map(|h| h.to_string()).collect()));
    out.push(line(widths.iter().map(|&w| "-".repeat(w)).collect()));
    for row in rows {
        out.push(line(row.clone()));
    }
    out.join("\n")
}

// ---------------------------------------------------------------------------
// ConsoleReporter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ConsoleOptions {
    /// Only warnings and errors are shown; prompts return their defaults.
    pub quiet: bool,
    pub debug: bool,
    pub colors: bool,
    pub icons: bool,
    /// Never prompt, even on a terminal.
    pub non_interactive: bool,
}

pub struct ConsoleReporter {
    opts: ConsoleOptions,
}

impl ConsoleReporter {
    pub fn new(opts: ConsoleOptions) -> Self {
        if !opts.colors {
            colored::control::set_override(false);
        }
        Self { opts }
    }

    fn can_prompt(&self) -> bool {
        !self.opts.quiet
            && !self.opts.non_interactive
            && std::io::stdin().is_terminal()
            && std::io::stderr().is_terminal()
    }

    fn visible(&self, level: Level) -> bool {
        match level {
            Level::Warning | Level::Error => true,
            Level::Debug => self.opts.debug,
            Level::Success | Level::Info => !self.opts.quiet,
        }
    }

    fn prefix(&self, level: Level) -> String {
        let (icon, word) = match level {
            Level::Success => ("✓", "success"),
            Level::Info => ("ℹ", "info"),
            Level::Warning => ("⚠", "warning"),
            Level::Error => ("✗", "error"),
            Level::Debug => ("•", "debug"),
        };
        let raw = if self.opts.icons {
            icon.to_string()
        } else {
            format!("{word}:")
        };
        match level {
            Level::Success => raw.green().bold().to_string(),
            Level::Info => raw.blue().to_string(),
            Level::Warning => raw.yellow().bold().to_string(),
            Level::Error => raw.red().bold().to_string(),
            Level::Debug => raw.dimmed().to_string(),
        }
    }
}

fn prompt_failed(e: dialoguer::Error) -> MkcdError {
    MkcdError::Io(std::io::Error::other(e.to_string()))
}

impl Reporter for ConsoleReporter {
    fn emit(&self, level: Level, message: &str) {
        if self.visible(level) {
            eprintln!("{} {}", self.prefix(level), message);
        }
    }

    fn list(&self, title: &str, items: &[String]) {
        if self.opts.quiet {
            return;
        }
        eprintln!("{}", title.bold());
        for item in items {
            eprintln!("  • {item}");
        }
    }

    fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        if !self.opts.quiet {
            eprintln!("{}", render_table(headers, rows));
        }
    }

    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        if !self.can_prompt() {
            return Ok(default);
        }
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(question)
            .default(default)
            .interact()
            .map_err(prompt_failed)
    }

    fn select(&self, question: &str, options: &[String]) -> Result<usize> {
        if options.is_empty() {
            return Err(MkcdError::Validation(format!(
                "nothing to choose from for '{question}'"
            )));
        }
        if !self.can_prompt() {
            return Ok(0);
        }
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt(question)
            .items(options)
            .default(0)
            .interact()
            .map_err(prompt_failed)
    }

    fn input(&self, question: &str, default: &str) -> Result<String> {
        if !self.can_prompt() {
            return Ok(default.to_string());
        }
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(question)
            .default(default.to_string())
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_failed)
    }
}

// ---------------------------------------------------------------------------
// MemoryReporter
// ---------------------------------------------------------------------------

/// Records everything instead of printing. Prompts answer from a fixed script
/// or fall back to their defaults.
#[derive(Default)]
pub struct MemoryReporter {
    messages: RefCell<Vec<(Level, String)>>,
    confirm_answer: Option<bool>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every `confirm` with `answer` instead of the default.
    pub fn answering(answer: bool) -> Self {
        Self {
            confirm_answer: Some(answer),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.borrow().clone()
    }

    pub fn at(&self, level: Level) -> Vec<String> {
        self.messages
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.at(level).iter().any(|m| m.contains(needle))
    }
}

impl Reporter for MemoryReporter {
    fn emit(&self, level: Level, message: &str) {
        self.messages.borrow_mut().push((level, message.to_string()));
    }

    fn list(&self, title: &str, items: &[String]) {
        self.emit(Level::Info, title);
        for item in items {
            self.emit(Level::Info, item);
        }
    }

    fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        self.emit(Level::Info, &render_table(headers, rows));
    }

    fn confirm(&self, _question: &str, default: bool) -> Result<bool> {
        Ok(self.confirm_answer.unwrap_or(default))
    }

    fn select(&self, question: &str, options: &[String]) -> Result<usize> {
        if options.is_empty() {
            return Err(MkcdError::Validation(format!(
                "nothing to choose from for '{question}'"
            )));
        }
        Ok(0)
    }

    fn input(&self, _question: &str, default: &str) -> Result<String> {
        Ok(default.to_string())
    }
}
