/// Run log: every event is printed to the terminal and appended to the log file
///
/// File lines look like `[2026-10-17 14:22:33] [SUCCESS] message`.
///
/// The file is not created until the run has targets to work on (`commit`).
/// Until then lines are held in memory; if an error or warning ends the run
/// first, the file holds that line alone.

use chrono::Local;
use colored::Colorize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::error::{BackupError, BackupResult};
use crate::utils::constants::LOG_LINE_TIMESTAMP_FORMAT;
use crate::utils::helpers::create_private_file;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Success,
    Warning,
    Info,
    Section,
}

impl Level {
    pub fn label(&self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Success => "SUCCESS",
            Level::Warning => "WARNING",
            Level::Info => "INFO",
            Level::Section => "SECTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

pub struct RunLog {
    path: Option<PathBuf>,
    file: Option<File>,
    /// File lines waiting for `commit`; `None` once committed or console-only
    pending: Option<Vec<String>>,
    echo: bool,
    entries: Vec<LogEntry>,
}

impl RunLog {
    /// Terminal only. Used for dry runs and for errors raised before the
    /// log directory is known.
    pub fn console() -> Self {
        Self {
            path: None,
            file: None,
            pending: None,
            echo: true,
            entries: Vec::new(),
        }
    }

    /// Terminal plus an owner-only log file at `path`, created on `commit`
    pub fn deferred(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            file: None,
            pending: Some(Vec::new()),
            echo: true,
            entries: Vec::new(),
        }
    }

    /// Create the log file, and its directory if needed, and write the lines
    /// held so far. A no-op for console logs and once committed.
    pub fn commit(&mut self) -> BackupResult<()> {
        let Some(lines) = self.pending.take() else {
            return Ok(());
        };
        let Some(path) = self.path.clone() else {
            return Ok(());
        };

        let mut file = open_log_file(&path)?;
        for line in &lines {
            writeln!(file, "{}", line).map_err(|e| BackupError::io(&path, e))?;
        }
        self.file = Some(file);
        Ok(())
    }

    #[cfg(test)]
    pub fn without_echo(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Keep entries in memory without printing anything
    #[cfg(test)]
    pub fn silent() -> Self {
        Self {
            path: None,
            file: None,
            pending: None,
            echo: false,
            entries: Vec::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.emit(Level::Error, message.into());
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.emit(Level::Success, message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.emit(Level::Warning, message.into());
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.emit(Level::Info, message.into());
    }

    pub fn section(&mut self, message: impl Into<String>) {
        self.emit(Level::Section, message.into());
    }

    fn emit(&mut self, level: Level, message: String) {
        if self.echo {
            match level {
                Level::Error => eprintln!("{} {}", "✗".red().bold(), message.red()),
                Level::Success => println!("{} {}", "✓".green().bold(), message),
                Level::Warning => println!("{} {}", "⚠".yellow().bold(), message.yellow()),
                Level::Info => println!("  {}", message),
                Level::Section => println!("\n{}", format!("== {} ==", message).cyan().bold()),
            }
        }

        let line = format!(
            "[{}] [{}] {}",
            Local::now().format(LOG_LINE_TIMESTAMP_FORMAT),
            level.label(),
            message
        );

        if matches!(level, Level::Error | Level::Warning) && self.pending.is_some() {
            // Ends the run before commit: drop the preflight detail
            self.pending = None;
            if let Some(path) = self.path.clone() {
                match open_log_file(&path) {
                    Ok(file) => self.file = Some(file),
                    Err(e) => eprintln!("{} {}", "⚠".yellow(), e),
                }
            }
        }

        if let Some(pending) = self.pending.as_mut() {
            pending.push(line);
        } else if let Some(file) = self.file.as_mut() {
            if let Err(e) = writeln!(file, "{}", line) {
                // Keep going on the terminal; losing the file must not abort a backup
                eprintln!("{} log file write failed, continuing without it: {}", "⚠".yellow(), e);
                self.file = None;
            }
        }

        self.entries.push(LogEntry { level, message });
    }
}

fn open_log_file(path: &Path) -> BackupResult<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BackupError::io(parent, e))?;
    }
    create_private_file(path, true).map_err(|e| BackupError::io(path, e))
}
