//! Logging utilities with colored output and progress display.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` macro, only printed with `--verbose`
//! - `ProgressLine` for a single-line per-pass file counter
//!
//! # Example
//!
//! ```ignore
//! log!("links"; "fixing links in {} files", count);
//!
//! let progress = ProgressLine::new("links", count);
//! progress.inc();
//! progress.finish();
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{IsTerminal, Write, stdout},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Whether a progress line currently occupies the last terminal line
static PROGRESS_ACTIVE: AtomicBool = AtomicBool::new(false);

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut stdout = stdout().lock();

    // A log line replaces an in-flight progress line, which redraws on its next tick
    if PROGRESS_ACTIVE.load(Ordering::SeqCst) {
        execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
    }

    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "serve" => prefix.bright_blue().bold().to_string(),
        "mirror" | "git" => prefix.bright_green().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Progress Line (single-line counter)
// ============================================================================

/// Single-line progress display for one pass
///
/// Displays: `[links] 42/371`
///
/// The counter updates in place. Uses `try_lock` to avoid blocking rayon
/// workers - if display is busy, the refresh is skipped. Nothing is drawn
/// when stdout is not a terminal.
pub struct ProgressLine {
    name: &'static str,
    total: usize,
    current: AtomicUsize,
    lock: Mutex<()>,
    enabled: bool,
}

impl ProgressLine {
    pub fn new(name: &'static str, total: usize) -> Self {
        let enabled = total > 0 && stdout().is_terminal();
        if enabled {
            PROGRESS_ACTIVE.store(true, Ordering::SeqCst);
        }

        let progress = Self {
            name,
            total,
            current: AtomicUsize::new(0),
            lock: Mutex::new(()),
            enabled,
        };
        progress.display();
        progress
    }

    /// Increment the counter.
    ///
    /// Non-blocking: if display lock is held, skips refresh.
    #[inline]
    pub fn inc(&self) {
        self.current.fetch_add(1, Ordering::Relaxed);
        if self.lock.try_lock().is_some() {
            self.display();
        }
    }

    fn display(&self) {
        if !self.enabled {
            return;
        }
        let current = self.current.load(Ordering::Relaxed);
        let prefix = colorize_prefix(self.name, self.name);

        let mut stdout = stdout().lock();
        execute!(
            stdout,
            cursor::MoveToColumn(0),
            Clear(ClearType::CurrentLine)
        )
        .ok();
        write!(stdout, "{} {}/{}", prefix, current, self.total).ok();
        stdout.flush().ok();
    }

    /// Finish progress display and clear the line.
    pub fn finish(self) {
        if !self.enabled {
            return;
        }
        let _guard = self.lock.lock();
        PROGRESS_ACTIVE.store(false, Ordering::SeqCst);

        let mut stdout = stdout().lock();
        execute!(
            stdout,
            cursor::MoveToColumn(0),
            Clear(ClearType::CurrentLine)
        )
        .ok();
        stdout.flush().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_toggle() {
        set_verbose(true);
        assert!(is_verbose());
        set_verbose(false);
        assert!(!is_verbose());
    }

    #[test]
    fn test_progress_counts() {
        let progress = ProgressLine::new("links", 3);
        progress.inc();
        progress.inc();
        assert_eq!(progress.current.load(Ordering::Relaxed), 2);
        progress.finish();
    }

    #[test]
    fn test_colorize_prefix_contains_module() {
        assert!(colorize_prefix("links", "links").contains("[links]"));
        assert!(colorize_prefix("ERROR", "error").contains("[ERROR]"));
    }
}
