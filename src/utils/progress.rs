//! Progress indicators for pipeline steps

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::time::Duration;

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Helper to run a function with a spinner and show result
pub fn with_spinner_result<F, T, E>(message: &str, success_msg: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: std::fmt::Display,
{
    let pb = create_spinner(message);
    match f() {
        Ok(result) => {
            pb.finish_with_message(format!("✓ {}", success_msg));
            Ok(result)
        }
        Err(e) => {
            pb.finish_with_message(format!("✗ Failed: {}", e));
            Err(e)
        }
    }
}

/// How step progress is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Banner lines; tool output streams underneath
    Banner,
    /// One spinner per step while output is captured
    Spinner,
    /// Nothing (dry-run prints its own lines)
    Silent,
}

/// Step counter shown as `[n/total]`
pub struct StepProgress {
    mode: ProgressMode,
    total: usize,
}

impl StepProgress {
    pub fn new(mode: ProgressMode, total: usize) -> Self {
        Self { mode, total }
    }

    pub fn label(&self, index: usize, description: &str) -> String {
        format!("[{}/{}] {}", index + 1, self.total, description)
    }

    /// Run a step, reporting start and outcome
    pub fn run<F, T, E>(&self, index: usize, description: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::fmt::Display,
    {
        let label = self.label(index, description);
        match self.mode {
            ProgressMode::Silent => f(),
            ProgressMode::Spinner => with_spinner_result(&label, &label, f),
            ProgressMode::Banner => {
                eprintln!();
                eprintln!("{}", label.bright_blue().bold());
                let result = f();
                match &result {
                    Ok(_) => eprintln!("{} {}", "✓".bright_green(), description.dimmed()),
                    Err(_) => eprintln!("{} {}", "✗".bright_red().bold(), description.bright_red()),
                }
                result
            }
        }
    }
}
