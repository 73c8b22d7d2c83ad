//! Dry-run mode output

use colored::Colorize;

/// Log a single action that would be performed
pub fn log_action(action: &str) {
    println!("  {} {}", "[DRY RUN]".cyan().bold(), action);
}

/// Closing line after all actions were listed
pub fn log_summary(actions: usize) {
    println!();
    println!(
        "{}",
        format!("{} action(s), no changes were made (--dry-run mode)", actions).yellow()
    );
}
