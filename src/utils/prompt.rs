//! User prompt utilities for interactive confirmation

use anyhow::Result;
use dialoguer::Confirm;
use std::io::IsTerminal;

/// Ask user for yes/no confirmation
pub fn confirm(prompt: &str) -> Result<bool> {
    let result = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?;

    Ok(result)
}

/// Whether a prompt can be shown at all
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}
