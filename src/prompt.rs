use anyhow::{Context, Result};
use dialoguer::{Select, theme::ColorfulTheme};

/// Lets the user pick a profile when none was given on the command line.
pub trait ProfilePrompt {
    /// Returns `None` when the user backs out without choosing.
    fn select_profile(&self, names: &[String]) -> Result<Option<String>>;
}

/// Interactive menu on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl ProfilePrompt for TerminalPrompt {
    fn select_profile(&self, names: &[String]) -> Result<Option<String>> {
        let index = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Select AWS profile")
            .items(names)
            .default(0)
            .interact_opt()
            .context("Failed to read profile selection")?;

        Ok(index.and_then(|i| names.get(i).cloned()))
    }
}
