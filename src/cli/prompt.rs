use crate::domain::ServiceChooser;
use crate::error::{MicroError, Result};
use dialoguer::{Select, theme::ColorfulTheme};

/// Terminal chooser backed by dialoguer
#[derive(Default)]
pub struct TerminalChooser {
    theme: ColorfulTheme,
}

impl TerminalChooser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for TerminalChooser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalChooser").finish_non_exhaustive()
    }
}

impl ServiceChooser for TerminalChooser {
    fn choose(&self, prompt: &str, options: &[String]) -> Result<String> {
        let selection = Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(options)
            .default(0)
            .interact()
            .map_err(|e| MicroError::Prompt(e.to_string()))?;

        options
            .get(selection)
            .cloned()
            .ok_or_else(|| MicroError::InvalidSelection(selection.to_string()))
    }
}
