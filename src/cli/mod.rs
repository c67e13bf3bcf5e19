pub mod composer;
pub mod prompt;

pub use composer::{ComposerCommand, ComposerWorkflow, RunOutcome, TargetArgs};
pub use prompt::TerminalChooser;
