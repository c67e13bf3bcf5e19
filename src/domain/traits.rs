use super::{Invocation, ProcessExit, TimeoutPolicy};
use crate::error::Result;
use std::fmt::Debug;
use std::io::Write;

/// Trait for running one external process to completion
pub trait ProcessRunner: Send + Sync + Debug {
    /// Run `invocation`, streaming its combined output into `sink` as it arrives.
    ///
    /// Returns `Err` only when the process could not be started or the sink
    /// failed; exit status and timeouts are reported through [`ProcessExit`].
    fn run(
        &self,
        invocation: &Invocation,
        timeouts: &TimeoutPolicy,
        sink: &mut dyn Write,
    ) -> Result<ProcessExit>;
}

/// Trait for asking the operator to pick one option
pub trait ServiceChooser: Debug {
    /// Present `options` (never empty) and return the chosen one
    fn choose(&self, prompt: &str, options: &[String]) -> Result<String>;
}
