use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use thiserror::Error;

use crate::domain::TimeoutKind;

pub type Result<T> = std::result::Result<T, MicroError>;

/// Exit code used for fatal setup errors (descriptor, runtime, selection, settings).
pub const EXIT_SETUP_FAILURE: u8 = 2;

#[derive(Debug, Error)]
pub enum MicroError {
    #[error("Invalid descriptor {path:?}: {message}")]
    Descriptor { path: PathBuf, message: String },

    #[error(
        "Could not detect {binary} executable. Please provide it with --docker-executable option."
    )]
    RuntimeNotFound { binary: String },

    #[error("Invalid service name provided: '{0}'")]
    InvalidSelection(String),

    #[error("Could not read a service choice: {0}")]
    Prompt(String),

    #[error("Invalid settings in {path:?}: {message}")]
    Settings { path: PathBuf, message: String },

    #[error("Could not start {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Service '{service}' failed: {reason}")]
    Dispatch {
        service: String,
        reason: DispatchFailureReason,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchFailureReason {
    #[error("process exited with status {}", describe_code(.code))]
    NonZeroExit { code: Option<i32> },

    #[error("process exceeded the {kind} timeout of {}s", .limit.as_secs())]
    TimedOut { kind: TimeoutKind, limit: Duration },

    #[error("could not start process: {0}")]
    Spawn(String),

    #[error("lost process output: {0}")]
    Io(String),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "unknown (killed by signal)".to_string(),
    }
}

impl MicroError {
    /// Maps the error onto the process exit code reported to the operator.
    ///
    /// A failing subprocess propagates its own status; everything else is a
    /// setup failure.
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::Dispatch {
                reason: DispatchFailureReason::NonZeroExit { code: Some(code) },
                ..
            } => match u8::try_from(*code) {
                Ok(code) if code != 0 => code,
                _ => 1,
            },
            Self::Dispatch { .. } => 1,
            _ => EXIT_SETUP_FAILURE,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}
