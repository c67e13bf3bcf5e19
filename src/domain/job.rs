use super::EligibleService;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default total timeout in seconds (0 = unbounded)
pub const DEFAULT_TIMEOUT_SECS: u64 = 0;
/// Default idle timeout in seconds (0 = unbounded)
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;

/// Composer command to run inside each selected service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandVerb {
    Install,
    Update,
    Require { packages: Vec<String>, dev: bool },
}

impl CommandVerb {
    /// Composer sub-command name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Update => "update",
            Self::Require { .. } => "require",
        }
    }

    /// Verb plus its operands, as passed to composer
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![self.name().to_string()];

        if let Self::Require { packages, dev } = self {
            if *dev {
                args.push("--dev".to_string());
            }
            args.extend(packages.iter().cloned());
        }

        args
    }
}

impl fmt::Display for CommandVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_args().join(" "))
    }
}

/// What the operator asked to target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionRequest {
    Single(String),
    All,
    Interactive,
}

impl SelectionRequest {
    /// `--all` wins over a positional service name, as in the CLI help.
    /// Only an empty name counts as no name; anything else is looked up.
    pub fn from_cli(service: Option<String>, all: bool) -> Self {
        match (all, service) {
            (true, _) => Self::All,
            (false, Some(name)) if !name.is_empty() => Self::Single(name),
            (false, _) => Self::Interactive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Total,
    Idle,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Total => write!(f, "total"),
            Self::Idle => write!(f, "idle"),
        }
    }
}

/// Per-process time limits; `None` means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeoutPolicy {
    pub total: Option<Duration>,
    pub idle: Option<Duration>,
}

impl TimeoutPolicy {
    pub fn from_secs(total: u64, idle: u64) -> Self {
        let bounded = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
        Self {
            total: bounded(total),
            idle: bounded(idle),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn limit(&self, kind: TimeoutKind) -> Option<Duration> {
        match kind {
            TimeoutKind::Total => self.total,
            TimeoutKind::Idle => self.idle,
        }
    }
}

/// One containerized composer run, built right before it executes
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub service: EligibleService,
    pub verb: CommandVerb,
    pub timeouts: TimeoutPolicy,
    pub runtime_executable: PathBuf,
}

/// A fully resolved program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a subprocess ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    Success,
    /// Non-zero exit; `None` when terminated by a signal
    Failed { code: Option<i32> },
    TimedOut { kind: TimeoutKind, limit: Duration },
}

impl ProcessExit {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}
