use crate::cli::prompt::TerminalChooser;
use crate::domain::{
    CommandVerb, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS, DispatchJob, ProcessRunner,
    SelectionRequest, ServiceChooser, TimeoutPolicy,
};
use crate::error::Result;
use crate::infra::{DescriptorReader, RuntimeResolver, Settings, SubprocessRunner};
use crate::services::{DispatchSummary, Dispatcher, ServiceDiscovery, ServiceSelector};
use clap::{Args, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

/// Options shared by every composer command
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TargetArgs {
    /// Service to run composer for (asked interactively when omitted or unknown)
    pub service: Option<String>,

    /// Run for every php service
    #[arg(short = 'a', long)]
    pub all: bool,

    /// Sets the process timeout (max. runtime) per service in seconds, 0 disables it
    #[arg(short = 't', long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Sets the process idle timeout (max. time since last output) per service in seconds, 0 disables it
    #[arg(short = 'i', long, default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout: u64,

    /// Sets the path to docker executable
    #[arg(long, env = "MICRO_DOCKER_EXECUTABLE")]
    pub docker_executable: Option<PathBuf>,
}

impl TargetArgs {
    pub fn selection(&self) -> SelectionRequest {
        SelectionRequest::from_cli(self.service.clone(), self.all)
    }

    pub fn timeouts(&self) -> TimeoutPolicy {
        TimeoutPolicy::from_secs(self.timeout, self.idle_timeout)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ComposerCommand {
    /// Installs composer dependencies for services
    #[command(name = "micro:composer:install", visible_alias = "install")]
    Install(TargetArgs),

    /// Updates composer dependencies for services
    #[command(name = "micro:composer:update", visible_alias = "update")]
    Update(TargetArgs),

    /// Requires composer packages for services
    #[command(name = "micro:composer:require", visible_alias = "require")]
    Require {
        #[command(flatten)]
        target: TargetArgs,

        /// Package to require, e.g. `prooph/event-store:^7.0` (repeatable)
        #[arg(short = 'p', long = "package", required = true)]
        packages: Vec<String>,

        /// Add the packages to require-dev
        #[arg(long)]
        dev: bool,
    },
}

impl ComposerCommand {
    pub fn into_parts(self) -> (CommandVerb, TargetArgs) {
        match self {
            Self::Install(target) => (CommandVerb::Install, target),
            Self::Update(target) => (CommandVerb::Update, target),
            Self::Require {
                target,
                packages,
                dev,
            } => (CommandVerb::Require { packages, dev }, target),
        }
    }
}

/// How a composer command ended without a fatal error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(DispatchSummary),
    NoEligibleServices,
}

impl RunOutcome {
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::Completed(_) => 0,
            Self::NoEligibleServices => 1,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}

/// Discovery, selection and dispatch for one composer command
pub struct ComposerWorkflow {
    settings: Settings,
    resolver: RuntimeResolver,
    runner: Arc<dyn ProcessRunner>,
    chooser: Box<dyn ServiceChooser>,
}

impl ComposerWorkflow {
    pub fn new(settings: Settings) -> Self {
        let resolver = RuntimeResolver::new(settings.runtime_binary.clone());
        Self::with_components(
            settings,
            resolver,
            Arc::new(SubprocessRunner::new()),
            Box::new(TerminalChooser::new()),
        )
    }

    pub fn with_components(
        settings: Settings,
        resolver: RuntimeResolver,
        runner: Arc<dyn ProcessRunner>,
        chooser: Box<dyn ServiceChooser>,
    ) -> Self {
        Self {
            settings,
            resolver,
            runner,
            chooser,
        }
    }

    pub fn execute(
        &self,
        verb: CommandVerb,
        target: &TargetArgs,
        sink: &mut dyn Write,
    ) -> Result<RunOutcome> {
        let reader = DescriptorReader::new(&self.settings.services_dir);
        let declared = reader.read(&self.settings.compose_file)?;

        let discovery = ServiceDiscovery::new(&self.settings.php_image)?;
        let eligible = discovery.discover(&declared);

        if eligible.is_empty() {
            warn!(
                "No php services declared in {} or no composer.json files found. Aborting",
                self.descriptor_name()
            );
            return Ok(RunOutcome::NoEligibleServices);
        }

        let selected =
            ServiceSelector::new(self.chooser.as_ref()).select(&target.selection(), &eligible)?;

        let timeouts = target.timeouts();
        let runtime_executable = self
            .resolver
            .resolve(target.docker_executable.as_deref())?;

        info!(
            "Running composer {} for {} service(s)",
            verb.name(),
            selected.len()
        );

        let dispatcher = Dispatcher::new(self.runner.clone(), &self.settings.composer_image);
        let jobs = selected.into_values().map(|service| DispatchJob {
            service,
            verb: verb.clone(),
            timeouts,
            runtime_executable: runtime_executable.clone(),
        });

        let summary = dispatcher.run_all(jobs, sink)?;
        Ok(RunOutcome::Completed(summary))
    }

    fn descriptor_name(&self) -> String {
        self.settings
            .compose_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.settings.compose_file.display().to_string())
    }
}

pub fn run(command: ComposerCommand, settings: Settings) -> Result<RunOutcome> {
    let (verb, target) = command.into_parts();
    let workflow = ComposerWorkflow::new(settings);

    let stdout = std::io::stdout();
    let mut sink = stdout.lock();
    workflow.execute(verb, &target, &mut sink)
}
