use anyhow::{Context, Result};
use clap::Parser;
use micro::cli::{ComposerCommand, RunOutcome, composer};
use micro::error::{EXIT_SETUP_FAILURE, MicroError};
use micro::infra::Settings;
use micro::infra::config::{ComposeConfig, SettingsFile};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "micro",
    version,
    about = "Runs composer for the php services of a micro deployment, one container per service"
)]
struct Cli {
    /// Project root holding docker-compose.yml (default: current directory)
    #[arg(long, global = true, env = "MICRO_PROJECT_DIR")]
    project_dir: Option<PathBuf>,

    /// Deployment descriptor, relative to the project root
    #[arg(short = 'f', long = "file", global = true, env = "MICRO_COMPOSE_FILE")]
    compose_file: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: ComposerCommand,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => {
            error!("{err:#}");
            err.downcast_ref::<MicroError>()
                .map_or(ExitCode::from(EXIT_SETUP_FAILURE), MicroError::exit_code)
        }
    }
}

fn run(cli: Cli) -> Result<RunOutcome> {
    let project_dir = match cli.project_dir {
        Some(dir) => std::path::absolute(&dir)
            .with_context(|| format!("resolving project directory {:?}", dir))?,
        None => std::env::current_dir().context("reading current directory")?,
    };

    let overrides = SettingsFile {
        compose: ComposeConfig {
            file: cli.compose_file,
            services_dir: None,
        },
        ..Default::default()
    };
    let settings = Settings::load(&project_dir, overrides)?;

    Ok(composer::run(cli.command, settings)?)
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "micro=debug,warn" } else { "micro=info,warn" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}
