use crate::domain::{DispatchJob, Invocation, ProcessExit, ProcessRunner};
use crate::error::{DispatchFailureReason, MicroError, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Mount point of the service directory inside the composer container
pub const CONTAINER_APP_DIR: &str = "/app";

/// Services processed by a successful run, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub completed: Vec<String>,
}

/// Runs composer for each job inside a throwaway container, stopping at the
/// first failure.
#[derive(Debug)]
pub struct Dispatcher {
    runner: Arc<dyn ProcessRunner>,
    composer_image: String,
}

impl Dispatcher {
    pub fn new(runner: Arc<dyn ProcessRunner>, composer_image: impl Into<String>) -> Self {
        Self {
            runner,
            composer_image: composer_image.into(),
        }
    }

    /// `<runtime> run --rm ... <image>:<tag> <verb> --no-interaction --no-suggest`
    pub fn build_invocation(&self, job: &DispatchJob) -> Invocation {
        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "--env".into(),
            "COMPOSER_ALLOW_SUPERUSER=1".into(),
            "--volume".into(),
            format!(
                "{}:{CONTAINER_APP_DIR}:rw",
                job.service.directory().display()
            ),
            format!("{}:{}", self.composer_image, job.service.tool_version_tag),
        ];

        args.extend(job.verb.to_args());
        args.push("--no-interaction".into());
        args.push("--no-suggest".into());

        Invocation {
            program: job.runtime_executable.clone(),
            args,
        }
    }

    /// Runs `jobs` in order, streaming output into `sink`.
    ///
    /// The first failing job aborts the run; jobs after it are never started.
    pub fn run_all<I>(&self, jobs: I, sink: &mut dyn Write) -> Result<DispatchSummary>
    where
        I: IntoIterator<Item = DispatchJob>,
    {
        let mut summary = DispatchSummary::default();

        for job in jobs {
            let service = job.service.name().to_string();

            write_section(
                sink,
                &format!("Run `composer {}` for service {}", job.verb, service),
            )?;

            let invocation = self.build_invocation(&job);
            debug!("Invocation for {}: {}", service, invocation);

            let exit = match self.runner.run(&invocation, &job.timeouts, sink) {
                Ok(exit) => exit,
                Err(MicroError::Spawn { source, .. }) => {
                    return Err(fail(
                        service,
                        DispatchFailureReason::Spawn(source.to_string()),
                    ));
                }
                Err(e) => {
                    return Err(fail(service, DispatchFailureReason::Io(e.to_string())));
                }
            };

            match exit {
                ProcessExit::Success => {
                    info!("composer {} finished for {}", job.verb.name(), service);
                    summary.completed.push(service);
                }
                ProcessExit::Failed { code } => {
                    return Err(fail(service, DispatchFailureReason::NonZeroExit { code }));
                }
                ProcessExit::TimedOut { kind, limit } => {
                    return Err(fail(
                        service,
                        DispatchFailureReason::TimedOut { kind, limit },
                    ));
                }
            }
        }

        Ok(summary)
    }
}

fn fail(service: String, reason: DispatchFailureReason) -> MicroError {
    error!("Aborting: service {} failed ({})", service, reason);
    MicroError::Dispatch { service, reason }
}

fn write_section(sink: &mut dyn Write, title: &str) -> Result<()> {
    write!(sink, "\n\n{title}\n{}\n\n", "-".repeat(title.chars().count()))?;
    sink.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CommandVerb, EligibleService, ServiceEntry, TimeoutPolicy};
    use crate::test_support::MockProcessRunner;
    use std::path::PathBuf;

    fn job(name: &str, tag: &str, verb: CommandVerb) -> DispatchJob {
        DispatchJob {
            service: EligibleService {
                entry: ServiceEntry::new(
                    name,
                    Some(format!("prooph/php:{tag}-fpm")),
                    PathBuf::from("/srv/project/service").join(name),
                ),
                tool_version_tag: tag.to_string(),
            },
            verb,
            timeouts: TimeoutPolicy::from_secs(0, 30),
            runtime_executable: PathBuf::from("/usr/bin/docker"),
        }
    }

    fn dispatcher(mock: &Arc<MockProcessRunner>) -> Dispatcher {
        Dispatcher::new(mock.clone(), "prooph/composer")
    }

    #[test]
    fn builds_containerized_install() {
        let mock = Arc::new(MockProcessRunner::new());
        let invocation = dispatcher(&mock).build_invocation(&job("a", "7.2", CommandVerb::Install));

        assert_eq!(invocation.program, PathBuf::from("/usr/bin/docker"));
        assert_eq!(
            invocation.args,
            vec![
                "run",
                "--rm",
                "--env",
                "COMPOSER_ALLOW_SUPERUSER=1",
                "--volume",
                "/srv/project/service/a:/app:rw",
                "prooph/composer:7.2",
                "install",
                "--no-interaction",
                "--no-suggest",
            ]
        );
    }

    #[test]
    fn require_packages_precede_prompt_flags() {
        let mock = Arc::new(MockProcessRunner::new());
        let verb = CommandVerb::Require {
            packages: vec!["prooph/service-bus:^6.0".into()],
            dev: false,
        };
        let invocation = dispatcher(&mock).build_invocation(&job("a", "7.1", verb));

        let tail: Vec<&str> = invocation.args[7..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "require",
                "prooph/service-bus:^6.0",
                "--no-interaction",
                "--no-suggest"
            ]
        );
    }

    #[test]
    fn runs_jobs_in_given_order() {
        let mock = Arc::new(MockProcessRunner::new());
        let mut out = Vec::new();

        let summary = dispatcher(&mock)
            .run_all(
                vec![
                    job("zeta", "7.2", CommandVerb::Update),
                    job("alpha", "7.3", CommandVerb::Update),
                ],
                &mut out,
            )
            .unwrap();

        assert_eq!(summary.completed, vec!["zeta", "alpha"]);
        assert_eq!(mock.services_run(), vec!["zeta", "alpha"]);

        let out = String::from_utf8(out).unwrap();
        let zeta = out.find("Run `composer update` for service zeta").unwrap();
        let alpha = out.find("Run `composer update` for service alpha").unwrap();
        assert!(zeta < alpha);
    }

    #[test]
    fn streams_process_output_after_header() {
        let mock = Arc::new(MockProcessRunner::new());
        mock.set_output("a", "Loading composer repositories\n");
        let mut out = Vec::new();

        dispatcher(&mock)
            .run_all(vec![job("a", "7.2", CommandVerb::Install)], &mut out)
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        let header = out.find("for service a").unwrap();
        let body = out.find("Loading composer repositories").unwrap();
        assert!(header < body);
    }

    #[test]
    fn stops_at_first_failure() {
        let mock = Arc::new(MockProcessRunner::new());
        mock.set_exit("a", ProcessExit::Failed { code: Some(1) });
        let mut out = Vec::new();

        let err = dispatcher(&mock)
            .run_all(
                vec![
                    job("a", "7.2", CommandVerb::Install),
                    job("d", "7.3", CommandVerb::Install),
                ],
                &mut out,
            )
            .unwrap_err();

        assert!(matches!(
            err,
            MicroError::Dispatch {
                ref service,
                reason: DispatchFailureReason::NonZeroExit { code: Some(1) },
            } if service == "a"
        ));
        assert_eq!(mock.services_run(), vec!["a"]);
        assert!(!String::from_utf8(out).unwrap().contains("service d"));
    }

    #[test]
    fn timeout_aborts_remaining_jobs() {
        let mock = Arc::new(MockProcessRunner::new());
        mock.set_exit(
            "b",
            ProcessExit::TimedOut {
                kind: crate::domain::TimeoutKind::Idle,
                limit: std::time::Duration::from_secs(30),
            },
        );
        let mut out = Vec::new();

        let err = dispatcher(&mock)
            .run_all(
                vec![
                    job("a", "7.2", CommandVerb::Install),
                    job("b", "7.2", CommandVerb::Install),
                    job("c", "7.2", CommandVerb::Install),
                ],
                &mut out,
            )
            .unwrap_err();

        assert!(matches!(err, MicroError::Dispatch { ref service, .. } if service == "b"));
        assert_eq!(mock.services_run(), vec!["a", "b"]);
    }

    #[test]
    fn runner_error_becomes_dispatch_failure() {
        let mock = Arc::new(MockProcessRunner::new());
        mock.set_fail_on("a");
        let mut out = Vec::new();

        let err = dispatcher(&mock)
            .run_all(vec![job("a", "7.2", CommandVerb::Install)], &mut out)
            .unwrap_err();

        assert!(matches!(
            err,
            MicroError::Dispatch {
                reason: DispatchFailureReason::Spawn(_),
                ..
            }
        ));
    }

    /// Accepts headers but fails once process output arrives, like a closed pipe
    struct ClosedAfterHeader;

    impl Write for ClosedAfterHeader {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if buf.starts_with(b"Installing") {
                return Err(std::io::ErrorKind::BrokenPipe.into());
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn lost_output_is_not_a_spawn_failure() {
        let mock = Arc::new(MockProcessRunner::new());
        mock.set_output("a", "Installing dependencies\n");

        let err = dispatcher(&mock)
            .run_all(
                vec![
                    job("a", "7.2", CommandVerb::Install),
                    job("b", "7.2", CommandVerb::Install),
                ],
                &mut ClosedAfterHeader,
            )
            .unwrap_err();

        assert!(matches!(
            err,
            MicroError::Dispatch {
                ref service,
                reason: DispatchFailureReason::Io(_),
            } if service == "a"
        ));
        assert_eq!(mock.services_run(), vec!["a"]);
    }

    #[test]
    fn passes_timeouts_to_runner() {
        let mock = Arc::new(MockProcessRunner::new());
        let mut out = Vec::new();
        let mut j = job("a", "7.2", CommandVerb::Install);
        j.timeouts = TimeoutPolicy::from_secs(300, 0);

        dispatcher(&mock).run_all(vec![j], &mut out).unwrap();

        assert_eq!(mock.timeouts_seen(), vec![TimeoutPolicy::from_secs(300, 0)]);
    }
}
