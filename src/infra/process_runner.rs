use crate::domain::{Invocation, ProcessExit, ProcessRunner, TimeoutKind, TimeoutPolicy};
use crate::error::{MicroError, Result};
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const READ_BUFFER_SIZE: usize = 8 * 1024;
/// Time a timed-out process gets to exit after SIGTERM before it is killed
const STOP_GRACE: Duration = Duration::from_secs(10);

/// Runs invocations as real child processes.
///
/// stdout and stderr are pumped by one reader thread each into a channel, so
/// the calling thread can wait for output with a deadline and enforce both the
/// total and the idle timeout.
#[derive(Debug, Default)]
pub struct SubprocessRunner;

impl SubprocessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SubprocessRunner {
    fn run(
        &self,
        invocation: &Invocation,
        timeouts: &TimeoutPolicy,
        sink: &mut dyn Write,
    ) -> Result<ProcessExit> {
        debug!("Spawning {}", invocation);

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| MicroError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::channel();
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(pump(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(pump(stderr, tx.clone()));
        }
        drop(tx);

        let mut watch = Watch::new(*timeouts);

        match stream_output(&mut child, &rx, &mut watch, sink) {
            Ok(Some((kind, limit))) => {
                warn!("Stopping {} after {kind} timeout", invocation.program.display());
                terminate(&mut child);
                return Ok(ProcessExit::TimedOut { kind, limit });
            }
            Ok(None) => {}
            Err(e) => {
                terminate(&mut child);
                return Err(e);
            }
        }

        for handle in pumps {
            let _ = handle.join();
        }

        // Both pipes are closed, the process may still be running
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(exit_from_status(status));
            }

            match watch.next_deadline() {
                Some((kind, limit, deadline)) => {
                    if Instant::now() >= deadline {
                        warn!("Stopping {} after {kind} timeout", invocation.program.display());
                        terminate(&mut child);
                        return Ok(ProcessExit::TimedOut { kind, limit });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                None => return Ok(exit_from_status(child.wait()?)),
            }
        }
    }
}

/// Tracks when the process started and last produced output
struct Watch {
    timeouts: TimeoutPolicy,
    started: Instant,
    last_output: Instant,
}

impl Watch {
    fn new(timeouts: TimeoutPolicy) -> Self {
        let now = Instant::now();
        Self {
            timeouts,
            started: now,
            last_output: now,
        }
    }

    fn touch(&mut self) {
        self.last_output = Instant::now();
    }

    /// Earliest pending deadline, if any timeout is bounded
    fn next_deadline(&self) -> Option<(TimeoutKind, Duration, Instant)> {
        let total = self
            .timeouts
            .total
            .map(|limit| (TimeoutKind::Total, limit, self.started + limit));
        let idle = self
            .timeouts
            .idle
            .map(|limit| (TimeoutKind::Idle, limit, self.last_output + limit));

        match (total, idle) {
            (Some(total), Some(idle)) => Some(if total.2 <= idle.2 { total } else { idle }),
            (total, idle) => total.or(idle),
        }
    }
}

/// Forwards output until both pipes close. Returns the timeout that fired, if any.
fn stream_output(
    child: &mut Child,
    rx: &Receiver<Vec<u8>>,
    watch: &mut Watch,
    sink: &mut dyn Write,
) -> Result<Option<(TimeoutKind, Duration)>> {
    loop {
        let received = match watch.next_deadline() {
            Some((kind, limit, deadline)) => {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(Some((kind, limit)));
                }
                match rx.recv_timeout(deadline - now) {
                    Ok(chunk) => Some(chunk),
                    Err(RecvTimeoutError::Timeout) => return Ok(Some((kind, limit))),
                    Err(RecvTimeoutError::Disconnected) => None,
                }
            }
            None => rx.recv().ok(),
        };

        let Some(chunk) = received else {
            debug!("Output closed for pid {}", child.id());
            return Ok(None);
        };

        watch.touch();
        sink.write_all(&chunk)?;
        sink.flush()?;
    }
}

fn pump<R>(mut reader: R, tx: Sender<Vec<u8>>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Stops and reaps the child. Reader threads are left to finish on their own,
/// since grandchildren may still hold the pipes open.
fn terminate(child: &mut Child) {
    if request_stop(child) && wait_until_exited(child, STOP_GRACE) {
        return;
    }

    if let Err(e) = child.kill() {
        debug!("kill failed (process may have exited): {}", e);
    }
    let _ = child.wait();
}

/// Sends SIGTERM so the container runtime can pass the stop on to the container.
#[cfg(unix)]
fn request_stop(child: &Child) -> bool {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(child.id()) else {
        return false;
    };

    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            debug!("SIGTERM to pid {} failed: {}", pid, e);
            false
        }
    }
}

#[cfg(not(unix))]
fn request_stop(_child: &Child) -> bool {
    false
}

fn wait_until_exited(child: &mut Child, grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
            Ok(None) => {
                debug!("pid {} ignored SIGTERM for {:?}", child.id(), grace);
                return false;
            }
            Err(_) => return false,
        }
    }
}

fn exit_from_status(status: ExitStatus) -> ProcessExit {
    if status.success() {
        ProcessExit::Success
    } else {
        ProcessExit::Failed {
            code: status.code(),
        }
    }
}
