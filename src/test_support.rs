use crate::domain::{
    Invocation, ProcessExit, ProcessRunner, ServiceChooser, TimeoutPolicy,
};
use crate::error::{MicroError, Result};
use crate::services::CONTAINER_APP_DIR;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex, RwLock};

/// Records invocations instead of spawning processes.
///
/// Services are identified by the host directory mounted at `/app`, whose
/// last component is the service name.
#[derive(Debug)]
pub struct MockProcessRunner {
    invocations: RwLock<Vec<Invocation>>,
    timeouts: RwLock<Vec<TimeoutPolicy>>,
    exits: RwLock<HashMap<String, ProcessExit>>,
    output: RwLock<HashMap<String, String>>,
    fail_on: RwLock<Option<String>>,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self {
            invocations: RwLock::new(Vec::new()),
            timeouts: RwLock::new(Vec::new()),
            exits: RwLock::new(HashMap::new()),
            output: RwLock::new(HashMap::new()),
            fail_on: RwLock::new(None),
        }
    }

    /// Exit to report for `service` (default: success)
    pub fn set_exit(&self, service: &str, exit: ProcessExit) {
        self.exits
            .write()
            .unwrap()
            .insert(service.to_string(), exit);
    }

    /// Output written to the sink when `service` runs
    pub fn set_output(&self, service: &str, output: &str) {
        self.output
            .write()
            .unwrap()
            .insert(service.to_string(), output.to_string());
    }

    /// Make `run` itself fail for `service`, as if the runtime could not start
    pub fn set_fail_on(&self, service: &str) {
        *self.fail_on.write().unwrap() = Some(service.to_string());
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.read().unwrap().clone()
    }

    pub fn timeouts_seen(&self) -> Vec<TimeoutPolicy> {
        self.timeouts.read().unwrap().clone()
    }

    /// Names of the services run so far, in order
    pub fn services_run(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .filter_map(service_of)
            .collect()
    }
}

impl Default for MockProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner for MockProcessRunner {
    fn run(
        &self,
        invocation: &Invocation,
        timeouts: &TimeoutPolicy,
        sink: &mut dyn Write,
    ) -> Result<ProcessExit> {
        self.invocations.write().unwrap().push(invocation.clone());
        self.timeouts.write().unwrap().push(*timeouts);

        let service = service_of(invocation).unwrap_or_default();

        if self.fail_on.read().unwrap().as_deref() == Some(service.as_str()) {
            return Err(MicroError::Spawn {
                program: invocation.program.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("mock failure on: {service}"),
                ),
            });
        }

        if let Some(output) = self.output.read().unwrap().get(&service) {
            sink.write_all(output.as_bytes())?;
        }

        Ok(self
            .exits
            .read()
            .unwrap()
            .get(&service)
            .copied()
            .unwrap_or(ProcessExit::Success))
    }
}

fn service_of(invocation: &Invocation) -> Option<String> {
    let suffix = format!(":{CONTAINER_APP_DIR}:rw");
    invocation
        .args
        .iter()
        .find_map(|arg| arg.strip_suffix(&suffix))
        .and_then(|dir| dir.rsplit(['/', '\\']).next())
        .map(str::to_string)
}

/// Chooser with a canned answer that records what it was offered
#[derive(Debug)]
pub struct ScriptedChooser {
    answer: Option<String>,
    offered: RwLock<Vec<Vec<String>>>,
}

impl ScriptedChooser {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            offered: RwLock::new(Vec::new()),
        }
    }

    /// A chooser whose terminal is unavailable
    pub fn failing() -> Self {
        Self {
            answer: None,
            offered: RwLock::new(Vec::new()),
        }
    }

    pub fn offered(&self) -> Vec<Vec<String>> {
        self.offered.read().unwrap().clone()
    }
}

impl ServiceChooser for ScriptedChooser {
    fn choose(&self, _prompt: &str, options: &[String]) -> Result<String> {
        self.offered.write().unwrap().push(options.to_vec());
        self.answer
            .clone()
            .ok_or_else(|| MicroError::Prompt("not a terminal".to_string()))
    }
}

/// Runs `f` with a subscriber that records formatted log lines
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .finish();

    let value = tracing::subscriber::with_default(subscriber, f);
    (value, buffer.contents())
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
