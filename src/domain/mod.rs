mod job;
mod service;
pub mod traits;

pub use job::{
    CommandVerb, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS, DispatchJob, Invocation,
    ProcessExit, SelectionRequest, TimeoutKind, TimeoutPolicy,
};
pub use service::{EligibleService, MANIFEST_FILE, ServiceEntry, ServiceMap};
pub use traits::{ProcessRunner, ServiceChooser};
