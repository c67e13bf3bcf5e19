mod discovery;
mod dispatcher;
mod selector;

pub use discovery::ServiceDiscovery;
pub use dispatcher::{CONTAINER_APP_DIR, DispatchSummary, Dispatcher};
pub use selector::{SELECT_PROMPT, ServiceSelector};
