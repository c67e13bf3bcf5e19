pub mod config;
pub mod descriptor;
pub mod process_runner;
pub mod runtime_resolver;

pub use config::{Settings, SettingsFile};
pub use descriptor::DescriptorReader;
pub use process_runner::SubprocessRunner;
pub use runtime_resolver::RuntimeResolver;
