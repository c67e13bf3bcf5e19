pub mod cli;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;

// Mocks shared by unit and integration tests
pub mod test_support;

pub use domain::{
    CommandVerb, DispatchJob, EligibleService, ProcessRunner, SelectionRequest, ServiceChooser,
    ServiceEntry, ServiceMap, TimeoutPolicy,
};
pub use error::{MicroError, Result};
pub use infra::{DescriptorReader, RuntimeResolver, Settings, SubprocessRunner};
pub use services::{Dispatcher, ServiceDiscovery, ServiceSelector};
