use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Name of the dependency manifest that must exist inside a service directory.
pub const MANIFEST_FILE: &str = "composer.json";

/// A service as declared in the deployment descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    pub name: String,
    /// Raw `image` value, absent when the service is built locally
    pub image: Option<String>,
    /// Service source directory on the host (`<project>/<services dir>/<name>`)
    pub directory: PathBuf,
}

impl ServiceEntry {
    pub fn new(name: impl Into<String>, image: Option<String>, directory: PathBuf) -> Self {
        Self {
            name: name.into(),
            image,
            directory,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.directory.join(MANIFEST_FILE)
    }
}

/// A declared service that can run composer commands.
///
/// Only built by discovery, so `tool_version_tag` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleService {
    pub entry: ServiceEntry,
    pub tool_version_tag: String,
}

impl EligibleService {
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn directory(&self) -> &Path {
        &self.entry.directory
    }
}

/// Eligible services keyed by name, in descriptor order.
pub type ServiceMap = IndexMap<String, EligibleService>;
