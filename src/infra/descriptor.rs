use crate::domain::ServiceEntry;
use crate::error::{MicroError, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_yml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug)]
struct ComposeDocument {
    #[serde(default)]
    services: Option<IndexMap<String, Option<ComposeService>>>,
}

/// The only part of a compose service we care about.
///
/// `image` stays a raw value so numbers or lists are rejected instead of
/// being coerced into a string.
#[derive(Deserialize, Debug, Default)]
struct ComposeService {
    #[serde(default)]
    image: Option<Value>,
}

/// Reads the deployment descriptor (`docker-compose.yml`)
#[derive(Debug, Clone)]
pub struct DescriptorReader {
    services_dir: PathBuf,
}

impl DescriptorReader {
    /// # Arguments
    /// * `services_dir` - Directory holding one sub-directory per service
    pub fn new(services_dir: impl Into<PathBuf>) -> Self {
        Self {
            services_dir: services_dir.into(),
        }
    }

    /// Loads the declared services in descriptor order
    pub fn read(&self, path: &Path) -> Result<IndexMap<String, ServiceEntry>> {
        let content = fs::read_to_string(path).map_err(|e| MicroError::Descriptor {
            path: path.to_path_buf(),
            message: format!("could not read file: {e}"),
        })?;

        self.parse(&content, path)
    }

    pub fn parse(&self, content: &str, origin: &Path) -> Result<IndexMap<String, ServiceEntry>> {
        let malformed = |message: String| MicroError::Descriptor {
            path: origin.to_path_buf(),
            message,
        };

        let doc: ComposeDocument =
            serde_yml::from_str(content).map_err(|e| malformed(e.to_string()))?;

        let services = doc
            .services
            .ok_or_else(|| malformed("missing 'services' section".to_string()))?;

        debug!("{} service(s) declared in {:?}", services.len(), origin);

        services
            .into_iter()
            .map(|(name, service)| {
                let image = match service.unwrap_or_default().image {
                    None | Some(Value::Null) => None,
                    Some(Value::String(image)) => Some(image),
                    Some(other) => {
                        return Err(malformed(format!(
                            "service '{name}': image must be a string, got {other:?}"
                        )));
                    }
                };
                let entry = ServiceEntry::new(name.clone(), image, self.services_dir.join(&name));
                Ok((name, entry))
            })
            .collect()
    }
}
