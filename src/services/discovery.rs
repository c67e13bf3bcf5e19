use crate::domain::{EligibleService, ServiceEntry, ServiceMap};
use crate::error::{MicroError, Result};
use crate::infra::config::SETTINGS_FILE_NAME;
use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use std::path::PathBuf;
use tracing::debug;

const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Filters declared services down to those composer can run against
#[derive(Debug, Clone)]
pub struct ServiceDiscovery {
    image_pattern: Regex,
}

impl ServiceDiscovery {
    /// # Arguments
    /// * `base_image` - `<vendor>/<tool>` prefix a service image must start with
    pub fn new(base_image: &str) -> Result<Self> {
        let pattern = format!(r"^{}:([0-9.]+)", regex::escape(base_image));
        let image_pattern = RegexBuilder::new(&pattern)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
            .map_err(|e| MicroError::Settings {
                path: PathBuf::from(SETTINGS_FILE_NAME),
                message: format!("unusable php image prefix in [images]: {e}"),
            })?;

        Ok(Self { image_pattern })
    }

    /// Version tag captured from `image`, if it is a base image reference
    pub fn version_tag(&self, image: &str) -> Option<String> {
        self.image_pattern
            .captures(image)
            .and_then(|caps| caps.get(1))
            .map(|tag| tag.as_str().to_string())
            .filter(|tag| !tag.is_empty())
    }

    /// Keeps entries with a matching image and a manifest, in declared order
    pub fn discover(&self, declared: &IndexMap<String, ServiceEntry>) -> ServiceMap {
        let mut eligible = ServiceMap::new();

        for (name, entry) in declared {
            let Some(image) = entry.image.as_deref() else {
                debug!("Ignoring {} - no image", name);
                continue;
            };

            let Some(tool_version_tag) = self.version_tag(image) else {
                debug!("Ignoring {} - image {} is not a php image", name, image);
                continue;
            };

            if !entry.manifest_path().exists() {
                debug!("Ignoring {} - no {:?}", name, entry.manifest_path());
                continue;
            }

            eligible.insert(
                name.clone(),
                EligibleService {
                    entry: entry.clone(),
                    tool_version_tag,
                },
            );
        }

        eligible
    }
}
