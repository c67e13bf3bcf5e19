use crate::error::{MicroError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SETTINGS_FILE_NAME: &str = "micro.toml";
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";
pub const DEFAULT_SERVICES_DIR: &str = "service";
pub const DEFAULT_PHP_IMAGE: &str = "prooph/php";
pub const DEFAULT_COMPOSER_IMAGE: &str = "prooph/composer";
pub const DEFAULT_RUNTIME_BINARY: &str = "docker";

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ComposeConfig {
    pub file: Option<PathBuf>,
    pub services_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ImagesConfig {
    /// Base image prefix that marks a service as php (`<vendor>/<tool>`)
    pub php: Option<String>,
    /// Image used to run composer, tagged with the service's php version
    pub composer: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    pub binary: Option<String>,
}

/// Contents of `micro.toml`; every key is optional
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    #[serde(default)]
    pub compose: ComposeConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl SettingsFile {
    /// Merges another SettingsFile into self.
    /// Values from `other` overwrite values in `self` if present.
    pub fn merge(&mut self, other: SettingsFile) {
        if let Some(file) = other.compose.file {
            self.compose.file = Some(file);
        }
        if let Some(dir) = other.compose.services_dir {
            self.compose.services_dir = Some(dir);
        }
        if let Some(php) = other.images.php {
            self.images.php = Some(php);
        }
        if let Some(composer) = other.images.composer {
            self.images.composer = Some(composer);
        }
        if let Some(binary) = other.runtime.binary {
            self.runtime.binary = Some(binary);
        }
    }
}

/// Effective settings for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub project_dir: PathBuf,
    pub compose_file: PathBuf,
    pub services_dir: PathBuf,
    pub php_image: String,
    pub composer_image: String,
    pub runtime_binary: String,
}

impl Settings {
    /// Loads `micro.toml` from `project_dir` (if any) and applies `overrides` on top.
    pub fn load(project_dir: &Path, overrides: SettingsFile) -> Result<Self> {
        let mut file = load_settings_file(project_dir)?;
        file.merge(overrides);
        Ok(Self::resolve(project_dir, file))
    }

    /// Applies defaults and anchors relative paths at `project_dir`
    pub fn resolve(project_dir: &Path, file: SettingsFile) -> Self {
        let compose_file = file
            .compose
            .file
            .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPOSE_FILE));
        let services_dir = file
            .compose
            .services_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SERVICES_DIR));

        Self {
            project_dir: project_dir.to_path_buf(),
            compose_file: anchor(project_dir, &compose_file),
            services_dir: anchor(project_dir, &services_dir),
            php_image: file
                .images
                .php
                .unwrap_or_else(|| DEFAULT_PHP_IMAGE.to_string()),
            composer_image: file
                .images
                .composer
                .unwrap_or_else(|| DEFAULT_COMPOSER_IMAGE.to_string()),
            runtime_binary: file
                .runtime
                .binary
                .unwrap_or_else(|| DEFAULT_RUNTIME_BINARY.to_string()),
        }
    }

    pub fn defaults(project_dir: &Path) -> Self {
        Self::resolve(project_dir, SettingsFile::default())
    }

    /// Host directory holding the sources of `service`
    pub fn service_dir(&self, service: &str) -> PathBuf {
        self.services_dir.join(service)
    }
}

pub fn settings_path(project_dir: &Path) -> PathBuf {
    project_dir.join(SETTINGS_FILE_NAME)
}

pub fn load_settings_file(project_dir: &Path) -> Result<SettingsFile> {
    let path = settings_path(project_dir);

    if !path.exists() {
        debug!("No {} in {:?}, using defaults", SETTINGS_FILE_NAME, project_dir);
        return Ok(SettingsFile::default());
    }

    let content = fs::read_to_string(&path).map_err(|e| MicroError::Settings {
        path: path.clone(),
        message: e.to_string(),
    })?;

    parse_settings(&content, &path)
}

fn parse_settings(content: &str, path: &Path) -> Result<SettingsFile> {
    toml::from_str(content).map_err(|e| MicroError::Settings {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn anchor(project_dir: &Path, path: &Path) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(path.to_string_lossy().as_ref()).into_owned());

    if expanded.is_absolute() {
        expanded
    } else {
        project_dir.join(expanded)
    }
}
