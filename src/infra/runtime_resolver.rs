use crate::error::{MicroError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Locates the container runtime executable.
///
/// The PATH search runs at most once per resolver; the result (found or not)
/// is kept for the lifetime of the value.
#[derive(Debug)]
pub struct RuntimeResolver {
    binary: String,
    search_path: Option<OsString>,
    found: OnceLock<Option<PathBuf>>,
}

impl RuntimeResolver {
    /// Searches the host's `PATH`
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            search_path: None,
            found: OnceLock::new(),
        }
    }

    /// Searches the given `PATH`-style list instead of the host's
    pub fn with_search_path(binary: impl Into<String>, search_path: impl Into<OsString>) -> Self {
        Self {
            binary: binary.into(),
            search_path: Some(search_path.into()),
            found: OnceLock::new(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Returns `explicit` untouched when given, otherwise the searched executable
    pub fn resolve(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            debug!("Using explicit runtime executable {:?}", path);
            return Ok(path.to_path_buf());
        }

        self.found
            .get_or_init(|| self.search())
            .clone()
            .ok_or_else(|| MicroError::RuntimeNotFound {
                binary: self.binary.clone(),
            })
    }

    fn search(&self) -> Option<PathBuf> {
        let found = match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                which::which_in(&self.binary, Some(paths), cwd)
            }
            None => which::which(&self.binary),
        };

        match found {
            Ok(path) => {
                debug!("Found {} at {:?}", self.binary, path);
                Some(path)
            }
            Err(e) => {
                debug!("{} not found in PATH: {}", self.binary, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn fake_binary(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn explicit_path_skips_search() {
        let temp = TempDir::new().unwrap();
        let resolver = RuntimeResolver::with_search_path("docker", temp.path());

        let path = resolver
            .resolve(Some(Path::new("/usr/local/bin/podman")))
            .unwrap();
        assert_eq!(path, PathBuf::from("/usr/local/bin/podman"));
    }

    #[test]
    fn reports_missing_runtime() {
        let temp = TempDir::new().unwrap();
        let resolver = RuntimeResolver::with_search_path("docker", temp.path());

        let err = resolver.resolve(None).unwrap_err();
        assert!(matches!(err, MicroError::RuntimeNotFound { ref binary } if binary == "docker"));
    }

    #[cfg(unix)]
    #[test]
    fn explicit_path_wins_over_searchable_binary() {
        let temp = TempDir::new().unwrap();
        fake_binary(temp.path(), "docker");
        let resolver = RuntimeResolver::with_search_path("docker", temp.path());

        let path = resolver
            .resolve(Some(Path::new("/usr/local/bin/podman")))
            .unwrap();
        assert_eq!(path, PathBuf::from("/usr/local/bin/podman"));
    }

    #[cfg(unix)]
    #[test]
    fn search_result_is_memoized() {
        let temp = TempDir::new().unwrap();
        let binary = fake_binary(temp.path(), "docker");
        let resolver = RuntimeResolver::with_search_path("docker", temp.path());

        let first = resolver.resolve(None).unwrap();
        assert_eq!(first.file_name(), binary.file_name());

        // Gone from disk, but the first lookup is reused
        fs::remove_file(&binary).unwrap();
        let second = resolver.resolve(None).unwrap();
        assert_eq!(first, second);
    }
}
