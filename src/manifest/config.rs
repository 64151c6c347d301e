//! Manifest discovery and cache locations.

use std::path::{Component, Path, PathBuf};

use crate::error::ConfigError;

/// Configuration for [`Manifest`](super::Manifest).
#[derive(Debug, Clone)]
pub struct ManifestConfig {
    /// Installation root; fragment paths are reported relative to it.
    pub root: PathBuf,
    /// File name of a module manifest fragment.
    pub fragment_name: String,
    /// Directories searched for fragments, relative to `root`. A trailing
    /// `/*` searches each immediate sub-directory.
    pub search_paths: Vec<String>,
    /// Directory for the private cache artifacts. Defaults to `root/data/system`.
    pub cache_dir: Option<PathBuf>,
    /// Directory for the public web components artifact. Defaults to
    /// `root/public/data/system`.
    pub public_cache_dir: Option<PathBuf>,
    /// Module directories ending with one of these suffixes are skipped.
    pub excluded_suffixes: Vec<String>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            fragment_name: "module.json".to_string(),
            search_paths: vec![
                "modules/*".to_string(),
                "system".to_string(),
                "vendor/*".to_string(),
            ],
            cache_dir: None,
            public_cache_dir: None,
            excluded_suffixes: [".example", ".bak", ".old", ".disabled"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl ManifestConfig {
    /// Default configuration rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Resolved private cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.root.join("data").join("system"))
    }

    /// Resolved public cache directory.
    #[must_use]
    pub fn public_cache_dir(&self) -> PathBuf {
        self.public_cache_dir
            .clone()
            .unwrap_or_else(|| self.root.join("public").join("data").join("system"))
    }

    /// Returns true if fragments in `module_dir` are skipped.
    #[must_use]
    pub fn is_excluded(&self, module_dir: &str) -> bool {
        self.excluded_suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && module_dir.ends_with(suffix.as_str()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidConfig` for a fragment name containing a
    /// path separator, an empty search path list, or a search path that is
    /// absolute or climbs out of the root.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.fragment_name.is_empty() || self.fragment_name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidConfig {
                reason: format!(
                    "fragment_name must be a plain file name (got {:?})",
                    self.fragment_name
                ),
            });
        }

        if self.search_paths.is_empty() {
            return Err(ConfigError::InvalidConfig {
                reason: "at least one search path is required".to_string(),
            });
        }

        for search_path in &self.search_paths {
            let escapes = Path::new(search_path)
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
            if search_path.is_empty() || escapes {
                return Err(ConfigError::InvalidConfig {
                    reason: format!("search path {search_path:?} must be a relative path inside the root"),
                });
            }
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManifestConfig::new("/srv/app");
        assert_eq!(config.cache_dir(), PathBuf::from("/srv/app/data/system"));
        assert_eq!(config.public_cache_dir(), PathBuf::from("/srv/app/public/data/system"));
        assert_eq!(config.fragment_name, "module.json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_exclusion_suffixes() {
        let config = ManifestConfig::default();
        assert!(config.is_excluded("blog.disabled"));
        assert!(config.is_excluded("blog.example"));
        assert!(!config.is_excluded("blog"));
        assert!(!config.is_excluded("disabled-blog"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_name = ManifestConfig {
            fragment_name: "a/module.json".to_string(),
            ..ManifestConfig::default()
        };
        assert!(matches!(bad_name.validate(), Err(ConfigError::InvalidConfig { .. })));

        let escaping = ManifestConfig {
            search_paths: vec!["../outside/*".to_string()],
            ..ManifestConfig::default()
        };
        assert!(escaping.validate().is_err());

        let empty = ManifestConfig {
            search_paths: Vec::new(),
            ..ManifestConfig::default()
        };
        assert!(empty.validate().is_err());
    }
}
