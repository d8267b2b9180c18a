//! Service configuration: the root directory and tree-wide policy.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use globpack_matcher::{Pattern, PatternError, TreeWalker};

/// Configuration was unusable; the service refuses to start with it.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("service root {root} is not an existing directory")]
    InvalidRoot { root: Utf8PathBuf },

    #[error("invalid ignore pattern: {0}")]
    IgnorePattern(#[from] PatternError),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for one dispatcher instance.
///
/// `ignore_patterns` name paths that are invisible to every request, include
/// and exclude alike (editor droppings, VCS metadata). They use the same
/// glob dialect as request patterns and are validated up front.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Directory all requests resolve against. Must exist.
    pub root: Utf8PathBuf,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default)]
    pub follow_file_symlinks: bool,
}

impl ServiceConfig {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore_patterns: Vec::new(),
            follow_file_symlinks: false,
        }
    }

    #[must_use]
    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    #[must_use]
    pub fn follow_file_symlinks(mut self, follow: bool) -> Self {
        self.follow_file_symlinks = follow;
        self
    }

    /// Parse a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown shapes.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if its contents do not parse.
    pub fn from_toml_path(path: impl AsRef<Utf8Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Validate the config and build the tree walker it describes.
    pub(crate) fn build_walker(&self) -> Result<TreeWalker, ConfigError> {
        let is_dir = fs::metadata(&self.root).map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            return Err(ConfigError::InvalidRoot {
                root: self.root.clone(),
            });
        }
        let ignore = Pattern::parse_all(&self.ignore_patterns)?;
        Ok(TreeWalker::new(self.root.clone())
            .with_ignore(&ignore)?
            .follow_file_symlinks(self.follow_file_symlinks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_defaults_apply() {
        let config = ServiceConfig::from_toml_str(r#"root = "/tmp/build""#).unwrap();
        assert_eq!(config.root, "/tmp/build");
        assert!(config.ignore_patterns.is_empty());
        assert!(!config.follow_file_symlinks);
    }

    #[test]
    fn toml_round_trips_all_fields() {
        let config = ServiceConfig::from_toml_str(
            r#"
            root = "/srv/tree"
            ignore_patterns = [".git/**", "**/*.swp"]
            follow_file_symlinks = true
            "#,
        )
        .unwrap();
        assert_eq!(config.ignore_patterns, [".git/**", "**/*.swp"]);
        assert!(config.follow_file_symlinks);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            ServiceConfig::from_toml_str("root = ["),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_root_fails_validation() {
        let config = ServiceConfig::new("/no/such/root/anywhere");
        assert!(matches!(
            config.build_walker(),
            Err(ConfigError::InvalidRoot { .. })
        ));
    }

    #[test]
    fn malformed_ignore_pattern_fails_validation() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let config = ServiceConfig::new(root).ignore_patterns(vec!["[broken".to_string()]);
        assert!(matches!(
            config.build_walker(),
            Err(ConfigError::IgnorePattern(_))
        ));
    }
}
