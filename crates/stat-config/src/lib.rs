//! STAT tool attributes
//!
//! Settings the hosting environment supplies to every project: where the
//! dummy interface headers live and which suffix marks a header file. They
//! are stored in `.stat/attributes.toml` under the tool root.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const STAT_DIR: &str = ".stat";
const ATTRIBUTES_FILE: &str = "attributes.toml";

/// Directory holding the stand-in copies of dummy interface headers.
pub const DUMMIES_DIRECTORY: &str = "dummies";
pub const HEADER_SUFFIX: &str = ".h";

/// Tool-wide attributes supplied by the hosting environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatAttributes {
    #[serde(default = "default_dummies_directory")]
    pub dummies_directory: String,
    #[serde(default = "default_header_suffix")]
    pub header_suffix: String,
}

impl Default for StatAttributes {
    fn default() -> Self {
        Self {
            dummies_directory: default_dummies_directory(),
            header_suffix: default_header_suffix(),
        }
    }
}

impl StatAttributes {
    pub fn load(root: impl AsRef<Path>) -> Result<Self, StatConfigError> {
        let path = attributes_path(root);
        let contents = fs::read_to_string(&path)?;
        let mut attributes: Self = toml::from_str(&contents)?;
        attributes.normalize();
        Ok(attributes)
    }

    pub fn load_or_default(root: impl AsRef<Path>) -> Result<Self, StatConfigError> {
        match Self::load(root) {
            Ok(attributes) => Ok(attributes),
            Err(StatConfigError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(err) => Err(err),
        }
    }

    pub fn save(&self, root: impl AsRef<Path>) -> Result<(), StatConfigError> {
        let path = attributes_path(&root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        Ok(())
    }

    pub fn with_dummies_directory(mut self, directory: impl Into<String>) -> Self {
        self.dummies_directory = directory.into();
        self.normalize();
        self
    }

    /// Whether `name` carries the configured header suffix.
    pub fn is_header(&self, name: &str) -> bool {
        name.ends_with(self.header_suffix.as_str())
    }

    fn normalize(&mut self) {
        self.dummies_directory = self.dummies_directory.trim().replace('\\', "/");
        if self.dummies_directory.is_empty() {
            self.dummies_directory = default_dummies_directory();
        }
        self.header_suffix = self.header_suffix.trim().to_string();
        if self.header_suffix.is_empty() {
            self.header_suffix = default_header_suffix();
        }
    }
}

#[derive(Debug, Error)]
pub enum StatConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to parse STAT attributes: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize STAT attributes: {0}")]
    Serialize(#[from] toml::ser::Error),
}

fn default_dummies_directory() -> String {
    DUMMIES_DIRECTORY.to_string()
}

fn default_header_suffix() -> String {
    HEADER_SUFFIX.to_string()
}

fn attributes_path(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(STAT_DIR).join(ATTRIBUTES_FILE)
}

impl fmt::Display for StatAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StatAttributes(dummies={:?}, suffix={:?})",
            self.dummies_directory, self.header_suffix
        )
    }
}
