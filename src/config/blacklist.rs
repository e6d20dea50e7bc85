//! Exclusion list loading.
//!
//! The exclusion list is a YAML document with optional `images` and
//! `instances` sequences of regular expressions:
//!
//! ```yaml
//! images:
//!   - "^base-.*"
//! instances:
//!   - "^bastion$"
//! ```

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading an exclusion list.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BlacklistError {
    /// Raised when the file cannot be read.
    #[error("failed to read exclusion list `{path}`: {message}")]
    Read {
        /// Path after tilde expansion.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the file is not a valid exclusion list.
    #[error("failed to parse exclusion list `{path}`: {message}")]
    Parse {
        /// Path after tilde expansion.
        path: String,
        /// Parser message.
        message: String,
    },
}

/// Name patterns that protect resources from deletion, per kind.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BlacklistFile {
    /// Image name patterns.
    #[serde(default)]
    pub images: Vec<String>,
    /// Instance name patterns.
    #[serde(default)]
    pub instances: Vec<String>,
}

impl BlacklistFile {
    /// Parses an exclusion list from YAML text. An empty document yields an
    /// empty list.
    ///
    /// # Errors
    ///
    /// Returns the `serde_yaml` message when the document is malformed.
    pub fn from_yaml(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|err| err.to_string())
    }

    /// Reads and parses the exclusion list at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BlacklistError`] when the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, BlacklistError> {
        let expanded = expand_tilde(path);
        let text = read_to_string_ambient(&expanded).map_err(|message| BlacklistError::Read {
            path: expanded.clone(),
            message,
        })?;
        Self::from_yaml(&text).map_err(|message| BlacklistError::Parse {
            path: expanded,
            message,
        })
    }
}

fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let path_buf = Utf8Path::new(path);
    let file_name = path_buf
        .file_name()
        .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
    let parent = match path_buf.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_name).map_err(|err| err.to_string())
}
