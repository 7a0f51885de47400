// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the component manifest that lists every component
//! repository to pull into a work root. File I/O is left to the caller to
//! figure out.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// External string variables handed to the jsonnetfile template.
pub type JsonnetfileParameters = BTreeMap<String, String>;

/// Component manifest layout.
///
/// A __component manifest__ is a simple TOML file that names the work root to
/// check components out into, and lists each component along with the remote
/// it is fetched from and the version it should be pinned to.
///
/// # General Layout
///
/// ```toml
/// [settings]
/// work_root = "$HOME/work"
///
/// [[component]]
/// name = "my-component"
/// url = "https://git.example.com/org/my-component.git"
/// version = "v1.2.0"
///
/// [component.jsonnetfile_parameters]
/// flavor = "vanilla"
/// ```
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ComponentManifest {
    /// Settings shared by all components.
    pub settings: ManifestSettings,

    /// Listing of components to synchronize.
    #[serde(rename = "component", default)]
    pub components: Vec<ComponentEntry>,
}

impl FromStr for ComponentManifest {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut manifest: ComponentManifest =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on work root and directory overrides.
        manifest.settings.work_root = WorkRoot::new(expand(manifest.settings.work_root.as_path())?);
        for entry in manifest.components.iter_mut() {
            if let Some(directory) = entry.directory.take() {
                entry.directory = Some(expand(&directory)?);
            }
        }

        Ok(manifest)
    }
}

impl Display for ComponentManifest {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Manifest-wide settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ManifestSettings {
    /// Root directory that components are checked out beneath.
    pub work_root: WorkRoot,
}

/// Single component listing.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ComponentEntry {
    /// Name of the component.
    pub name: String,

    /// Remote URL to fetch the component from.
    pub url: String,

    /// Branch, tag, or commit to pin the component to.
    pub version: Option<String>,

    /// Explicit checkout directory instead of the work root convention.
    pub directory: Option<PathBuf>,

    /// Throw away whatever repository exists at the directory.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force_init: bool,

    /// External variables for jsonnetfile rendering.
    pub jsonnetfile_parameters: Option<JsonnetfileParameters>,
}

/// Path acting as the root of all component checkouts.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct WorkRoot(PathBuf);

impl WorkRoot {
    /// Construct new work root.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Treat work root as [`Path`] slice.
    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }
}

impl Display for WorkRoot {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_path().to_string_lossy().as_ref())
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Component has no place to live.
    #[error("either a work root or a directory must be provided for component {name:?}")]
    MissingDirectory { name: String },

    /// Component was handed an empty remote URL.
    #[error("component {name:?} cannot use an empty repository URL")]
    EmptyUrl { name: String },

    /// Component was handed an empty version.
    #[error("component {name:?} cannot use an empty version")]
    EmptyVersion { name: String },
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
