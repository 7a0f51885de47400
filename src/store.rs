// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Component store management.
//!
//! The component store is everything a [`ComponentManifest`] lists, checked
//! out beneath the manifest's work root.
//!
//! # Synchronization
//!
//! Each component is synchronized by its own blocking worker. Workers share
//! nothing but the read-only manifest, and every component owns exactly one
//! directory. Two entries that would land in the same directory are rejected
//! before any worker starts. One component failing never stops the others,
//! every outcome is reported back in manifest order.

use crate::{
    component::{
        jsonnetfile::JsonnetBinary, repo::HeadState, repo::RepositoryHandle,
        resolve::Resolution, Component, ComponentError, ComponentOptions,
    },
    config::{ComponentEntry, ComponentManifest, ConfigError, JsonnetfileParameters},
    path::component_dir,
};

use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar};
use std::{
    collections::HashSet,
    fs::read_to_string,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, instrument};

/// Outcome of synchronizing a single component.
#[derive(Debug)]
pub struct SyncOutcome {
    /// Name of component.
    pub name: String,

    /// Resolution that was applied, or why synchronization failed.
    pub result: Result<Resolution, ComponentError>,
}

/// Current state of a single component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentStatus {
    /// Name of component.
    pub name: String,

    /// Directory of component.
    pub directory: PathBuf,

    /// Head of component repository, `None` if never checked out.
    pub head: Option<HeadState>,
}

/// Set of components listed by a manifest.
#[derive(Debug, Clone)]
pub struct ComponentStore {
    manifest: ComponentManifest,
}

impl ComponentStore {
    /// Open component store through manifest file.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::ReadManifest`] if manifest cannot be read.
    /// - Return [`StoreError::Config`] if manifest cannot be parsed.
    #[instrument(skip(path), level = "debug")]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        debug!("open manifest {:?}", path.as_ref().display());
        let data = read_to_string(path.as_ref()).map_err(|source| StoreError::ReadManifest {
            source,
            path: path.as_ref().to_path_buf(),
        })?;

        Ok(Self::new(data.parse()?))
    }

    /// Construct component store from already loaded manifest.
    pub fn new(manifest: ComponentManifest) -> Self {
        Self { manifest }
    }

    /// Manifest of component store.
    pub fn manifest(&self) -> &ComponentManifest {
        &self.manifest
    }

    /// Determine directory of component entry.
    pub fn directory_of(&self, entry: &ComponentEntry) -> PathBuf {
        entry
            .directory
            .clone()
            .unwrap_or_else(|| {
                component_dir(self.manifest.settings.work_root.as_path(), &entry.name)
            })
    }

    /// Build construction options of component entry.
    pub fn options_for(&self, entry: &ComponentEntry) -> ComponentOptions {
        ComponentOptions {
            name: entry.name.clone(),
            work_root: None,
            directory: Some(self.directory_of(entry)),
            repo_url: Some(entry.url.clone()),
            version: entry.version.clone(),
            force_init: entry.force_init,
        }
    }

    /// Synchronize every component of the store.
    ///
    /// Checks out each component at its requested version and renders its
    /// jsonnetfile, one blocking worker per component.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::DuplicateComponent`] if two entries share a
    ///   directory.
    /// - Return [`StoreError::ResolveDirectory`] if a directory cannot be
    ///   made absolute.
    /// - Return [`StoreError::CreateWorkRoot`] if the dependencies directory
    ///   cannot be created.
    /// - Return [`StoreError::Join`] if a worker panics.
    #[instrument(skip(self), level = "debug")]
    pub async fn sync_all(&self) -> Result<Vec<SyncOutcome>> {
        // INVARIANT: Compare absolute paths, `./foo` and `foo` are one directory.
        let mut seen = HashSet::new();
        for entry in &self.manifest.components {
            let directory = self.directory_of(entry);
            let directory = std::path::absolute(&directory).map_err(|source| {
                StoreError::ResolveDirectory {
                    source,
                    path: directory.clone(),
                }
            })?;
            if !seen.insert(directory) {
                return Err(StoreError::DuplicateComponent {
                    name: entry.name.clone(),
                });
            }
        }

        let dependencies = self.manifest.settings.work_root.as_path().join("dependencies");
        mkdirp::mkdirp(&dependencies).map_err(|source| StoreError::CreateWorkRoot {
            source,
            path: dependencies.clone(),
        })?;

        let multi = MultiProgress::new();
        let workers = self.manifest.components.iter().map(|entry| {
            let options = self.options_for(entry);
            let parameters = entry.jsonnetfile_parameters.clone().unwrap_or_default();
            let bar = multi.add(ProgressBar::no_length());
            tokio::task::spawn_blocking(move || {
                let result = sync_component(options, &parameters, bar.clone());
                bar.finish_and_clear();
                result
            })
        });

        let mut outcomes = Vec::new();
        for (entry, joined) in self.manifest.components.iter().zip(join_all(workers).await) {
            let result = joined?;
            match &result {
                Ok(_) => info!("synchronized component {}", entry.name),
                Err(error) => error!("failed to synchronize component {}: {error}", entry.name),
            }
            outcomes.push(SyncOutcome {
                name: entry.name.clone(),
                result,
            });
        }

        Ok(outcomes)
    }

    /// Report current state of every component of the store.
    ///
    /// Never initializes anything. Components whose directory does not exist
    /// yet are reported without a head.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Component`] if an existing directory is not a
    ///   valid repository.
    pub fn status(&self) -> Result<Vec<ComponentStatus>> {
        let mut statuses = Vec::new();
        for entry in &self.manifest.components {
            let directory = self.directory_of(entry);
            let head = if directory.exists() {
                Some(RepositoryHandle::open(&directory, false)?.head_state()?)
            } else {
                None
            };

            statuses.push(ComponentStatus {
                name: entry.name.clone(),
                directory,
                head,
            });
        }

        Ok(statuses)
    }
}

fn sync_component(
    options: ComponentOptions,
    parameters: &JsonnetfileParameters,
    bar: ProgressBar,
) -> Result<Resolution, ComponentError> {
    let mut component = Component::try_new(options)?;
    component.repo_mut().set_progress(bar);
    let resolution = component.checkout()?;
    component.render_jsonnetfile_json(&JsonnetBinary::default(), parameters)?;

    Ok(resolution)
}

/// All possible error types for component store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Manifest file cannot be read.
    #[error("failed to read manifest at {:?}", path.display())]
    ReadManifest {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Dependencies directory cannot be created.
    #[error("failed to create {:?}", path.display())]
    CreateWorkRoot {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Component directory cannot be made absolute.
    #[error("failed to resolve {:?}", path.display())]
    ResolveDirectory {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Two components would share one directory.
    #[error("component {name:?} shares its directory with another component")]
    DuplicateComponent { name: String },

    /// Manifest parsing fails.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Component operation fails.
    #[error(transparent)]
    Component(#[from] ComponentError),

    /// Component worker panics or gets cancelled.
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

/// Friendly result alias :3
type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ManifestSettings, WorkRoot};
    use pretty_assertions::assert_eq;

    fn entry(name: &str) -> ComponentEntry {
        ComponentEntry {
            name: name.into(),
            url: format!("https://git.example.com/org/{name}.git"),
            ..Default::default()
        }
    }

    fn store(components: Vec<ComponentEntry>) -> ComponentStore {
        ComponentStore::new(ComponentManifest {
            settings: ManifestSettings {
                work_root: WorkRoot::new("/srv/work"),
            },
            components,
        })
    }

    #[test]
    fn options_follow_directory_convention() {
        let store = store(vec![]);
        let result = store.options_for(&ComponentEntry {
            version: Some("v1.0.0".into()),
            ..entry("my-component")
        });
        let expect = ComponentOptions {
            name: "my-component".into(),
            work_root: None,
            directory: Some("/srv/work/dependencies/my-component".into()),
            repo_url: Some("https://git.example.com/org/my-component.git".into()),
            version: Some("v1.0.0".into()),
            force_init: false,
        };
        assert_eq!(result, expect);
    }

    #[test]
    fn options_keep_directory_override() {
        let store = store(vec![]);
        let result = store.options_for(&ComponentEntry {
            directory: Some("/opt/foo".into()),
            force_init: true,
            ..entry("foo")
        });
        assert_eq!(result.directory, Some(PathBuf::from("/opt/foo")));
        assert!(result.force_init);
    }

    #[tokio::test]
    async fn reject_components_sharing_directory() {
        let store = store(vec![
            entry("foo"),
            ComponentEntry {
                directory: Some("/srv/work/dependencies/foo".into()),
                ..entry("bar")
            },
        ]);

        let result = store.sync_all().await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateComponent { name }) if name == "bar"
        ));
    }

    #[tokio::test]
    async fn reject_relative_spelling_of_same_directory() {
        let store = ComponentStore::new(ComponentManifest {
            settings: ManifestSettings {
                work_root: WorkRoot::new("work"),
            },
            components: vec![
                entry("foo"),
                ComponentEntry {
                    directory: Some("./work/dependencies/foo".into()),
                    ..entry("bar")
                },
            ],
        });

        let result = store.sync_all().await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateComponent { name }) if name == "bar"
        ));
    }

    #[test]
    fn status_of_missing_checkout() -> anyhow::Result<()> {
        let store = store(vec![entry("never-synced")]);
        let result = store.status()?;
        let expect = vec![ComponentStatus {
            name: "never-synced".into(),
            directory: "/srv/work/dependencies/never-synced".into(),
            head: None,
        }];
        assert_eq!(result, expect);

        Ok(())
    }
}
