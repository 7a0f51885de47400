// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Component domain representation.
//!
//! A __component__ is a named, independently versioned repository of
//! configuration and template sources that gets checked out into its own
//! directory, pinned to a requested version, and prepared for template
//! rendering further down the line.
//!
//! # Component Layout
//!
//! A component named `X` lives at `<work_root>/dependencies/X` unless an
//! explicit directory is given. Each component owns its directory outright.
//! Components never share a directory, so different components can be worked
//! on in parallel while a single component is only ever touched by one
//! operation at a time.
//!
//! Inside the directory, collaborators look for a handful of well-known files:
//!
//! - `class/<name>.yml` and `class/defaults.yml`.
//! - Everything under `lib/`.
//! - `postprocess/filters.yml`.
//! - `jsonnetfile.jsonnet` or `jsonnetfile.json`.
//!
//! # Versions
//!
//! The requested version is a branch name, tag, or commit expression, and
//! defaults to `master`. A checkout fetches the single remote `origin`,
//! resolves the version into a [`Resolution`], then applies it. See
//! [`checkout`] for how the repository gets mutated.

pub mod checkout;
pub mod jsonnetfile;
pub mod remote;
pub mod repo;
pub mod resolve;

use crate::{
    component::{
        jsonnetfile::Evaluate,
        remote::{derive_push_url, REMOTE_NAME},
        repo::RepositoryHandle,
        resolve::{resolve, Resolution},
    },
    config::{ConfigError, JsonnetfileParameters},
    path::component_dir,
};

use std::{
    fs::write,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Version components are pinned to unless told otherwise.
pub const DEFAULT_VERSION: &str = "master";

/// Options to construct a [`Component`] with.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ComponentOptions {
    /// Name of component.
    pub name: String,

    /// Root that the conventional component directory is derived from.
    pub work_root: Option<PathBuf>,

    /// Explicit directory, takes precedence over work root.
    pub directory: Option<PathBuf>,

    /// Remote URL to fetch from.
    pub repo_url: Option<String>,

    /// Version to pin to.
    pub version: Option<String>,

    /// Initialize a fresh repository even if one exists.
    pub force_init: bool,
}

impl ComponentOptions {
    /// Construct options for named component.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A component checkout.
#[derive(Debug)]
pub struct Component {
    name: String,
    directory: PathBuf,
    version: String,
    repo: RepositoryHandle,
}

impl Component {
    /// Construct new component.
    ///
    /// Opens the repository at the component directory, initializing it if
    /// needed, then applies repository URL and version if given.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::MissingDirectory`] if neither work root nor
    ///   directory was given.
    /// - Return [`ComponentError::Repository`] if repository cannot be opened
    ///   or initialized.
    /// - Return [`ComponentError::Io`] if directory cannot be made absolute.
    #[instrument(skip(options), fields(name = %options.name), level = "debug")]
    pub fn try_new(options: ComponentOptions) -> Result<Self> {
        let directory = match (options.directory, options.work_root) {
            (Some(directory), _) => directory,
            (None, Some(work_root)) => component_dir(work_root, &options.name),
            (None, None) => {
                return Err(ConfigError::MissingDirectory { name: options.name }.into());
            }
        };

        // INVARIANT: Always carry absolute path, never rely on current directory later.
        let directory = std::path::absolute(directory)?;
        let repo = RepositoryHandle::open(&directory, options.force_init)?;

        let mut component = Self {
            name: options.name,
            directory,
            version: DEFAULT_VERSION.into(),
            repo,
        };

        if let Some(url) = options.repo_url {
            component.set_repo_url(url)?;
        }

        if let Some(version) = options.version {
            component.set_version(version)?;
        }

        Ok(component)
    }

    /// Name of component.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Repository handle of component.
    pub fn repo(&self) -> &RepositoryHandle {
        &self.repo
    }

    /// Mutable repository handle of component.
    pub fn repo_mut(&mut self) -> &mut RepositoryHandle {
        &mut self.repo
    }

    /// Fetch URL of component repository.
    pub fn repo_url(&self) -> Option<String> {
        self.repo.fetch_url()
    }

    /// Set fetch URL of component repository.
    ///
    /// Also sets the push URL to a best effort SSH form of the fetch URL. Use
    /// [`Component::set_push_url`] afterwards to override it.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::EmptyUrl`] if URL is empty.
    /// - Return [`ComponentError::Git2`] if remote configuration fails.
    pub fn set_repo_url(&mut self, url: impl Into<String>) -> Result<()> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl {
                name: self.name.clone(),
            }
            .into());
        }

        self.repo.set_fetch_url(&url)?;
        self.repo.set_push_url(derive_push_url(&url))
    }

    /// Push URL of component repository.
    pub fn push_url(&self) -> Option<String> {
        self.repo.push_url()
    }

    /// Override push URL of component repository.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::EmptyUrl`] if URL is empty.
    /// - Return [`ComponentError::Git2`] if remote configuration fails.
    pub fn set_push_url(&mut self, url: impl AsRef<str>) -> Result<()> {
        if url.as_ref().trim().is_empty() {
            return Err(ConfigError::EmptyUrl {
                name: self.name.clone(),
            }
            .into());
        }

        self.repo.set_push_url(url)
    }

    /// Version component is pinned to.
    pub fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Pin component to version.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::EmptyVersion`] if version is empty.
    pub fn set_version(&mut self, version: impl Into<String>) -> Result<()> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(ConfigError::EmptyVersion {
                name: self.name.clone(),
            }
            .into());
        }

        self.version = version;
        Ok(())
    }

    /// Absolute directory of component.
    pub fn target_directory(&self) -> &Path {
        self.directory.as_path()
    }

    /// Class file of component.
    pub fn class_file(&self) -> PathBuf {
        self.directory
            .join("class")
            .join(format!("{}.yml", self.name))
    }

    /// Defaults file of component.
    pub fn defaults_file(&self) -> PathBuf {
        self.directory.join("class").join("defaults.yml")
    }

    /// List entries of library directory of component.
    ///
    /// Empty if the component has no library directory.
    ///
    /// # Errors
    ///
    /// - Return [`ComponentError::Glob`] if directory cannot be listed.
    pub fn lib_files(&self) -> Result<Vec<PathBuf>> {
        let lib_dir = self.directory.join("lib");
        if !lib_dir.is_dir() {
            return Ok(Vec::new());
        }

        let pattern = format!(
            "{}/*",
            glob::Pattern::escape(lib_dir.to_string_lossy().as_ref())
        );
        let mut files = glob::glob(&pattern)?.collect::<Result<Vec<_>, _>>()?;
        files.sort();

        Ok(files)
    }

    /// Postprocessing filters file of component.
    pub fn filters_file(&self) -> PathBuf {
        self.directory.join("postprocess").join("filters.yml")
    }

    /// Key of component in external parameter mappings.
    pub fn parameters_key(&self) -> String {
        component_parameters_key(&self.name)
    }

    /// Check out requested version.
    ///
    /// Fetches the remote, resolves the version against the remote branches,
    /// and applies the resolution to the repository.
    ///
    /// # Errors
    ///
    /// - Return [`RefError::Checkout`] if fetching fails or branch
    ///   manipulation fails.
    /// - Return [`RefError::NotFound`] if version names no branch and cannot
    ///   be resolved to a commit.
    /// - Return [`ComponentError::StaleWorkTree`] if head moved but the working
    ///   tree could not be reset.
    #[instrument(skip(self), fields(name = %self.name, version = %self.version), level = "debug")]
    pub fn checkout(&self) -> Result<Resolution> {
        let refs = self.repo.fetch_remote_branches().map_err(|error| match error {
            ComponentError::Network { source, .. } | ComponentError::Git2(source) => {
                RefError::Checkout {
                    version: self.version.clone(),
                    source,
                }
                .into()
            }
            error => error,
        })?;

        let resolution = resolve(&self.version, REMOTE_NAME, &refs);
        self.repo.apply(&resolution)?;
        info!("component {} checked out at {}", self.name, self.version);

        Ok(resolution)
    }

    /// Render `jsonnetfile.json` from `jsonnetfile.jsonnet`.
    ///
    /// Does nothing if the component has no `jsonnetfile.jsonnet`. The
    /// template wins over a `jsonnetfile.json` committed alongside it, which
    /// is only warned about. Returns whether rendering took place.
    ///
    /// # Errors
    ///
    /// - Return [`ComponentError::Render`] if evaluation fails.
    /// - Return [`ComponentError::Io`] if output cannot be written.
    #[instrument(skip(self, evaluator, parameters), fields(name = %self.name), level = "debug")]
    pub fn render_jsonnetfile_json(
        &self,
        evaluator: &impl Evaluate,
        parameters: &JsonnetfileParameters,
    ) -> Result<bool> {
        let jsonnetfile_jsonnet = self.directory.join("jsonnetfile.jsonnet");
        let jsonnetfile_json = self.directory.join("jsonnetfile.json");
        if !jsonnetfile_jsonnet.is_file() {
            return Ok(false);
        }

        if self.tracks_file("jsonnetfile.json") {
            warn!(
                "component {} repo contains both jsonnetfile.json and jsonnetfile.jsonnet, continuing with jsonnetfile.jsonnet",
                self.name
            );
        }

        let output = evaluator.evaluate_file(&jsonnetfile_jsonnet, parameters)?;
        write(&jsonnetfile_json, output)?;
        info!("rendered {:?}", jsonnetfile_json.display());

        Ok(true)
    }

    fn tracks_file(&self, name: &str) -> bool {
        self.repo
            .repository()
            .head()
            .and_then(|head| head.peel_to_tree())
            .map(|tree| tree.get_name(name).is_some())
            .unwrap_or(false)
    }
}

/// Normalize component name into its external parameter key.
///
/// Every `-` is replaced by `_`.
pub fn component_parameters_key(name: impl AsRef<str>) -> String {
    name.as_ref().replace('-', "_")
}

/// Failure to resolve or check out a requested version.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    /// Fetching or branch manipulation failed.
    #[error("Failed to checkout revision '{version}'")]
    Checkout {
        version: String,
        #[source]
        source: git2::Error,
    },

    /// Version does not name anything in the object database.
    #[error("Revision '{version}' not found in repository")]
    NotFound {
        version: String,
        #[source]
        source: git2::Error,
    },
}

/// All possible error types for component interaction.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// Repository at path is invalid or cannot be initialized.
    #[error("invalid repository at {:?}", path.display())]
    Repository {
        #[source]
        source: git2::Error,
        path: PathBuf,
    },

    /// Remote cannot be contacted.
    #[error("failed to fetch from {url:?}")]
    Network {
        #[source]
        source: git2::Error,
        url: String,
    },

    /// Version resolution or checkout fails.
    #[error(transparent)]
    Ref(#[from] RefError),

    /// Component configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Head was moved, but working tree could not be reset to match it.
    ///
    /// The checkout is inconsistent. Delete the directory and check out again.
    #[error("working tree at {:?} does not match head, delete it and check out again", path.display())]
    StaleWorkTree {
        #[source]
        source: git2::Error,
        path: PathBuf,
    },

    /// Jsonnetfile template evaluation fails.
    #[error(transparent)]
    Render(#[from] jsonnetfile::EvalError),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Library directory pattern is invalid.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Library directory cannot be listed.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),

    /// File system operations fail.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = ComponentError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;

    #[test_case("my-component", "my_component"; "single dash")]
    #[test_case("a-b-c", "a_b_c"; "many dashes")]
    #[test_case("plain", "plain"; "no dash")]
    #[test_case("under_score", "under_score"; "already normalized")]
    #[test]
    fn normalize_parameters_key(name: &str, expect: &str) {
        pretty_assertions::assert_eq!(component_parameters_key(name), expect);
    }

    #[test]
    fn require_work_root_or_directory() {
        let result = Component::try_new(ComponentOptions::new("orphan"));
        assert!(matches!(
            result,
            Err(ComponentError::Config(ConfigError::MissingDirectory { name })) if name == "orphan"
        ));
    }

    #[sealed_test]
    fn directory_from_work_root() -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let component = Component::try_new(ComponentOptions {
            work_root: Some("work".into()),
            ..ComponentOptions::new("my-component")
        })?;

        let expect = cwd.join("work").join("dependencies").join("my-component");
        assert_eq!(component.target_directory(), expect.as_path());
        assert!(component.target_directory().is_absolute());
        assert_eq!(component.class_file(), expect.join("class").join("my-component.yml"));
        assert_eq!(component.defaults_file(), expect.join("class").join("defaults.yml"));
        assert_eq!(
            component.filters_file(),
            expect.join("postprocess").join("filters.yml")
        );
        assert_eq!(component.parameters_key(), "my_component");
        assert_eq!(component.version(), DEFAULT_VERSION);

        Ok(())
    }

    #[sealed_test]
    fn directory_override_beats_work_root() -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let component = Component::try_new(ComponentOptions {
            work_root: Some("work".into()),
            directory: Some("elsewhere".into()),
            ..ComponentOptions::new("foo")
        })?;

        assert_eq!(component.target_directory(), cwd.join("elsewhere").as_path());

        Ok(())
    }

    #[sealed_test]
    fn repo_url_derives_push_url() -> anyhow::Result<()> {
        let mut component = Component::try_new(ComponentOptions {
            directory: Some("foo".into()),
            repo_url: Some("https://git.example.com/org/repo.git".into()),
            ..ComponentOptions::new("foo")
        })?;

        assert_eq!(
            component.repo_url().as_deref(),
            Some("https://git.example.com/org/repo.git")
        );
        assert_eq!(
            component.push_url().as_deref(),
            Some("ssh://git@git.example.com/org/repo.git")
        );

        component.set_repo_url("git@git.example.com:org/other.git")?;
        assert_eq!(
            component.repo_url().as_deref(),
            Some("git@git.example.com:org/other.git")
        );
        assert_eq!(
            component.push_url().as_deref(),
            Some("git@git.example.com:org/other.git")
        );
        assert_eq!(component.repo().repository().remotes()?.len(), 1);

        component.set_push_url("ssh://git@mirror.example.com/org/repo.git")?;
        assert_eq!(
            component.push_url().as_deref(),
            Some("ssh://git@mirror.example.com/org/repo.git")
        );
        assert_eq!(
            component.repo_url().as_deref(),
            Some("git@git.example.com:org/other.git")
        );

        Ok(())
    }

    #[sealed_test]
    fn reject_empty_url_and_version() -> anyhow::Result<()> {
        let mut component = Component::try_new(ComponentOptions {
            directory: Some("foo".into()),
            ..ComponentOptions::new("foo")
        })?;

        assert!(matches!(
            component.set_repo_url(""),
            Err(ComponentError::Config(ConfigError::EmptyUrl { .. }))
        ));
        assert!(matches!(
            component.set_version("  "),
            Err(ComponentError::Config(ConfigError::EmptyVersion { .. }))
        ));
        assert_eq!(component.version(), DEFAULT_VERSION);
        assert_eq!(component.repo_url(), None);

        Ok(())
    }

    #[sealed_test]
    fn reject_invalid_repository() -> anyhow::Result<()> {
        std::fs::create_dir("not-a-repo")?;
        let result = Component::try_new(ComponentOptions {
            directory: Some("not-a-repo".into()),
            ..ComponentOptions::new("foo")
        });
        assert!(matches!(result, Err(ComponentError::Repository { .. })));

        let component = Component::try_new(ComponentOptions {
            directory: Some("not-a-repo".into()),
            force_init: true,
            ..ComponentOptions::new("foo")
        })?;
        assert!(component.target_directory().join(".git").is_dir());

        Ok(())
    }

    #[sealed_test]
    fn list_lib_files() -> anyhow::Result<()> {
        let component = Component::try_new(ComponentOptions {
            directory: Some("foo".into()),
            ..ComponentOptions::new("foo")
        })?;
        assert!(component.lib_files()?.is_empty());

        let lib_dir = component.target_directory().join("lib");
        std::fs::create_dir(&lib_dir)?;
        std::fs::write(lib_dir.join("foo.libsonnet"), "{}")?;
        std::fs::write(lib_dir.join("bar.libjsonnet"), "{}")?;

        let expect = vec![lib_dir.join("bar.libjsonnet"), lib_dir.join("foo.libsonnet")];
        assert_eq!(component.lib_files()?, expect);

        Ok(())
    }
}
