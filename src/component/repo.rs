// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Component repository handle.
//!
//! Owns the libgit2 repository behind a component's directory, and the single
//! remote it gets fetched from.

use crate::component::{
    remote::REMOTE_NAME,
    resolve::RemoteRef,
    ComponentError, Result,
};

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    AutotagOption, BranchType, Config, ErrorCode, FetchOptions, FetchPrune, Oid, RemoteCallbacks,
    Repository,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    path::{Path, PathBuf},
    time,
};
use tracing::{debug, info, instrument};

/// Where the head of a component repository currently points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
    /// Head is a symbolic reference to a local branch.
    Branch { name: String, target: Oid },

    /// Head points directly at a commit.
    Detached(Oid),

    /// Nothing has been checked out yet.
    Unborn,
}

/// Handle to the repository of a component.
///
/// The path is fixed once opened. At most one remote, [`REMOTE_NAME`], is ever
/// configured through the handle.
pub struct RepositoryHandle {
    path: PathBuf,
    repository: Repository,
    bar: Option<ProgressBar>,
}

impl std::fmt::Debug for RepositoryHandle {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("RepositoryHandle")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RepositoryHandle {
    /// Open or initialize repository at target path.
    ///
    /// A fresh empty repository is initialized when `force_init` is set or
    /// nothing exists at the path yet. Otherwise the existing repository is
    /// opened as is.
    ///
    /// # Errors
    ///
    /// - Return [`ComponentError::Repository`] if the path exists but is not
    ///   a valid repository, or a repository cannot be initialized there.
    /// - Return [`ComponentError::Io`] if the directory cannot be created.
    #[instrument(skip(path), level = "debug")]
    pub fn open(path: impl AsRef<Path>, force_init: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let repository = if force_init || !path.exists() {
            info!("initialize new repository: {:?}", path.display());
            mkdirp::mkdirp(&path)?;
            Repository::init(&path)
        } else {
            debug!("open repository: {:?}", path.display());
            Repository::open(&path)
        }
        .map_err(|source| ComponentError::Repository {
            source,
            path: path.clone(),
        })?;

        Ok(Self {
            path,
            repository,
            bar: None,
        })
    }

    /// Report fetch progress and prompt for credentials through progress bar.
    pub fn set_progress(&mut self, bar: ProgressBar) {
        self.bar = Some(bar);
    }

    /// Path of the repository working tree.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Underlying libgit2 repository.
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Set fetch URL of remote.
    ///
    /// Creates the remote if it does not exist yet, otherwise updates it in
    /// place.
    ///
    /// # Errors
    ///
    /// - Return [`ComponentError::Git2`] if remote configuration fails.
    #[instrument(skip(self, url), level = "debug")]
    pub fn set_fetch_url(&self, url: impl AsRef<str>) -> Result<()> {
        let url = url.as_ref();
        match self.repository.find_remote(REMOTE_NAME) {
            Ok(_) => {
                debug!("update fetch url of {REMOTE_NAME} to {url}");
                self.repository.remote_set_url(REMOTE_NAME, url)?;
            }
            Err(error) if error.code() == ErrorCode::NotFound => {
                debug!("create remote {REMOTE_NAME} with fetch url {url}");
                self.repository.remote(REMOTE_NAME, url)?;
            }
            Err(error) => return Err(error.into()),
        }

        Ok(())
    }

    /// Set push URL of remote independently of its fetch URL.
    ///
    /// # Errors
    ///
    /// - Return [`ComponentError::Git2`] if remote configuration fails.
    pub fn set_push_url(&self, url: impl AsRef<str>) -> Result<()> {
        debug!("set push url of {REMOTE_NAME} to {}", url.as_ref());
        Ok(self
            .repository
            .remote_set_pushurl(REMOTE_NAME, Some(url.as_ref()))?)
    }

    /// Fetch URL of remote, if remote exists.
    pub fn fetch_url(&self) -> Option<String> {
        self.repository
            .find_remote(REMOTE_NAME)
            .ok()
            .and_then(|remote| remote.url().map(ToString::to_string))
    }

    /// Push URL of remote, if one was set.
    pub fn push_url(&self) -> Option<String> {
        self.repository
            .find_remote(REMOTE_NAME)
            .ok()
            .and_then(|remote| remote.pushurl().map(ToString::to_string))
    }

    /// Fetch remote and list its branches.
    ///
    /// Fetches every branch and tag of the remote, pruning remote-tracking
    /// branches that vanished upstream. Returns the remote-tracking branches
    /// with the commits they point at. Nothing is retried here.
    ///
    /// # Errors
    ///
    /// - Return [`ComponentError::Network`] if the remote cannot be reached
    ///   or fetched from.
    /// - Return [`ComponentError::Git2`] if the remote is not configured or
    ///   references cannot be read back.
    #[instrument(skip(self), level = "debug")]
    pub fn fetch_remote_branches(&self) -> Result<Vec<RemoteRef>> {
        let mut remote = self.repository.find_remote(REMOTE_NAME)?;
        let url = remote.url().unwrap_or_default().to_string();
        info!("fetch {url}");

        let authenticator = match &self.bar {
            Some(bar) => {
                GitAuthenticator::default().set_prompter(IndicatifPrompter::new(bar.clone()))
            }
            None => GitAuthenticator::default(),
        };
        let config = Config::open_default()?;

        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        if let Some(bar) = &self.bar {
            let style = ProgressStyle::with_template(
                "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
            )?
            .progress_chars("-Cco.");
            bar.set_style(style);
            bar.set_message(url.clone());
            bar.enable_steady_tick(time::Duration::from_millis(100));

            let mut throttle = time::Instant::now();
            rc.transfer_progress(move |progress| {
                if throttle.elapsed() > time::Duration::from_millis(10) {
                    throttle = time::Instant::now();
                    bar.set_length(progress.total_objects() as u64);
                    bar.set_position(progress.received_objects() as u64);
                }
                true
            });
        }

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        fo.prune(FetchPrune::On);
        fo.download_tags(AutotagOption::All);
        remote
            .fetch(&[] as &[&str], Some(&mut fo), None)
            .map_err(|source| ComponentError::Network {
                source,
                url: url.clone(),
            })?;

        let mut refs = Vec::new();
        for branch in self.repository.branches(Some(BranchType::Remote))? {
            let (branch, _) = branch?;
            let reference = branch.get();

            // INVARIANT: Skip symbolic remote HEAD, it is not a branch.
            if reference.symbolic_target().is_some() {
                continue;
            }

            let Some(name) = reference.shorthand() else {
                continue;
            };
            let target = reference.peel_to_commit()?.id();
            refs.push(RemoteRef::new(name, target));
        }
        debug!("fetched {} remote branches", refs.len());

        Ok(refs)
    }

    /// Determine where head currently points.
    ///
    /// # Errors
    ///
    /// - Return [`ComponentError::Git2`] if head cannot be read.
    pub fn head_state(&self) -> Result<HeadState> {
        let head = match self.repository.head() {
            Ok(head) => head,
            Err(error) if error.code() == ErrorCode::UnbornBranch => return Ok(HeadState::Unborn),
            Err(error) => return Err(error.into()),
        };
        let target = head.peel_to_commit()?.id();

        if self.repository.head_detached()? {
            return Ok(HeadState::Detached(target));
        }

        Ok(HeadState::Branch {
            name: head.shorthand().unwrap_or_default().to_string(),
            target,
        })
    }
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}
