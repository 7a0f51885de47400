// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Checkout engine.
//!
//! Bring a component repository to the exact state named by a [`Resolution`].
//!
//! # Mutation Order
//!
//! Every checkout is the same strict sequence:
//!
//! 1. Resolve the target commit. Nothing is touched if this fails.
//! 2. Move or create the local branch, and set its upstream (branch path
//!    only).
//! 3. Point head at the branch, or directly at the commit.
//! 4. Hard reset index and working tree to head, then remove every untracked
//!    or ignored file.
//!
//! The reset is the only step that touches the working tree, and the only
//! point at which a checkout counts as done. libgit2 offers no transaction
//! spanning references and the working tree. So if the process dies, or the
//! reset fails, after step 3 then head already names the new target while the
//! working tree is stale. That is reported as
//! [`ComponentError::StaleWorkTree`], and the only recovery is to delete the
//! directory and check out again.

use crate::component::{
    remote::REMOTE_NAME,
    repo::RepositoryHandle,
    resolve::Resolution,
    ComponentError, RefError, Result,
};

use git2::{build::CheckoutBuilder, BranchType, Commit, ErrorCode, ResetType};
use tracing::{debug, info, instrument};

impl RepositoryHandle {
    /// Apply resolution to repository.
    ///
    /// On the branch path a local branch of the same name is created or hard
    /// moved to the remote tip, set to track its remote-tracking branch, and
    /// head becomes a symbolic reference to it. On the detached path the
    /// version is parsed as a revision and head points at the commit directly.
    /// Either way, the index and working tree are then forced to match head,
    /// discarding local modifications and removing files absent from the
    /// target tree.
    ///
    /// # Errors
    ///
    /// - Return [`RefError::Checkout`] if branch manipulation fails before
    ///   head moved.
    /// - Return [`RefError::NotFound`] if a detached version cannot be
    ///   resolved to a commit.
    /// - Return [`ComponentError::StaleWorkTree`] if the final reset fails,
    ///   or branch manipulation fails after moving the branch head follows.
    /// - Return [`ComponentError::Git2`] if head cannot be detached.
    #[instrument(skip(self), level = "debug")]
    pub fn apply(&self, resolution: &Resolution) -> Result<()> {
        let commit = match resolution {
            Resolution::Branch { name, target } => self.checkout_branch(name, *target)?,
            Resolution::Detached(version) => self.checkout_detached(version)?,
        };

        self.reset_work_tree(&commit)
    }

    fn checkout_branch(&self, name: &str, target: git2::Oid) -> Result<Commit<'_>> {
        let repository = self.repository();
        let refname = format!("refs/heads/{name}");
        let upstream = format!("{REMOTE_NAME}/{name}");
        let failed = |source: git2::Error| -> ComponentError {
            RefError::Checkout {
                version: name.to_string(),
                source,
            }
            .into()
        };

        // INVARIANT: Moving the branch that head follows moves head too.
        let head_follows = repository
            .find_reference("HEAD")
            .map(|head| head.symbolic_target() == Some(refname.as_str()))
            .unwrap_or(false);
        let moved = |source: git2::Error| -> ComponentError {
            if head_follows {
                ComponentError::StaleWorkTree {
                    source,
                    path: self.path().to_path_buf(),
                }
            } else {
                failed(source)
            }
        };

        let commit = repository.find_commit(target).map_err(failed)?;
        match repository.find_branch(name, BranchType::Local) {
            Ok(mut branch) => {
                // INVARIANT: Track upstream before the tip moves.
                branch
                    .set_upstream(Some(upstream.as_str()))
                    .map_err(failed)?;
                debug!("move local branch {name} to {target}");
                branch
                    .get_mut()
                    .set_target(target, &format!("compdeps: move {name} to {target}"))
                    .map_err(failed)?;
            }
            Err(error) if error.code() == ErrorCode::NotFound => {
                debug!("create local branch {name} at {target}");
                let mut branch = repository.branch(name, &commit, false).map_err(failed)?;
                branch
                    .set_upstream(Some(upstream.as_str()))
                    .map_err(moved)?;
            }
            Err(error) => return Err(failed(error)),
        }

        repository.set_head(&refname).map_err(moved)?;
        info!("checkout branch {name} at {target}");

        Ok(commit)
    }

    fn checkout_detached(&self, version: &str) -> Result<Commit<'_>> {
        let repository = self.repository();
        let commit = repository
            .revparse_single(version)
            .and_then(|object| object.peel_to_commit())
            .map_err(|source| RefError::NotFound {
                version: version.to_string(),
                source,
            })?;

        repository.set_head_detached(commit.id())?;
        info!("checkout {version} as detached head at {}", commit.id());

        Ok(commit)
    }

    fn reset_work_tree(&self, commit: &Commit<'_>) -> Result<()> {
        let stale = |source: git2::Error| ComponentError::StaleWorkTree {
            source,
            path: self.path().to_path_buf(),
        };

        // INVARIANT: Hard reset ignores the strategy of a given checkout
        //   builder, so untracked and ignored files are removed by a second
        //   forced checkout of head.
        self.repository()
            .reset(commit.as_object(), ResetType::Hard, None)
            .map_err(stale)?;

        let mut builder = CheckoutBuilder::new();
        builder.force().remove_untracked(true).remove_ignored(true);
        self.repository()
            .checkout_head(Some(&mut builder))
            .map_err(stale)
    }
}
