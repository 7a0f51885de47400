// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version resolution.
//!
//! A requested version is just a string. It may name a branch on the remote,
//! or it may be a tag or commit expression that only the object database can
//! make sense of. Resolution decides which of the two cases applies _before_
//! any local state gets mutated.

use git2::Oid;

/// Remote-tracking branch as seen after a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// Shorthand name including remote prefix, e.g., `origin/main`.
    pub name: String,

    /// Commit the branch currently points at.
    pub target: Oid,
}

impl RemoteRef {
    /// Construct new remote reference.
    pub fn new(name: impl Into<String>, target: Oid) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }
}

/// Outcome of matching a requested version against remote branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Requested version names a tracked remote branch.
    Branch { name: String, target: Oid },

    /// No remote branch matched, so the version is treated as a commit-ish.
    Detached(String),
}

/// Resolve requested version against set of remote references.
///
/// Scans references in the order given. The remote prefix, e.g., `origin/`,
/// is stripped from each reference name, and the first bare name that equals
/// `version` wins. No prefix or fuzzy matching is performed. A version that
/// collides with both a branch name and a valid commit hash always resolves
/// to the branch.
pub fn resolve(version: &str, remote: &str, refs: &[RemoteRef]) -> Resolution {
    let prefix = format!("{remote}/");
    refs.iter()
        .find(|remote_ref| {
            let branch = remote_ref
                .name
                .strip_prefix(prefix.as_str())
                .unwrap_or(remote_ref.name.as_str());
            branch == version
        })
        .map(|remote_ref| Resolution::Branch {
            name: version.to_string(),
            target: remote_ref.target,
        })
        .unwrap_or_else(|| Resolution::Detached(version.to_string()))
}
