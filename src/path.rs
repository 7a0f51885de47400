// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for component checkouts and the
//! manifest that lists them.

use std::path::{Path, PathBuf};

/// Determine directory of component by convention.
///
/// A component named `X` lives at `<work_root>/dependencies/X`. Does not check
/// if the path returned actually exists.
pub fn component_dir(work_root: impl AsRef<Path>, name: impl AsRef<str>) -> PathBuf {
    work_root.as_ref().join("dependencies").join(name.as_ref())
}

/// Determine default absolute path to work root.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/compdeps` as the default
/// absolute path for a work root. Does not check if the path returned
/// actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if data directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_work_root() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("compdeps"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to component manifest.
///
/// Uses `$XDG_CONFIG_HOME/compdeps/compdeps.toml`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if configuration directory path cannot be
///   determined.
pub fn default_manifest_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("compdeps").join("compdeps.toml"))
        .ok_or(NoWayHome)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn component_dir_uses_dependencies_segment() {
        let result = component_dir("/srv/work", "my-component");
        assert_eq!(result, PathBuf::from("/srv/work/dependencies/my-component"));
    }
}
