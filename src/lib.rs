// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pull component repositories into a work root and pin them to versions.
//!
//! Each [`Component`] is a repository fetched from a single remote and checked
//! out at a requested branch, tag, or commit. The [`ComponentStore`] does the
//! same for every component listed by a [`ComponentManifest`].

pub mod component;
pub mod config;
pub mod path;
pub mod store;

pub use component::{
    component_parameters_key,
    remote::derive_push_url,
    repo::{HeadState, RepositoryHandle},
    resolve::{resolve, RemoteRef, Resolution},
    Component, ComponentError, ComponentOptions, RefError,
};
pub use config::{ComponentEntry, ComponentManifest, ConfigError};
pub use store::{ComponentStatus, ComponentStore, StoreError, SyncOutcome};
