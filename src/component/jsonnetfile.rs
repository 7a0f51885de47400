// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Jsonnetfile rendering.
//!
//! Components may ship a `jsonnetfile.jsonnet` template instead of a plain
//! `jsonnetfile.json`. The template is evaluated by an external collaborator
//! and its output is written verbatim next to it.

use crate::config::JsonnetfileParameters;

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::Command,
};

/// Template evaluation collaborator.
pub trait Evaluate {
    /// Evaluate template file with external string variables.
    ///
    /// Returns the raw output, which need not be valid UTF-8.
    fn evaluate_file(&self, path: &Path, ext_vars: &JsonnetfileParameters) -> Result<Vec<u8>>;
}

/// Evaluate templates through the `jsonnet` binary.
#[derive(Debug, Clone)]
pub struct JsonnetBinary {
    program: OsString,
}

impl JsonnetBinary {
    /// Construct new evaluator around target program.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for JsonnetBinary {
    fn default() -> Self {
        Self::new("jsonnet")
    }
}

impl Evaluate for JsonnetBinary {
    fn evaluate_file(&self, path: &Path, ext_vars: &JsonnetfileParameters) -> Result<Vec<u8>> {
        let mut args: Vec<OsString> = Vec::new();
        for (key, value) in ext_vars {
            args.push("--ext-str".into());
            args.push(format!("{key}={value}").into());
        }
        args.push(path.as_os_str().to_owned());

        syscall_non_interactive(&self.program, args)
    }
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<Vec<u8>> {
    let output = Command::new(cmd.as_ref())
        .args(args)
        .output()
        .map_err(|source| EvalError::Spawn {
            source,
            program: cmd.as_ref().to_os_string(),
        })?;

    if !output.status.success() {
        return Err(EvalError::Failed {
            program: cmd.as_ref().to_os_string(),
            stderr: String::from_utf8_lossy(output.stderr.as_slice()).into_owned(),
        });
    }

    // INVARIANT: Keep stdout verbatim, it is written out as is.
    Ok(output.stdout)
}

/// Template evaluation error types.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Evaluator program could not be started.
    #[error("failed to run {program:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        program: OsString,
    },

    /// Evaluator program exited unsuccessfully.
    #[error("{program:?} failed:\n{stderr}")]
    Failed { program: OsString, stderr: String },
}

/// Friendly result alias :3
pub type Result<T, E = EvalError> = std::result::Result<T, E>;
