// SPDX-FileCopyrightText: 2026 the Aviron contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the client, the watchers and the quarantine store.
//!
//! Per-file scan failures reported by the daemon are not errors; they are
//! carried inside [`crate::response::ScanResult`] as `Error` entries.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by [`crate::client::ClamClient`] commands.
#[derive(Error, Debug)]
pub enum ClamError {
    /// Invalid build parameters, raised eagerly at construction.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Connect, read or write failure, including timeouts.
    #[error("network error talking to clamd")]
    Network(#[source] std::io::Error),

    /// The daemon reply did not match the expected grammar.
    #[error("malformed clamd reply: {0}")]
    Protocol(String),

    /// The command is not in the set advertised by `VERSIONCOMMANDS`.
    #[error("command '{0}' is not advertised by the daemon")]
    UnknownCommand(String),

    /// A quarantine action triggered by a scan result failed.
    #[error(transparent)]
    Quarantine(#[from] QuarantineError),
}

impl From<std::io::Error> for ClamError {
    fn from(err: std::io::Error) -> Self {
        Self::Network(err)
    }
}

/// Errors produced by the watcher backends.
#[derive(Error, Debug)]
pub enum WatchError {
    /// Invalid watcher parameters, raised eagerly at construction or start.
    #[error("invalid watcher configuration: {0}")]
    Config(String),

    /// Kernel watch registration or event delivery failure.
    #[error("watch backend error: {0}")]
    Backend(String),

    /// The external `fswatch` process could not be driven.
    #[error("fswatch process error: {0}")]
    Process(String),

    /// I/O failure in the event loop.
    #[error("watcher I/O error")]
    Io(#[from] std::io::Error),
}

/// Errors produced by the quarantine store.
#[derive(Error, Debug)]
pub enum QuarantineError {
    /// The quarantine directory is missing, not a directory or unwritable.
    #[error("quarantine directory {dir} is not usable: {reason}")]
    Directory {
        dir: PathBuf,
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// An I/O failure while copying, moving or removing an infected file.
    #[error("quarantine action failed for {path}")]
    Action {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl QuarantineError {
    pub(crate) fn directory(dir: &std::path::Path, reason: &str, source: Option<std::io::Error>) -> Self {
        Self::Directory {
            dir: dir.to_path_buf(),
            reason: reason.to_string(),
            source,
        }
    }

    pub(crate) fn action(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Action {
            path: path.to_path_buf(),
            source,
        }
    }
}
