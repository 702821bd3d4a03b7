// SPDX-FileCopyrightText: 2026 the Aviron contributors
// SPDX-License-Identifier: Apache-2.0

//! Path separator translation between the local host and the remote daemon.
//!
//! Paths in SCAN-family commands name files on the daemon's host. When the
//! daemon runs on a platform with a different separator convention, local
//! paths are rewritten before they go on the wire; the local path itself is
//! never mutated.

use serde::{Deserialize, Serialize};

/// Which separator character the remote daemon expects in paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileSeparator {
    /// Send paths exactly as given, no rewriting.
    Unchanged,
    /// Rewrite separators to `/`.
    Unix,
    /// Rewrite separators to `\`.
    Windows,
    /// Rewrite separators to this process's native separator.
    #[default]
    Native,
}

impl FileSeparator {
    const fn server_char(self) -> Option<char> {
        match self {
            Self::Unchanged => None,
            Self::Unix => Some('/'),
            Self::Windows => Some('\\'),
            Self::Native => Some(std::path::MAIN_SEPARATOR),
        }
    }

    /// Rewrite a local path into the flavor the daemon expects.
    #[must_use]
    pub fn to_server(self, local: &str) -> String {
        match self.server_char() {
            None => local.to_string(),
            Some(sep) => local
                .chars()
                .map(|c| if c == std::path::MAIN_SEPARATOR { sep } else { c })
                .collect(),
        }
    }

    /// Rewrite a daemon-flavored path back into the local convention.
    #[must_use]
    pub fn to_local(self, server: &str) -> String {
        match self.server_char() {
            None => server.to_string(),
            Some(sep) => server
                .chars()
                .map(|c| if c == sep { std::path::MAIN_SEPARATOR } else { c })
                .collect(),
        }
    }
}

impl std::fmt::Display for FileSeparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::Unix => write!(f, "unix"),
            Self::Windows => write!(f, "windows"),
            Self::Native => write!(f, "native"),
        }
    }
}

impl std::str::FromStr for FileSeparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unchanged" => Ok(Self::Unchanged),
            "unix" => Ok(Self::Unix),
            "windows" => Ok(Self::Windows),
            "native" => Ok(Self::Native),
            _ => Err(format!(
                "Invalid separator: {s}. Use: unchanged, unix, windows, native"
            )),
        }
    }
}
