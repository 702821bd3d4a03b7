// SPDX-FileCopyrightText: 2026 the Aviron contributors
// SPDX-License-Identifier: Apache-2.0

//! Parsing of SCAN-family reply lines into a structured result.
//!
//! The daemon answers with one NUL-terminated ASCII line per scanned file:
//!
//! ```text
//! <path>: OK
//! <path>: <virus> FOUND
//! <path>: <errmsg> ERROR
//! ```
//!
//! An entry with an empty virus list is a clean file; an entry with names is
//! an infection; an `ERROR` entry is a per-file failure reported inside the
//! result rather than raised. A line outside this grammar is a fatal
//! [`ClamError::Protocol`].

use std::collections::BTreeMap;

use crate::error::ClamError;

/// Per-file outcome inside a [`ScanResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// The daemon reported `OK` for this path.
    Clean,
    /// Virus signature names reported for this path, in reply order.
    Infected(Vec<String>),
    /// The daemon could not scan this path.
    Error(String),
}

impl FileStatus {
    /// Virus names for this entry; empty when clean or errored.
    #[must_use]
    pub fn viruses(&self) -> &[String] {
        match self {
            Self::Infected(names) => names,
            Self::Clean | Self::Error(_) => &[],
        }
    }
}

/// Structured result of a SCAN, CONTSCAN, MULTISCAN or INSTREAM command.
///
/// Maps each server path to its [`FileStatus`], preserving the order the
/// daemon reported the paths in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    entries: Vec<(String, FileStatus)>,
}

impl ScanResult {
    /// Parse a raw daemon reply (one or more NUL-terminated lines).
    pub fn parse(reply: &str) -> Result<Self, ClamError> {
        let mut result = Self::default();

        for line in reply.split('\0') {
            let line = line.trim_matches(['\n', '\r', ' ']);
            if line.is_empty() {
                continue;
            }
            result.push_line(line)?;
        }

        if result.entries.is_empty() {
            return Err(ClamError::Protocol(format!(
                "no scan result line in reply: {reply:?}"
            )));
        }

        Ok(result)
    }

    fn push_line(&mut self, line: &str) -> Result<(), ClamError> {
        if let Some(path) = line.strip_suffix(": OK") {
            self.merge(path, FileStatus::Clean);
            return Ok(());
        }

        if let Some(head) = line.strip_suffix(" FOUND") {
            // The path itself may contain ": "; the virus name never does,
            // which makes the rightmost split the unambiguous one.
            let (path, virus) = head
                .rsplit_once(": ")
                .ok_or_else(|| ClamError::Protocol(format!("unparsable FOUND line: {line:?}")))?;
            self.merge(path, FileStatus::Infected(vec![virus.to_string()]));
            return Ok(());
        }

        if let Some(head) = line.strip_suffix(" ERROR") {
            let (path, message) = head
                .rsplit_once(": ")
                .ok_or_else(|| ClamError::Protocol(format!("unparsable ERROR line: {line:?}")))?;
            self.merge(path, FileStatus::Error(message.to_string()));
            return Ok(());
        }

        Err(ClamError::Protocol(format!(
            "scan reply line outside grammar: {line:?}"
        )))
    }

    fn merge(&mut self, path: &str, status: FileStatus) {
        let Some((_, existing)) = self.entries.iter_mut().find(|(p, _)| p == path) else {
            self.entries.push((path.to_string(), status));
            return;
        };

        // Repeat FOUND lines for one path extend its virus list; any other
        // repetition keeps the more severe status.
        match status {
            FileStatus::Infected(mut more) => {
                if let FileStatus::Infected(names) = existing {
                    names.append(&mut more);
                } else if matches!(existing, FileStatus::Clean) {
                    *existing = FileStatus::Infected(more);
                }
            }
            FileStatus::Error(message) => {
                if matches!(existing, FileStatus::Clean) {
                    *existing = FileStatus::Error(message);
                }
            }
            FileStatus::Clean => {}
        }
    }

    /// True when no entry carries a virus name.
    #[must_use]
    pub fn has_virus(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, s)| matches!(s, FileStatus::Infected(_)))
    }

    /// True when every entry is clean: no infections and no per-file errors.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.entries.iter().all(|(_, s)| *s == FileStatus::Clean)
    }

    /// True when the daemon reported a per-file error for any entry.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, s)| matches!(s, FileStatus::Error(_)))
    }

    /// All entries, in daemon reply order.
    #[must_use]
    pub fn entries(&self) -> &[(String, FileStatus)] {
        &self.entries
    }

    /// Status for one server path.
    #[must_use]
    pub fn status(&self, path: &str) -> Option<&FileStatus> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, s)| s)
    }

    /// Infected entries only: server path with its virus names.
    pub fn infections(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().filter_map(|(p, s)| match s {
            FileStatus::Infected(names) => Some((p.as_str(), names.as_slice())),
            FileStatus::Clean | FileStatus::Error(_) => None,
        })
    }

    /// All virus names keyed by server path.
    #[must_use]
    pub fn virus_map(&self) -> BTreeMap<String, Vec<String>> {
        self.infections()
            .map(|(p, names)| (p.to_string(), names.to_vec()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
