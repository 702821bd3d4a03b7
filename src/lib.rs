// SPDX-FileCopyrightText: 2026 the Aviron contributors
// SPDX-License-Identifier: Apache-2.0

//! Client library for the `ClamAV` scanning daemon with a real-time
//! filesystem scanning pipeline.
//!
//! Three cooperating parts:
//! - a connection-per-command TCP client for the clamd command set,
//!   including the streaming `INSTREAM` upload ([`client`], [`command`],
//!   [`response`])
//! - a real-time pipeline coupling a filesystem watcher to a bounded
//!   deduplicating scan queue drained against the daemon ([`realtime`],
//!   [`queue`])
//! - a two-backend watcher abstraction: native inotify tree watch or an
//!   external `fswatch` subprocess ([`watcher`])
//!
//! Infected files can be copied, moved or removed into a content-addressed
//! quarantine ([`quarantine`]).
//!
//! # Example
//!
//! ```no_run
//! use aviron::client::ClamClient;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), aviron::error::ClamError> {
//! let client = ClamClient::builder().hostname("localhost").build()?;
//! if client.ping()? {
//!     let result = client.scan(Path::new("/srv/files/report.pdf"))?;
//!     println!("infected: {}", result.has_virus());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::missing_errors_doc)]

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod path;
pub mod quarantine;
pub mod queue;
pub mod realtime;
pub mod response;
pub mod util;
pub mod watcher;

pub use client::{ClamClient, ClamClientBuilder, CommandRunDetails, DaemonCapabilities};
pub use config::ClientConfig;
pub use error::{ClamError, QuarantineError, WatchError};
pub use path::FileSeparator;
pub use quarantine::{QuarantineAction, QuarantineFile};
pub use queue::ScanQueue;
pub use realtime::{RealtimeScanEvent, RealtimeScanner};
pub use response::{FileStatus, ScanResult};
pub use watcher::{FileWatchEvent, FileWatchEventType, FileWatcher, PathKind, WatchHandler};
