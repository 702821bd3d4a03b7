// SPDX-FileCopyrightText: 2026 the Aviron contributors
// SPDX-License-Identifier: Apache-2.0

//! Filesystem watching with two interchangeable backends.
//!
//! [`native::NativeWatcher`] polls the kernel's inotify API directly;
//! [`fswatch::FsWatchWatcher`] drives an external `fswatch` process. Both
//! present the same capability set through [`FileWatcher`] and deliver the
//! same event stream to a [`WatchHandler`]: created/modified/deleted file
//! events, an overflow marker when the backend lost events, plus
//! out-of-band registration, error and termination notifications.
//!
//! Neither backend coalesces: every raw event is forwarded. Deduplication
//! is the scan queue's job.

pub mod fswatch;
pub mod native;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::WatchError;

/// What happened to the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileWatchEventType {
    Created,
    Modified,
    Deleted,
    /// The backend lost events; detail is gone. Carries no path.
    Overflow,
}

/// Whether the event's path is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Dir,
}

/// One filesystem event as reported by a watcher backend.
#[derive(Debug, Clone)]
pub struct FileWatchEvent {
    /// The affected path; `None` only for [`FileWatchEventType::Overflow`].
    pub path: Option<PathBuf>,
    pub event_type: FileWatchEventType,
    pub kind: PathKind,
    pub timestamp: SystemTime,
}

impl FileWatchEvent {
    #[must_use]
    pub fn new(path: PathBuf, event_type: FileWatchEventType, kind: PathKind) -> Self {
        Self {
            path: Some(path),
            event_type,
            kind,
            timestamp: SystemTime::now(),
        }
    }

    /// Overflow marker: the kernel or subprocess dropped events.
    #[must_use]
    pub fn overflow() -> Self {
        Self {
            path: None,
            event_type: FileWatchEventType::Overflow,
            kind: PathKind::File,
            timestamp: SystemTime::now(),
        }
    }
}

/// Receiver for watcher events and lifecycle notifications.
///
/// All methods are called from the watcher's internal task. Implementations
/// must not block for long; heavy work belongs behind a queue.
pub trait WatchHandler: Send + Sync {
    /// A file or directory event, including overflow markers.
    fn on_event(&self, event: FileWatchEvent);

    /// A directory came under watch (initial walk or created later).
    fn on_registered(&self, _path: &Path) {}

    /// A backend failure that did not stop the watcher.
    fn on_error(&self, _path: Option<&Path>, _message: &str) {}

    /// The watcher stopped. Delivered exactly once per lifecycle, with the
    /// main directory and the failure that ended it, if any.
    fn on_terminated(&self, _path: &Path, _cause: Option<&WatchError>) {}
}

/// Capability set shared by the watcher backends.
///
/// `start` is idempotent; `close` stops the backend and triggers the single
/// termination notification. Registration of additional root directories
/// happens before `start`.
#[async_trait]
pub trait FileWatcher: Send {
    /// Add another root directory to watch. Only valid before `start`.
    fn register(&mut self, path: &Path) -> Result<(), WatchError>;

    /// Begin watching and spawn the internal event loop.
    async fn start(&mut self) -> Result<(), WatchError>;

    /// Stop watching. Safe to call more than once; the first call wins.
    async fn close(&mut self) -> Result<(), WatchError>;

    /// Directory paths currently under watch.
    fn registered_paths(&self) -> Vec<PathBuf>;

    /// Whether the event loop is live.
    fn is_running(&self) -> bool;
}
