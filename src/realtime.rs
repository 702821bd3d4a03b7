// SPDX-FileCopyrightText: 2026 the Aviron contributors
// SPDX-License-Identifier: Apache-2.0

//! Real-time scanning pipeline: watcher → queue → daemon → listener.
//!
//! A [`RealtimeScanner`] wires a recursive [`NativeWatcher`] on the main
//! directory (plus any secondary directories) to a bounded dedup
//! [`ScanQueue`], and drains the queue from a single worker task that sends
//! SCAN commands to the daemon. Created/modified files are queued after the
//! optional approver predicate; deleted files are withdrawn from the queue
//! so a file that vanishes before its scan is never submitted.
//!
//! The worker survives daemon failures: a failed scan logs, backs off for
//! two seconds and continues as long as the scanner is running.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::client::ClamClient;
use crate::error::WatchError;
use crate::queue::{ScanQueue, DEFAULT_SIZE};
use crate::response::ScanResult;
use crate::watcher::native::NativeWatcher;
use crate::watcher::{FileWatchEvent, FileWatchEventType, FileWatcher, WatchHandler};

/// Maximum number of paths a worker drains per iteration.
pub const BATCH_SIZE: usize = 300;

/// Default idle sleep between drains, in seconds.
pub const DEFAULT_IDLE_SLEEP_SECS: u64 = 10;

const FAILURE_BACKOFF: Duration = Duration::from_secs(2);

static WORKER_SEQ: AtomicU64 = AtomicU64::new(0);

/// One completed real-time scan, delivered to the scan listener.
#[derive(Debug, Clone)]
pub struct RealtimeScanEvent {
    pub path: PathBuf,
    pub result: ScanResult,
}

/// Predicate deciding whether a watcher event should be queued for
/// scanning. Absent means everything is approved.
pub type ScanApprover = dyn Fn(&FileWatchEvent) -> bool + Send + Sync;

/// Callback invoked for every completed real-time scan.
pub type RealtimeScanListener = dyn Fn(&RealtimeScanEvent) + Send + Sync;

/// Builder for [`RealtimeScanner`].
pub struct RealtimeScannerBuilder {
    client: Arc<ClamClient>,
    main_dir: PathBuf,
    extra_dirs: Vec<PathBuf>,
    approver: Option<Arc<ScanApprover>>,
    listener: Option<Arc<RealtimeScanListener>>,
    idle_sleep_secs: u64,
    queue_size: usize,
}

impl RealtimeScannerBuilder {
    /// Watch an additional directory besides the main one.
    #[must_use]
    pub fn extra_dir(mut self, dir: &Path) -> Self {
        self.extra_dirs.push(dir.to_path_buf());
        self
    }

    /// Gate which watcher events get queued.
    #[must_use]
    pub fn approver(
        mut self,
        approver: impl Fn(&FileWatchEvent) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.approver = Some(Arc::new(approver));
        self
    }

    /// Observe every completed scan.
    #[must_use]
    pub fn listener(
        mut self,
        listener: impl Fn(&RealtimeScanEvent) + Send + Sync + 'static,
    ) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Idle sleep between drains, clamped to at least one second.
    #[must_use]
    pub fn idle_sleep_secs(mut self, secs: u64) -> Self {
        self.idle_sleep_secs = secs.max(1);
        self
    }

    /// Capacity of the pending-scan queue.
    #[must_use]
    pub fn queue_size(mut self, size: usize) -> Self {
        self.queue_size = size;
        self
    }

    pub fn build(self) -> Result<RealtimeScanner, WatchError> {
        if !self.main_dir.is_dir() {
            return Err(WatchError::Config(format!(
                "'{}' is not a watchable directory",
                self.main_dir.display()
            )));
        }
        Ok(RealtimeScanner {
            client: self.client,
            main_dir: self.main_dir,
            extra_dirs: self.extra_dirs,
            approver: self.approver,
            listener: self.listener,
            idle_sleep: Duration::from_secs(self.idle_sleep_secs.max(1)),
            queue_size: self.queue_size,
            running: Arc::new(AtomicBool::new(false)),
            state: None,
        })
    }
}

/// Live pipeline state between `start` and `stop`.
struct Running {
    watcher: NativeWatcher,
    queue: Arc<ScanQueue>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// Real-time scanner over a filestore directory tree.
pub struct RealtimeScanner {
    client: Arc<ClamClient>,
    main_dir: PathBuf,
    extra_dirs: Vec<PathBuf>,
    approver: Option<Arc<ScanApprover>>,
    listener: Option<Arc<RealtimeScanListener>>,
    idle_sleep: Duration,
    queue_size: usize,
    running: Arc<AtomicBool>,
    state: Option<Running>,
}

impl RealtimeScanner {
    /// Builder over `client` watching `main_dir` recursively.
    #[must_use]
    pub fn builder(client: Arc<ClamClient>, main_dir: &Path) -> RealtimeScannerBuilder {
        RealtimeScannerBuilder {
            client,
            main_dir: main_dir.to_path_buf(),
            extra_dirs: Vec::new(),
            approver: None,
            listener: None,
            idle_sleep_secs: DEFAULT_IDLE_SLEEP_SECS,
            queue_size: DEFAULT_SIZE,
        }
    }

    /// Start watching and scanning. Idempotent: a second call while running
    /// is a no-op.
    pub async fn start(&mut self) -> Result<(), WatchError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let queue = Arc::new(ScanQueue::new(self.queue_size));
        let feeder = Arc::new(QueueFeeder {
            queue: Arc::clone(&queue),
            approver: self.approver.clone(),
        });

        let mut watcher = match NativeWatcher::new(&self.main_dir, true, feeder) {
            Ok(watcher) => watcher,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        for dir in &self.extra_dirs {
            if let Err(e) = watcher.register(dir) {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        }
        if let Err(e) = watcher.start().await {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let worker = Worker {
            id: WORKER_SEQ.fetch_add(1, Ordering::SeqCst),
            client: Arc::clone(&self.client),
            queue: Arc::clone(&queue),
            listener: self.listener.clone(),
            idle_sleep: self.idle_sleep,
            cancel: cancel.clone(),
        };
        tracker.spawn(worker.run());

        self.state = Some(Running {
            watcher,
            queue,
            cancel,
            tracker,
        });
        info!(
            "real-time scanner started on '{}' (+{} secondary)",
            self.main_dir.display(),
            self.extra_dirs.len()
        );
        Ok(())
    }

    /// Stop the pipeline: close the watcher and let the worker exit at its
    /// next loop boundary. Idempotent.
    pub async fn stop(&mut self) -> Result<(), WatchError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };

        state.cancel.cancel();
        state.watcher.close().await?;
        state.tracker.close();
        state.tracker.wait().await;
        info!("real-time scanner on '{}' stopped", self.main_dir.display());
        Ok(())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of paths waiting for a scan.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.queue.len())
    }

    /// Overflow count of the pending queue since start.
    #[must_use]
    pub fn overflow_count(&self) -> u64 {
        self.state.as_ref().map_or(0, |s| s.queue.overflow_count())
    }

    /// Directories currently under watch.
    #[must_use]
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.state
            .as_ref()
            .map_or_else(Vec::new, |s| s.watcher.registered_paths())
    }
}

/// Watch handler feeding the pending queue.
struct QueueFeeder {
    queue: Arc<ScanQueue>,
    approver: Option<Arc<ScanApprover>>,
}

impl WatchHandler for QueueFeeder {
    fn on_event(&self, event: FileWatchEvent) {
        match event.event_type {
            FileWatchEventType::Created | FileWatchEventType::Modified => {
                let Some(path) = event.path.clone() else {
                    return;
                };
                // Directories are queued too; the worker's regular-file
                // check rejects them at drain time.
                let approved = self.approver.as_ref().is_none_or(|approve| approve(&event));
                if approved {
                    self.queue.push(path);
                }
            }
            FileWatchEventType::Deleted => {
                if let Some(path) = &event.path {
                    if self.queue.remove(path) {
                        debug!("withdrew deleted '{}' from scan queue", path.display());
                    }
                }
            }
            // The kernel already lost detail; nothing to queue.
            FileWatchEventType::Overflow => {
                debug!("watch overflow observed, continuing");
            }
        }
    }

    fn on_error(&self, path: Option<&Path>, message: &str) {
        warn!(
            "watcher error on {}: {message}",
            path.map_or_else(|| "<none>".to_string(), |p| p.display().to_string())
        );
    }
}

/// The single drain worker of one scanner.
struct Worker {
    id: u64,
    client: Arc<ClamClient>,
    queue: Arc<ScanQueue>,
    listener: Option<Arc<RealtimeScanListener>>,
    idle_sleep: Duration,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        info!("aviron-rtscan-{} started", self.id);

        while !self.cancel.is_cancelled() {
            let batch = self.queue.pop_batch(BATCH_SIZE);
            for path in &batch {
                if self.cancel.is_cancelled() {
                    break;
                }
                self.scan_one(path).await;
            }

            if self.queue.is_empty() {
                self.idle().await;
            }
        }

        info!("aviron-rtscan-{} stopped", self.id);
    }

    async fn scan_one(&self, path: &Path) {
        // Deleted-then-drained paths and directories fall out here.
        if !path.is_file() {
            return;
        }

        match self.client.scan(path) {
            Ok(result) => {
                debug!(
                    "aviron-rtscan-{}: scanned '{}' (virus={})",
                    self.id,
                    path.display(),
                    result.has_virus()
                );
                if let Some(listener) = &self.listener {
                    listener(&RealtimeScanEvent {
                        path: path.to_path_buf(),
                        result,
                    });
                }
            }
            Err(e) => {
                warn!(
                    "aviron-rtscan-{}: scan of '{}' failed: {e}",
                    self.id,
                    path.display()
                );
                // Back off instead of spinning on a fatal error.
                self.pause(FAILURE_BACKOFF).await;
            }
        }
    }

    /// Sleep up to the configured idle time in one-second slices, waking
    /// early on cancellation.
    async fn idle(&self) {
        let mut slept = Duration::ZERO;
        while slept < self.idle_sleep {
            if self.pause(Duration::from_secs(1)).await {
                return;
            }
            slept += Duration::from_secs(1);
        }
    }

    /// Returns true when woken by cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => true,
            () = tokio::time::sleep(duration) => false,
        }
    }
}
