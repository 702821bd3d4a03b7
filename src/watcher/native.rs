// SPDX-FileCopyrightText: 2026 the Aviron contributors
// SPDX-License-Identifier: Apache-2.0

//! Native tree watcher on the kernel's inotify API.
//!
//! Watches one or more root directories. With `recursive` set, the existing
//! tree is walked once at start and every directory found is registered;
//! directories created later are registered as soon as their CREATE event
//! arrives. Deleted directories are deregistered silently. When the kernel
//! signals event loss, an overflow marker with no path is forwarded.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::{FutureExt, StreamExt};
use inotify::{EventMask, Inotify, WatchDescriptor, WatchMask, Watches};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::{FileWatchEvent, FileWatchEventType, FileWatcher, PathKind, WatchHandler};
use crate::error::WatchError;

const INOTIFY_BUFFER_SIZE: usize = 4096;

fn watch_mask() -> WatchMask {
    WatchMask::CREATE
        | WatchMask::CLOSE_WRITE
        | WatchMask::DELETE
        | WatchMask::MOVED_FROM
        | WatchMask::MOVED_TO
        | WatchMask::DELETE_SELF
}

/// Kernel-backed recursive directory watcher.
pub struct NativeWatcher {
    main_dir: PathBuf,
    recursive: bool,
    roots: Vec<PathBuf>,
    handler: Arc<dyn WatchHandler>,
    registered: Arc<Mutex<BTreeSet<PathBuf>>>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl NativeWatcher {
    /// Create a watcher for `main_dir`. With `recursive`, all current and
    /// future subdirectories are watched too.
    pub fn new(
        main_dir: &Path,
        recursive: bool,
        handler: Arc<dyn WatchHandler>,
    ) -> Result<Self, WatchError> {
        ensure_directory(main_dir)?;
        Ok(Self {
            main_dir: main_dir.to_path_buf(),
            recursive,
            roots: vec![main_dir.to_path_buf()],
            handler,
            registered: Arc::new(Mutex::new(BTreeSet::new())),
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }
}

fn ensure_directory(path: &Path) -> Result<(), WatchError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(WatchError::Config(format!(
            "'{}' is not a watchable directory",
            path.display()
        )))
    }
}

#[async_trait::async_trait]
impl FileWatcher for NativeWatcher {
    fn register(&mut self, path: &Path) -> Result<(), WatchError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(WatchError::Config(
                "directories must be registered before start".to_string(),
            ));
        }
        ensure_directory(path)?;
        self.roots.push(path.to_path_buf());
        Ok(())
    }

    async fn start(&mut self) -> Result<(), WatchError> {
        if self.cancel.is_cancelled() {
            return Err(WatchError::Config("watcher is closed".to_string()));
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let inotify = Inotify::init()
            .map_err(|e| WatchError::Backend(format!("inotify init failed: {e}")))?;
        let stream = inotify
            .into_event_stream(vec![0u8; INOTIFY_BUFFER_SIZE])
            .map_err(|e| WatchError::Backend(format!("inotify stream failed: {e}")))?;

        let mut watches = HashMap::new();
        let mut watches_handle = stream.watches();
        for root in &self.roots {
            if let Err(e) = add_tree(
                &mut watches_handle,
                root,
                self.recursive,
                &mut watches,
                &self.registered,
                self.handler.as_ref(),
            ) {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        }

        info!(
            "watching '{}' ({} directories, recursive={})",
            self.main_dir.display(),
            watches.len(),
            self.recursive
        );

        let loop_state = EventLoop {
            main_dir: self.main_dir.clone(),
            recursive: self.recursive,
            handler: Arc::clone(&self.handler),
            registered: Arc::clone(&self.registered),
            running: Arc::clone(&self.running),
            cancel: self.cancel.clone(),
        };
        self.tracker.spawn(loop_state.run(stream, watches));

        Ok(())
    }

    async fn close(&mut self) -> Result<(), WatchError> {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        Ok(())
    }

    fn registered_paths(&self) -> Vec<PathBuf> {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Register `root` (and with `recursive` its whole subtree) on the inotify
/// instance. A failure on `root` itself is fatal; failures deeper in the
/// tree become error notifications.
fn add_tree(
    watches_handle: &mut Watches,
    root: &Path,
    recursive: bool,
    watches: &mut HashMap<WatchDescriptor, PathBuf>,
    registered: &Arc<Mutex<BTreeSet<PathBuf>>>,
    handler: &dyn WatchHandler,
) -> Result<(), WatchError> {
    let mut stack = vec![root.to_path_buf()];
    let mut is_root = true;

    while let Some(dir) = stack.pop() {
        match watches_handle.add(&dir, watch_mask()) {
            Ok(wd) => {
                watches.insert(wd, dir.clone());
                registered
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(dir.clone());
                handler.on_registered(&dir);
            }
            Err(e) if is_root => {
                return Err(WatchError::Backend(format!(
                    "failed to watch '{}': {e}",
                    dir.display()
                )));
            }
            Err(e) => {
                warn!("failed to watch subdirectory '{}': {e}", dir.display());
                handler.on_error(Some(&dir), &e.to_string());
                continue;
            }
        }
        is_root = false;

        if !recursive {
            break;
        }
        if let Ok(entries) = fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                // Symlinked directories are not followed.
                if file_type.is_dir() {
                    stack.push(entry.path());
                }
            }
        }
    }

    Ok(())
}

struct EventLoop {
    main_dir: PathBuf,
    recursive: bool,
    handler: Arc<dyn WatchHandler>,
    registered: Arc<Mutex<BTreeSet<PathBuf>>>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
}

type NativeStream = inotify::EventStream<Vec<u8>>;

impl EventLoop {
    async fn run(self, mut stream: NativeStream, mut watches: HashMap<WatchDescriptor, PathBuf>) {
        let mut cause: Option<WatchError> = None;

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    // Drain whatever the kernel already queued, then stop.
                    while let Some(Some(Ok(event))) = stream.next().now_or_never() {
                        self.dispatch(&event, &mut stream, &mut watches);
                    }
                    break;
                }

                event = stream.next() => match event {
                    Some(Ok(event)) => self.dispatch(&event, &mut stream, &mut watches),
                    Some(Err(e)) => {
                        warn!("inotify read error: {e}");
                        self.handler.on_error(None, &e.to_string());
                    }
                    None => {
                        cause = Some(WatchError::Backend("inotify stream ended".to_string()));
                        break;
                    }
                },
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("watcher for '{}' terminated", self.main_dir.display());
        self.handler.on_terminated(&self.main_dir, cause.as_ref());
    }

    fn dispatch(
        &self,
        event: &inotify::Event<std::ffi::OsString>,
        stream: &mut NativeStream,
        watches: &mut HashMap<WatchDescriptor, PathBuf>,
    ) {
        let mask = event.mask;

        if mask.contains(EventMask::Q_OVERFLOW) {
            warn!("inotify queue overflow, events were lost");
            self.handler.on_event(FileWatchEvent::overflow());
            return;
        }

        // The kernel dropped the watch (directory deleted or unmounted):
        // deregister silently.
        if mask.contains(EventMask::IGNORED) {
            if let Some(dir) = watches.remove(&event.wd) {
                self.registered
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&dir);
                debug!("deregistered '{}'", dir.display());
            }
            return;
        }
        if mask.contains(EventMask::DELETE_SELF) {
            return;
        }

        let Some(dir) = watches.get(&event.wd) else {
            return;
        };
        let Some(name) = event.name.as_deref() else {
            return;
        };
        let path = dir.join(name);
        let is_dir = mask.contains(EventMask::ISDIR);
        let kind = if is_dir { PathKind::Dir } else { PathKind::File };

        if mask.contains(EventMask::CREATE) || mask.contains(EventMask::MOVED_TO) {
            if is_dir && self.recursive {
                let mut watches_handle = stream.watches();
                if let Err(e) = add_tree(
                    &mut watches_handle,
                    &path,
                    true,
                    watches,
                    &self.registered,
                    self.handler.as_ref(),
                ) {
                    warn!("failed to watch new directory '{}': {e}", path.display());
                    self.handler.on_error(Some(&path), &e.to_string());
                }
            }
            self.handler
                .on_event(FileWatchEvent::new(path, FileWatchEventType::Created, kind));
            return;
        }

        if mask.contains(EventMask::DELETE) || mask.contains(EventMask::MOVED_FROM) {
            self.handler
                .on_event(FileWatchEvent::new(path, FileWatchEventType::Deleted, kind));
            return;
        }

        if mask.contains(EventMask::CLOSE_WRITE) {
            self.handler.on_event(FileWatchEvent::new(
                path,
                FileWatchEventType::Modified,
                kind,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<FileWatchEvent>>,
        terminations: AtomicUsize,
    }

    impl WatchHandler for Recorder {
        fn on_event(&self, event: FileWatchEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn on_terminated(&self, _path: &Path, _cause: Option<&WatchError>) {
            self.terminations.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Recorder {
        fn snapshot(&self) -> Vec<FileWatchEvent> {
            self.events.lock().unwrap().clone()
        }

        async fn wait_for(&self, pred: impl Fn(&[FileWatchEvent]) -> bool) -> bool {
            for _ in 0..100 {
                if pred(&self.snapshot()) {
                    return true;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            false
        }
    }

    fn has(events: &[FileWatchEvent], path: &Path, event_type: FileWatchEventType) -> bool {
        events
            .iter()
            .any(|e| e.path.as_deref() == Some(path) && e.event_type == event_type)
    }

    #[tokio::test]
    async fn reports_create_modify_delete() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let mut watcher = NativeWatcher::new(dir.path(), true, recorder.clone()).unwrap();
        watcher.start().await.unwrap();

        let file = dir.path().join("t.data");
        std::fs::write(&file, b"payload").unwrap();
        assert!(
            recorder
                .wait_for(|events| {
                    has(events, &file, FileWatchEventType::Created)
                        && has(events, &file, FileWatchEventType::Modified)
                })
                .await
        );

        std::fs::remove_file(&file).unwrap();
        assert!(
            recorder
                .wait_for(|events| has(events, &file, FileWatchEventType::Deleted))
                .await
        );

        watcher.close().await.unwrap();
    }

    #[tokio::test]
    async fn new_subdirectories_are_registered_automatically() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let mut watcher = NativeWatcher::new(dir.path(), true, recorder.clone()).unwrap();
        watcher.start().await.unwrap();

        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        assert!(
            recorder
                .wait_for(|events| has(events, &sub, FileWatchEventType::Created))
                .await
        );

        // Give the new watch a moment, then events from inside must arrive.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let nested = sub.join("nested.data");
        std::fs::write(&nested, b"x").unwrap();
        assert!(
            recorder
                .wait_for(|events| has(events, &nested, FileWatchEventType::Modified))
                .await
        );
        assert!(watcher.registered_paths().contains(&sub));

        watcher.close().await.unwrap();
    }

    #[tokio::test]
    async fn existing_tree_is_walked_at_start() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("pre/existing");
        std::fs::create_dir_all(&sub).unwrap();

        let recorder = Arc::new(Recorder::default());
        let mut watcher = NativeWatcher::new(dir.path(), true, recorder.clone()).unwrap();
        watcher.start().await.unwrap();

        let registered = watcher.registered_paths();
        assert!(registered.contains(&dir.path().to_path_buf()));
        assert!(registered.contains(&sub));
        assert_eq!(registered.len(), 3);

        watcher.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_terminates_exactly_once() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let mut watcher = NativeWatcher::new(dir.path(), true, recorder.clone()).unwrap();
        watcher.start().await.unwrap();
        assert!(watcher.is_running());

        watcher.close().await.unwrap();
        watcher.close().await.unwrap();

        assert_eq!(recorder.terminations.load(Ordering::SeqCst), 1);
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let mut watcher = NativeWatcher::new(dir.path(), true, recorder.clone()).unwrap();
        watcher.start().await.unwrap();
        watcher.start().await.unwrap();

        watcher.close().await.unwrap();
        // One loop, one termination.
        assert_eq!(recorder.terminations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_directory_is_a_config_error() {
        let recorder = Arc::new(Recorder::default());
        let result = NativeWatcher::new(Path::new("/no/such/dir"), true, recorder);
        assert!(matches!(result, Err(WatchError::Config(_))));
    }
}
