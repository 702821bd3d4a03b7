// SPDX-FileCopyrightText: 2026 the Aviron contributors
// SPDX-License-Identifier: Apache-2.0

//! Watcher backend driving an external `fswatch` process.
//!
//! Launches `fswatch` with recursive one-event-per-line output, reads its
//! stdout line by line and forwards typed events. Stderr activity becomes
//! error notifications. Process exit, normal or forced, yields exactly one
//! termination notification. Closing the watcher first nudges the child by
//! closing its stdin, then force-kills it after a short grace period.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::{FileWatchEvent, FileWatchEventType, FileWatcher, PathKind, WatchHandler};
use crate::error::WatchError;
use crate::util::Os;

/// Homebrew's default install location on macOS. Other platforms must
/// supply the binary path explicitly.
pub const DEFAULT_MACOS_BINARY: &str = "/opt/homebrew/bin/fswatch";

/// How long a closing watcher waits for `fswatch` to exit on its own before
/// force-killing it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Watcher backend on an external `fswatch` subprocess.
pub struct FsWatchWatcher {
    main_dir: PathBuf,
    binary: PathBuf,
    monitor: Option<String>,
    roots: Vec<PathBuf>,
    handler: Arc<dyn WatchHandler>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl FsWatchWatcher {
    /// Create a watcher for `main_dir`.
    ///
    /// `binary` is the absolute path of the `fswatch` executable; on macOS
    /// it defaults to [`DEFAULT_MACOS_BINARY`] when absent. `monitor` names
    /// the fswatch monitor backend, or `None` for the platform default.
    pub fn new(
        main_dir: &Path,
        binary: Option<PathBuf>,
        monitor: Option<String>,
        handler: Arc<dyn WatchHandler>,
    ) -> Result<Self, WatchError> {
        if !main_dir.is_dir() {
            return Err(WatchError::Config(format!(
                "'{}' is not a watchable directory",
                main_dir.display()
            )));
        }

        let binary = binary
            .or_else(|| {
                (Os::current() == Os::MacOs).then(|| PathBuf::from(DEFAULT_MACOS_BINARY))
            })
            .ok_or_else(|| {
                WatchError::Config(
                    "fswatch binary path must be supplied on this platform".to_string(),
                )
            })?;

        Ok(Self {
            main_dir: main_dir.to_path_buf(),
            binary,
            monitor,
            roots: vec![main_dir.to_path_buf()],
            handler,
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }
}

#[async_trait::async_trait]
impl FileWatcher for FsWatchWatcher {
    fn register(&mut self, path: &Path) -> Result<(), WatchError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(WatchError::Config(
                "directories must be registered before start".to_string(),
            ));
        }
        if !path.is_dir() {
            return Err(WatchError::Config(format!(
                "'{}' is not a watchable directory",
                path.display()
            )));
        }
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

        let mut command = Command::new(&self.binary);
        command.arg("-r").arg("-x");
        if let Some(monitor) = &self.monitor {
            command.arg("-m").arg(monitor);
        }
        command
            .args(&self.roots)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            self.running.store(false, Ordering::SeqCst);
            WatchError::Process(format!(
                "failed to launch '{}': {e}",
                self.binary.display()
            ))
        })?;

        let stdin = child.stdin.take();
        let Some(stdout) = child.stdout.take() else {
            self.running.store(false, Ordering::SeqCst);
            return Err(WatchError::Process(
                "fswatch spawned without a stdout pipe".to_string(),
            ));
        };
        let stderr = child.stderr.take();

        info!(
            "fswatch '{}' watching {} roots under '{}'",
            self.binary.display(),
            self.roots.len(),
            self.main_dir.display()
        );
        for root in &self.roots {
            self.handler.on_registered(root);
        }

        if let Some(stderr) = stderr {
            let handler = Arc::clone(&self.handler);
            let main_dir = self.main_dir.clone();
            let cancel = self.cancel.clone();
            self.tracker.spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                loop {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        line = lines.next_line() => match line {
                            Ok(Some(line)) => {
                                warn!("fswatch stderr: {line}");
                                handler.on_error(Some(&main_dir), &line);
                            }
                            Ok(None) | Err(_) => break,
                        },
                    }
                }
            });
        }

        let loop_state = ProcessLoop {
            main_dir: self.main_dir.clone(),
            handler: Arc::clone(&self.handler),
            running: Arc::clone(&self.running),
            cancel: self.cancel.clone(),
        };
        self.tracker.spawn(loop_state.run(child, stdin, stdout));

        Ok(())
    }

    async fn close(&mut self) -> Result<(), WatchError> {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        Ok(())
    }

    fn registered_paths(&self) -> Vec<PathBuf> {
        self.roots.clone()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

struct ProcessLoop {
    main_dir: PathBuf,
    handler: Arc<dyn WatchHandler>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl ProcessLoop {
    async fn run(
        self,
        mut child: Child,
        stdin: Option<ChildStdin>,
        stdout: tokio::process::ChildStdout,
    ) {
        let mut lines = BufReader::new(stdout).lines();
        let mut stdin = stdin;
        let mut cause: Option<WatchError> = None;
        let mut closed = false;

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    closed = true;
                    shutdown_child(&mut child, stdin.take()).await;
                    break;
                }

                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(event) = parse_event_line(&line) {
                            self.handler.on_event(event);
                        } else if !line.trim().is_empty() {
                            debug!("unparsable fswatch line: {line:?}");
                        }
                    }
                    Ok(None) => {
                        // Stdout closed: the process is gone or going.
                        let status = child.wait().await;
                        match status {
                            Ok(status) if status.success() => {}
                            Ok(status) => {
                                cause = Some(WatchError::Process(format!(
                                    "fswatch exited with {status}"
                                )));
                            }
                            Err(e) => {
                                cause = Some(WatchError::Process(format!(
                                    "failed to reap fswatch: {e}"
                                )));
                            }
                        }
                        break;
                    }
                    Err(e) => {
                        self.handler.on_error(Some(&self.main_dir), &e.to_string());
                        cause = Some(WatchError::Io(e));
                        shutdown_child(&mut child, stdin.take()).await;
                        break;
                    }
                },
            }
        }

        if closed {
            cause = None;
        }
        self.running.store(false, Ordering::SeqCst);
        info!("fswatch watcher for '{}' terminated", self.main_dir.display());
        self.handler.on_terminated(&self.main_dir, cause.as_ref());
    }
}

/// Stop the child: close stdin as the graceful nudge, give it a short grace
/// period, then force-kill.
async fn shutdown_child(child: &mut Child, stdin: Option<ChildStdin>) {
    drop(stdin);

    match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
        Ok(Ok(status)) => {
            debug!("fswatch exited with {status} during shutdown");
        }
        Ok(Err(e)) => {
            warn!("failed to reap fswatch during shutdown: {e}");
        }
        Err(_) => {
            warn!("fswatch ignored shutdown, force-killing");
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}

/// Parse one `fswatch -x` output line: `<path> <FLAG> [<FLAG>...]`.
///
/// Paths may contain spaces, so flags are peeled off the end while they are
/// known flag tokens; the remainder is the path.
fn parse_event_line(line: &str) -> Option<FileWatchEvent> {
    let line = line.trim_end();
    let mut path_end = line.len();
    let mut flags: Vec<&str> = Vec::new();

    loop {
        let Some(space) = line[..path_end].rfind(' ') else {
            break;
        };
        let token = &line[space + 1..path_end];
        if token.is_empty() || !is_flag_token(token) {
            break;
        }
        flags.push(token);
        path_end = space;
    }

    if flags.is_empty() {
        return None;
    }
    let path = line[..path_end].trim();
    if path.is_empty() {
        return None;
    }

    if flags.iter().any(|f| *f == "Overflow") {
        return Some(FileWatchEvent::overflow());
    }

    let kind = if flags.iter().any(|f| *f == "IsDir") {
        PathKind::Dir
    } else {
        PathKind::File
    };

    let path = PathBuf::from(path);
    let event_type = if flags.iter().any(|f| matches!(*f, "Removed" | "MovedFrom")) {
        FileWatchEventType::Deleted
    } else if flags.iter().any(|f| matches!(*f, "Created" | "MovedTo")) {
        FileWatchEventType::Created
    } else if flags.iter().any(|f| *f == "Renamed") {
        // A rename is a disappearance or an appearance depending on which
        // side of it this path is on.
        if path.exists() {
            FileWatchEventType::Created
        } else {
            FileWatchEventType::Deleted
        }
    } else if flags
        .iter()
        .any(|f| matches!(*f, "Updated" | "OwnerModified" | "AttributeModified"))
    {
        FileWatchEventType::Modified
    } else {
        return None;
    };

    Some(FileWatchEvent::new(path, event_type, kind))
}

fn is_flag_token(token: &str) -> bool {
    matches!(
        token,
        "NoOp"
            | "PlatformSpecific"
            | "Created"
            | "Updated"
            | "Removed"
            | "Renamed"
            | "OwnerModified"
            | "AttributeModified"
            | "MovedFrom"
            | "MovedTo"
            | "IsFile"
            | "IsDir"
            | "IsSymLink"
            | "Link"
            | "Overflow"
    )
}
