// SPDX-FileCopyrightText: 2026 the Aviron contributors
// SPDX-License-Identifier: Apache-2.0

//! Content-addressed quarantine for infected files.
//!
//! Infected files are copied or moved into the quarantine directory under a
//! name derived from a salted hash of their content plus the original
//! basename (`<hexhash>_<basename>`). A file whose content hash is already
//! present in the directory is not copied again.

use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use log::{debug, info};
use rustix::fs::{Mode, OFlags};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::QuarantineError;
use crate::util::salted_digest;

/// Salt mixed into the content hash behind quarantine file names.
const QUARANTINE_SALT: &[u8] = b"aviron-quarantine";

/// Action to take on a file the daemon reported as infected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuarantineAction {
    /// Record nothing, leave the file in place.
    #[default]
    None,
    /// Copy the file into the quarantine directory.
    Copy,
    /// Copy the file into the quarantine directory, then delete the original.
    Move,
    /// Delete the original without preserving it.
    Remove,
}

impl std::fmt::Display for QuarantineAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Copy => write!(f, "copy"),
            Self::Move => write!(f, "move"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

impl std::str::FromStr for QuarantineAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "copy" => Ok(Self::Copy),
            "move" => Ok(Self::Move),
            "remove" => Ok(Self::Remove),
            _ => Err(format!("Invalid action: {s}. Use: none, copy, move, remove")),
        }
    }
}

/// Record of one quarantine action, delivered to the listener.
#[derive(Debug, Clone)]
pub struct QuarantineFile {
    /// The infected file as reported by the scan.
    pub original: PathBuf,
    /// Virus signature names reported for the file.
    pub viruses: Vec<String>,
    /// The action that was applied.
    pub action: QuarantineAction,
    /// Where the file now lives inside the quarantine directory, for
    /// `Copy`/`Move`. Points at the pre-existing twin when the content hash
    /// was already present.
    pub quarantined_as: Option<PathBuf>,
    /// When the action was taken.
    pub timestamp: SystemTime,
}

/// Callback invoked for every quarantine action taken.
pub type QuarantineListener = dyn Fn(&QuarantineFile) + Send + Sync;

/// Quarantine store bound to one directory and one action.
pub struct Quarantine {
    action: QuarantineAction,
    dir: PathBuf,
    listener: Option<Arc<QuarantineListener>>,
    // Mutating operations are serialized.
    op_lock: Mutex<()>,
}

impl std::fmt::Debug for Quarantine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quarantine")
            .field("action", &self.action)
            .field("dir", &self.dir)
            .field("listener", &self.listener.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Quarantine {
    /// Build a store. The directory must exist, be a directory and be
    /// writable; this is validated here, eagerly.
    pub fn new(
        action: QuarantineAction,
        dir: &Path,
        listener: Option<Arc<QuarantineListener>>,
    ) -> Result<Self, QuarantineError> {
        match dir.metadata() {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(QuarantineError::directory(dir, "not a directory", None)),
            Err(e) => return Err(QuarantineError::directory(dir, "does not exist", Some(e))),
        }

        // Writability probe, dropped immediately.
        NamedTempFile::new_in(dir)
            .map_err(|e| QuarantineError::directory(dir, "not writable", Some(e)))?;

        Ok(Self {
            action,
            dir: dir.to_path_buf(),
            listener,
            op_lock: Mutex::new(()),
        })
    }

    /// The configured action.
    #[must_use]
    pub fn action(&self) -> QuarantineAction {
        self.action
    }

    /// The quarantine directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Apply the configured action to each infected file and notify the
    /// listener. Returns the records of the actions taken.
    pub fn handle(
        &self,
        infections: &[(PathBuf, Vec<String>)],
    ) -> Result<Vec<QuarantineFile>, QuarantineError> {
        if self.action == QuarantineAction::None {
            return Ok(Vec::new());
        }

        let _guard = self.op_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut handled = Vec::with_capacity(infections.len());

        for (path, viruses) in infections {
            let quarantined_as = match self.action {
                QuarantineAction::None => unreachable!("filtered above"),
                QuarantineAction::Copy => Some(self.copy_into_quarantine(path)?),
                QuarantineAction::Move => {
                    let dest = self.copy_into_quarantine(path)?;
                    fs::remove_file(path).map_err(|e| QuarantineError::action(path, e))?;
                    Some(dest)
                }
                QuarantineAction::Remove => {
                    fs::remove_file(path).map_err(|e| QuarantineError::action(path, e))?;
                    None
                }
            };

            info!(
                "quarantine {}: '{}' {:?}",
                self.action,
                path.display(),
                viruses
            );

            let record = QuarantineFile {
                original: path.clone(),
                viruses: viruses.clone(),
                action: self.action,
                quarantined_as,
                timestamp: SystemTime::now(),
            };
            if let Some(listener) = &self.listener {
                listener(&record);
            }
            handled.push(record);
        }

        Ok(handled)
    }

    /// Copy `path` into the quarantine directory under its hash-derived
    /// name. Skips the copy when a file with the same content hash already
    /// exists, returning the existing path.
    fn copy_into_quarantine(&self, path: &Path) -> Result<PathBuf, QuarantineError> {
        let mut source = safe_open(path).map_err(|e| QuarantineError::action(path, e))?;

        let digest = salted_digest(QUARANTINE_SALT, &mut source)
            .map_err(|e| QuarantineError::action(path, e))?;

        if let Some(existing) = self.find_by_digest(&digest) {
            debug!(
                "quarantine already holds content of '{}' as '{}'",
                path.display(),
                existing.display()
            );
            return Ok(existing);
        }

        let basename = path
            .file_name()
            .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().into_owned());
        let dest = self.dir.join(format!("{digest}_{basename}"));

        source
            .seek(SeekFrom::Start(0))
            .map_err(|e| QuarantineError::action(path, e))?;

        let mut tmp =
            NamedTempFile::new_in(&self.dir).map_err(|e| QuarantineError::action(path, e))?;
        io::copy(&mut source, tmp.as_file_mut()).map_err(|e| QuarantineError::action(path, e))?;
        tmp.persist(&dest)
            .map_err(|e| QuarantineError::action(path, e.error))?;

        Ok(dest)
    }

    fn find_by_digest(&self, digest: &str) -> Option<PathBuf> {
        let prefix = format!("{digest}_");
        let entries = fs::read_dir(&self.dir).ok()?;
        entries
            .flatten()
            .find(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
            .map(|entry| entry.path())
    }
}

/// Open a file for reading with `O_NOFOLLOW | O_CLOEXEC` and verify it is a
/// regular file.
fn safe_open(path: &Path) -> io::Result<File> {
    let fd = rustix::fs::open(
        path,
        OFlags::RDONLY | OFlags::NOFOLLOW | OFlags::CLOEXEC,
        Mode::empty(),
    )
    .map_err(|e| io::Error::other(format!("open failed: {e}")))?;
    let file = File::from(fd);

    if !file.metadata()?.file_type().is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn infected(path: &Path) -> Vec<(PathBuf, Vec<String>)> {
        vec![(path.to_path_buf(), vec!["Eicar-Test-Signature".to_string()])]
    }

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_directory_is_rejected_eagerly() {
        let result = Quarantine::new(QuarantineAction::Copy, Path::new("/no/such/dir"), None);
        assert_matches!(result, Err(QuarantineError::Directory { .. }));
    }

    #[test]
    fn file_as_directory_is_rejected() {
        let store_dir = TempDir::new().unwrap();
        let file = write_file(store_dir.path(), "not-a-dir", b"x");
        let result = Quarantine::new(QuarantineAction::Copy, &file, None);
        assert_matches!(result, Err(QuarantineError::Directory { .. }));
    }

    #[test]
    fn copy_preserves_original_and_names_by_hash() -> anyhow::Result<()> {
        let quarantine_dir = TempDir::new()?;
        let files_dir = TempDir::new()?;
        let original = write_file(files_dir.path(), "eicar.txt", b"infected-bytes");

        let store = Quarantine::new(QuarantineAction::Copy, quarantine_dir.path(), None)?;
        let handled = store.handle(&infected(&original))?;

        assert_eq!(handled.len(), 1);
        let dest = handled[0].quarantined_as.clone().unwrap();
        assert!(dest.starts_with(quarantine_dir.path()));
        let name = dest.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("_eicar.txt"), "{name}");
        assert_eq!(name.split('_').next().unwrap().len(), 64);
        assert_eq!(fs::read(&dest)?, b"infected-bytes");
        assert!(original.exists());
        Ok(())
    }

    #[test]
    fn identical_content_is_stored_once() {
        let quarantine_dir = TempDir::new().unwrap();
        let files_dir = TempDir::new().unwrap();
        let first = write_file(files_dir.path(), "a.bin", b"same-payload");
        let second = write_file(files_dir.path(), "b.bin", b"same-payload");

        let store = Quarantine::new(QuarantineAction::Copy, quarantine_dir.path(), None).unwrap();
        let first_dest = store.handle(&infected(&first)).unwrap()[0]
            .quarantined_as
            .clone()
            .unwrap();
        let second_dest = store.handle(&infected(&second)).unwrap()[0]
            .quarantined_as
            .clone()
            .unwrap();

        // Second action deduplicates onto the first stored copy.
        assert_eq!(first_dest, second_dest);
        assert_eq!(fs::read_dir(quarantine_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn move_removes_the_original() {
        let quarantine_dir = TempDir::new().unwrap();
        let files_dir = TempDir::new().unwrap();
        let original = write_file(files_dir.path(), "virus.bin", b"payload");

        let store = Quarantine::new(QuarantineAction::Move, quarantine_dir.path(), None).unwrap();
        let handled = store.handle(&infected(&original)).unwrap();

        assert!(!original.exists());
        assert!(handled[0].quarantined_as.as_ref().unwrap().exists());
    }

    #[test]
    fn remove_deletes_without_preserving() {
        let quarantine_dir = TempDir::new().unwrap();
        let files_dir = TempDir::new().unwrap();
        let original = write_file(files_dir.path(), "virus.bin", b"payload");

        let store = Quarantine::new(QuarantineAction::Remove, quarantine_dir.path(), None).unwrap();
        let handled = store.handle(&infected(&original)).unwrap();

        assert!(!original.exists());
        assert_eq!(handled[0].quarantined_as, None);
        assert_eq!(fs::read_dir(quarantine_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn listener_sees_every_action() {
        let quarantine_dir = TempDir::new().unwrap();
        let files_dir = TempDir::new().unwrap();
        let original = write_file(files_dir.path(), "virus.bin", b"payload");

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_listener = Arc::clone(&seen);
        let store = Quarantine::new(
            QuarantineAction::Copy,
            quarantine_dir.path(),
            Some(Arc::new(move |record: &QuarantineFile| {
                assert_eq!(record.action, QuarantineAction::Copy);
                assert_eq!(record.viruses, ["Eicar-Test-Signature"]);
                seen_in_listener.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

        store.handle(&infected(&original)).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn symlinked_original_is_refused() {
        let quarantine_dir = TempDir::new().unwrap();
        let files_dir = TempDir::new().unwrap();
        let target = write_file(files_dir.path(), "target.bin", b"payload");
        let link = files_dir.path().join("link.bin");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let store = Quarantine::new(QuarantineAction::Copy, quarantine_dir.path(), None).unwrap();
        let result = store.handle(&infected(&link));
        assert_matches!(result, Err(QuarantineError::Action { .. }));
    }
}
