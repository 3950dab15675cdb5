//! Lock-scoped atomic mutation helpers for the JSONL store.
//!
//! The scope allocator reads a maximum and inserts one past it; running both
//! inside one lock turns that read-then-insert into a single critical section.

use crate::{MemoryStore, StoreError};
use chrono::Utc;
use std::error::Error as StdError;
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn store_lock_path(store_path: &Path) -> PathBuf {
    let mut path: OsString = store_path.as_os_str().to_os_string();
    path.push(".lock");
    PathBuf::from(path)
}

#[derive(Debug)]
pub enum AtomicStoreMutationError<E> {
    /// Another process holds the lock. `holder` is the `pid=` line recorded in
    /// the lock file, when readable.
    LockBusy {
        lock_path: String,
        holder: Option<String>,
    },
    LockIo { lock_path: String, message: String },
    Store(StoreError),
    Mutation(E),
}

impl<E> AtomicStoreMutationError<E> {
    fn lock_busy(lock_path: &Path) -> Self {
        let holder = fs::read_to_string(lock_path).ok().and_then(|text| {
            text.lines()
                .find_map(|line| line.strip_prefix("pid="))
                .map(|pid| pid.trim().to_string())
        });
        Self::LockBusy {
            lock_path: lock_path.display().to_string(),
            holder,
        }
    }

    fn lock_io(lock_path: &Path, message: impl Into<String>) -> Self {
        Self::LockIo {
            lock_path: lock_path.display().to_string(),
            message: message.into(),
        }
    }
}

impl<E: Display> Display for AtomicStoreMutationError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LockBusy { lock_path, holder } => {
                write!(f, "store lock busy: {lock_path}")?;
                if let Some(pid) = holder {
                    write!(f, " (held by pid {pid})")?;
                }
                write!(
                    f,
                    "; if that process is gone, remove the lock file and retry"
                )
            }
            Self::LockIo { lock_path, message } => {
                write!(f, "failed to acquire store lock {lock_path}: {message}")
            }
            Self::Store(err) => write!(f, "{err}"),
            Self::Mutation(err) => write!(f, "{err}"),
        }
    }
}

impl<E> StdError for AtomicStoreMutationError<E> where
    E: Display + std::fmt::Debug + StdError + 'static
{
}

/// Execute one lock-scoped store mutation against a JSONL path.
///
/// A missing store file loads as an empty store. The mutator returns
/// `(value, changed)`; `changed=true` persists the store before the lock is
/// released.
pub fn mutate_store_jsonl<T, E, F>(
    path: impl AsRef<Path>,
    mutator: F,
) -> Result<T, AtomicStoreMutationError<E>>
where
    F: FnOnce(&mut MemoryStore) -> Result<(T, bool), E>,
{
    let path = path.as_ref();
    let _guard = StoreFileLockGuard::acquire::<E>(path)?;

    let mut store =
        MemoryStore::load_jsonl_or_empty(path).map_err(AtomicStoreMutationError::Store)?;
    let (value, changed) = mutator(&mut store).map_err(AtomicStoreMutationError::Mutation)?;
    if changed {
        store
            .save_jsonl(path)
            .map_err(AtomicStoreMutationError::Store)?;
    }
    Ok(value)
}

struct StoreFileLockGuard {
    lock_path: PathBuf,
    _file: File,
}

impl StoreFileLockGuard {
    fn acquire<E>(path: &Path) -> Result<Self, AtomicStoreMutationError<E>> {
        let lock_path = store_lock_path(path);
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| AtomicStoreMutationError::lock_io(&lock_path, e.to_string()))?;
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(mut file) => {
                let _ = writeln!(
                    file,
                    "pid={}\nutc={}",
                    std::process::id(),
                    Utc::now().to_rfc3339()
                );
                Ok(Self {
                    lock_path,
                    _file: file,
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::warn!(lock = %lock_path.display(), "store lock already held");
                Err(AtomicStoreMutationError::lock_busy(&lock_path))
            }
            Err(err) => Err(AtomicStoreMutationError::lock_io(
                &lock_path,
                err.to_string(),
            )),
        }
    }
}

impl Drop for StoreFileLockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}
