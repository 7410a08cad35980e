//! Scoped spool-lock primitive (spec §4.A, §9 "Scoped file locks").
//!
//! A [`Lock`] is a zero-byte sentinel file whose mere existence reserves its
//! path. Creation is atomic (fail-if-exists); release happens on every exit
//! path via [`Drop`], or explicitly via [`Lock::release`] for call sites that
//! want to observe the removal result.
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;

use crate::error::LockError;

pub(crate) const LOCK_NAME: &str = ".lock";

/// A held lock on `path`. Removes the file on drop.
pub struct Lock {
    path: Option<Utf8PathBuf>,
}

impl Lock {
    /// Atomically create the lock file at `path`. Fails with
    /// [`LockError::AlreadyHeld`] if the file already exists, or
    /// [`LockError::Create`] for any other I/O failure.
    pub fn acquire(path: impl Into<Utf8PathBuf>) -> Result<Self, LockError> {
        let path = path.into();
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => Ok(Self { path: Some(path) }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(LockError::AlreadyHeld(path))
            }
            Err(e) => Err(LockError::Create(path, e)),
        }
    }

    /// Acquire the `.lock` sentinel inside `dir`.
    pub fn acquire_in(dir: &Utf8Path) -> Result<Self, LockError> {
        Self::acquire(dir.join(LOCK_NAME))
    }

    /// Release the lock now, observing whether removal succeeded.
    pub fn release(mut self) -> std::io::Result<()> {
        self.remove()
    }

    fn remove(&mut self) -> std::io::Result<()> {
        if let Some(path) = self.path.take() {
            fs::remove_file(&path)
        } else {
            Ok(())
        }
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        if self.path.is_some() {
            if let Err(e) = self.remove() {
                tracing::error!(error = %e, "failed to release lock");
            }
        }
    }
}
