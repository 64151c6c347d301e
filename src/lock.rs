//! Systemwide named lock for installation steps.
//!
//! Only one process on the machine may hold a given name. Acquisition never
//! blocks: a held lock yields `None`. The lock is released when the
//! [`InstallLock`] is dropped or the process exits.
//!
//! The lock file itself is left in place; removing it on release would let a
//! waiting process lock an unlinked inode while a third one creates a fresh
//! file under the same name.

use std::fs::{File, OpenOptions};
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::path::{Path, PathBuf};

/// Longest readable name fragment kept in the lock file name.
const FRIENDLY_LEN: usize = 32;

/// An exclusive, non-blocking named lock.
#[derive(Debug)]
pub struct InstallLock {
    _file: File,
    name: String,
    path: PathBuf,
}

impl InstallLock {
    /// Tries to take the lock `name` in the system temp directory.
    ///
    /// # Errors
    /// Any I/O error other than the lock being held elsewhere.
    pub fn try_acquire(name: &str) -> IoResult<Option<Self>> {
        Self::try_acquire_in(&std::env::temp_dir(), name)
    }

    /// Tries to take the lock `name` with its file in `dir`.
    ///
    /// # Errors
    /// Any I/O error other than the lock being held elsewhere.
    pub fn try_acquire_in(dir: &Path, name: &str) -> IoResult<Option<Self>> {
        let path = Self::lock_path(dir, name);

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match Self::try_lock(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                tracing::debug!(lock = name, "lock is held by another owner");
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        tracing::debug!(lock = name, path = %path.display(), "lock acquired");
        Ok(Some(Self {
            _file: file,
            name: name.to_string(),
            path,
        }))
    }

    /// Lock file for `name` in `dir`: a readable prefix plus a hash of the
    /// full name, so distinct names never share a file.
    #[must_use]
    pub fn lock_path(dir: &Path, name: &str) -> PathBuf {
        let friendly: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .take(FRIENDLY_LEN)
            .collect();
        let hash = blake3::hash(name.as_bytes()).to_hex();
        dir.join(format!("switchboard-{friendly}-{}.lock", &hash[..16]))
    }

    /// The lock name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the path to the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn try_lock(file: &File) -> IoResult<()> {
        use std::os::unix::io::AsRawFd;

        let fd = file.as_raw_fd();
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };

        if result != 0 {
            let errno = IoError::last_os_error();
            if errno.raw_os_error() == Some(libc::EWOULDBLOCK) {
                return Err(IoError::new(ErrorKind::WouldBlock, "lock is held"));
            }
            return Err(errno);
        }

        Ok(())
    }

    #[cfg(windows)]
    fn try_lock(file: &File) -> IoResult<()> {
        use std::os::windows::io::AsRawHandle;
        use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
        use windows_sys::Win32::Storage::FileSystem::{
            LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
        };

        let handle = file.as_raw_handle() as HANDLE;
        let result = unsafe {
            let mut overlapped = std::mem::zeroed::<windows_sys::Win32::System::IO::OVERLAPPED>();
            LockFileEx(
                handle,
                LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
                0,
                1,
                0,
                &mut overlapped,
            )
        };

        if result == 0 {
            let err = IoError::last_os_error();
            if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
                return Err(IoError::new(ErrorKind::WouldBlock, "lock is held"));
            }
            return Err(err);
        }

        Ok(())
    }

    #[cfg(not(any(unix, windows)))]
    fn try_lock(_file: &File) -> IoResult<()> {
        Err(IoError::new(
            ErrorKind::Unsupported,
            "file locking not supported on this platform",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_acquire_release() {
        let dir = tempdir().unwrap();

        {
            let lock = InstallLock::try_acquire_in(dir.path(), "install").unwrap().unwrap();
            assert!(lock.path().exists());
            assert_eq!(lock.name(), "install");
        }

        // Released on drop.
        assert!(InstallLock::try_acquire_in(dir.path(), "install").unwrap().is_some());
    }

    #[test]
    fn test_lock_prevents_double_acquire() {
        let dir = tempdir().unwrap();

        let _held = InstallLock::try_acquire_in(dir.path(), "install").unwrap().unwrap();
        assert!(InstallLock::try_acquire_in(dir.path(), "install").unwrap().is_none());
        assert!(InstallLock::try_acquire_in(dir.path(), "other").unwrap().is_some());
    }

    #[test]
    fn test_lock_path_is_safe_and_distinct() {
        let dir = Path::new("/tmp");
        let a = InstallLock::lock_path(dir, "modules/../etc passwd");
        let b = InstallLock::lock_path(dir, "modules/..-etc passwd");
        assert_ne!(a, b);
        let file = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file.starts_with("switchboard-modules----etc-passwd-"));
        assert!(file.ends_with(".lock"));
        assert_eq!(a.parent(), Some(dir));
    }
}
