//! Session-scoped key/value backends
//!
//! `CredentialStore` persists through a `SessionStorage` implementation.
//! Backends report I/O failures honestly; the credential layer decides to
//! swallow them.
//!
//! `FileStorage` keeps one file per key. Writes go through a temp file +
//! rename so a crash never leaves a half-written entry, and files are 0600
//! because they hold a bearer token and the encrypted signing key.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

/// String-keyed storage that lives for one client session.
pub trait SessionStorage: Send + Sync {
    /// Read an entry. A missing key is `Ok(None)`, not an error.
    fn get_item(&self, key: &str) -> io::Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> io::Result<()>;

    /// Remove an entry. Removing a missing key succeeds.
    fn remove_item(&self, key: &str) -> io::Result<()>;
}

/// In-process storage, gone when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> io::Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> io::Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}

/// One file per key under a directory.
///
/// Point it at a runtime directory (`$XDG_RUNTIME_DIR`) to get
/// session lifetime: the OS clears it on logout and reboot.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir` as the backing directory, creating it (0700) if needed.
    /// An existing directory keeps its permissions.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        let created = !dir.try_exists()?;
        std::fs::create_dir_all(&dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if created {
                std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
            }
        }
        #[cfg(not(unix))]
        let _ = created;

        debug!(dir = %dir.display(), "opened session storage");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key: {key:?}"),
            ));
        }
        Ok(self.dir.join(key))
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> io::Result<()> {
        write_atomic(&self.path_for(key)?, value)
    }

    fn remove_item(&self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Write `value` to `path` via a sibling temp file and rename.
fn write_atomic(path: &Path, value: &str) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::other("storage path has no parent directory"))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::other("storage path has no file name"))?;

    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));
    if let Err(e) = replace_with_temp(&tmp_path, path, value) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    debug!(path = %path.display(), "persisted session entry");
    Ok(())
}

fn replace_with_temp(tmp_path: &Path, path: &Path, value: &str) -> io::Result<()> {
    std::fs::write(tmp_path, value.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(tmp_path, path)
}
