//! JSON-file key-value store.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use fs2::FileExt;
use tracing::{debug, instrument, warn};

use passgate_core::error::{Error, StorageError};
use passgate_core::{KeyValueStore, Result};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

type Entries = BTreeMap<String, String>;

fn map_io(path: &Path, err: std::io::Error) -> Error {
    Error::Storage(StorageError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

/// A key-value store persisted as a single JSON object on disk.
///
/// Every operation takes an advisory lock on a sidecar `.lock` file, so
/// several processes can share one session file. Writes go through a
/// temporary file and a rename; the file is readable only by its owner.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store backed by the file at `path`. The file is created on
    /// first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store at `session.json` in the platform data directory.
    pub fn default_location() -> Result<Self> {
        let dirs =
            ProjectDirs::from("", "", "passgate").ok_or(Error::Storage(StorageError::NoDataDir))?;
        Ok(Self::new(dirs.data_dir().join("session.json")))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn open_lock(&self) -> Result<File> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| map_io(parent, e))?;
        }

        let lock_path = self.lock_path();
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| map_io(&lock_path, e))
    }

    fn read_entries(&self) -> Result<Entries> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(map_io(&self.path, e)),
        };

        if content.trim().is_empty() {
            return Ok(Entries::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            Error::Storage(StorageError::Corrupt {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })
        })
    }

    fn write_entries(&self, entries: &Entries) -> Result<()> {
        let content = serde_json::to_string_pretty(entries).map_err(|e| {
            Error::Storage(StorageError::Corrupt {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })
        })?;

        let temp_path = self.path.with_extension("tmp");
        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&temp_path).map_err(|e| map_io(&temp_path, e))?;
        // mode() only applies on creation; a leftover temp file keeps its old bits.
        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| map_io(&temp_path, e))?;
        file.write_all(content.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| map_io(&temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| map_io(&self.path, e))
    }

    /// Entries to edit, and whether the file must be rewritten regardless.
    ///
    /// A corrupt file is replaced rather than reported, so a session can
    /// always be overwritten or cleared.
    fn read_for_update(&self) -> Result<(Entries, bool)> {
        match self.read_entries() {
            Ok(entries) => Ok((entries, false)),
            Err(Error::Storage(StorageError::Corrupt { message, .. })) => {
                warn!(path = %self.path.display(), error = %message, "Discarding corrupt store");
                Ok((Entries::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    /// Apply `edit` to the stored entries under an exclusive lock.
    fn update(&self, edit: impl FnOnce(&mut Entries) -> bool) -> Result<()> {
        let lock_file = self.open_lock()?;
        lock_file
            .lock_exclusive()
            .map_err(|e| map_io(&self.lock_path(), e))?;

        let result = self.read_for_update().and_then(|(mut entries, rewrite)| {
            if edit(&mut entries) || rewrite {
                self.write_entries(&entries)
            } else {
                Ok(())
            }
        });

        lock_file
            .unlock()
            .map_err(|e| map_io(&self.lock_path(), e))?;
        result
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let lock_file = self.open_lock()?;
        lock_file
            .lock_shared()
            .map_err(|e| map_io(&self.lock_path(), e))?;

        let result = self.read_entries().map(|mut entries| entries.remove(key));

        lock_file
            .unlock()
            .map_err(|e| map_io(&self.lock_path(), e))?;
        result
    }

    #[instrument(skip(self, value), fields(path = %self.path.display()))]
    fn set(&self, key: &str, value: &str) -> Result<()> {
        debug!("Writing key");
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn remove(&self, key: &str) -> Result<()> {
        debug!("Removing key");
        self.update(|entries| entries.remove(key).is_some())
    }
}
