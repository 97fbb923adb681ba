use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::CredentialStore;
use crate::error::{AuthError, AuthResult};

/// Store keeping every entry in one JSON object on disk, readable only by the owner
pub struct FileStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FileStore<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// `~/.aws/samlauth/cache.json`
    pub fn default_path() -> AuthResult<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".aws").join("samlauth").join("cache.json"))
            .ok_or_else(|| AuthError::store("Could not determine home directory"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> AuthResult<BTreeMap<String, Value>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| {
            AuthError::store(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            AuthError::store(format!("Corrupt cache file {}: {}", self.path.display(), e))
        })
    }

    fn save(&self, entries: &BTreeMap<String, Value>) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AuthError::store(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        // Write beside the target and rename so readers never see a partial file
        let tmp = self.path.with_extension("json.tmp");
        let payload = serde_json::to_vec_pretty(entries)?;
        create_private(&tmp)
            .and_then(|mut file| {
                file.write_all(&payload)?;
                file.sync_all()
            })
            .map_err(|e| AuthError::store(format!("Failed to write {}: {}", tmp.display(), e)))?;

        fs::rename(&tmp, &self.path).map_err(|e| {
            AuthError::store(format!("Failed to replace {}: {}", self.path.display(), e))
        })
    }
}

/// Fresh file readable only by the owner from the moment it exists
fn create_private(path: &Path) -> io::Result<File> {
    // A leftover from an interrupted write may carry wider permissions
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

impl<T> CredentialStore<T> for FileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    fn store(&self, key: &str, value: &T) -> AuthResult<()> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), serde_json::to_value(value)?);
        self.save(&entries)?;
        debug!("Stored cache entry {} in {}", key, self.path.display());
        Ok(())
    }

    fn fetch(&self, key: &str) -> AuthResult<Option<T>> {
        self.load()?
            .remove(key)
            .map(|value| {
                serde_json::from_value(value).map_err(|e| {
                    AuthError::store(format!("Corrupt cache entry for {}: {}", key, e))
                })
            })
            .transpose()
    }

    fn delete(&self, key: &str) -> AuthResult<()> {
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}
