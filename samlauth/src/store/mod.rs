//! Credential cache backends

use clap::ValueEnum;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

mod file;
mod keychain;
mod noop;

pub use file::FileStore;
pub use keychain::KeychainStore;
pub use noop::NoopStore;

/// Keyed persistence for credentials of type `T`.
///
/// Each key holds at most one entry; `store` replaces whatever was there.
pub trait CredentialStore<T>: Send + Sync {
    /// Insert or replace the entry for `key`
    fn store(&self, key: &str, value: &T) -> AuthResult<()>;

    /// Entry for `key`, `None` when absent
    fn fetch(&self, key: &str) -> AuthResult<Option<T>>;

    /// Remove the entry for `key`; removing an absent entry succeeds
    fn delete(&self, key: &str) -> AuthResult<()>;
}

/// Cache backend selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackend {
    /// OS keychain / secret service
    #[value(alias = "vault")]
    Keychain,
    /// JSON file under ~/.aws/samlauth
    File,
    /// No caching
    #[value(name = "none")]
    Disabled,
}

impl CacheBackend {
    /// Build the store for this backend
    pub fn open<T>(self) -> AuthResult<Arc<dyn CredentialStore<T>>>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let store: Arc<dyn CredentialStore<T>> = match self {
            Self::Keychain => Arc::new(KeychainStore::<T>::new()),
            Self::File => {
                let store = FileStore::<T>::new(FileStore::<T>::default_path()?);
                debug!("Using file cache at {}", store.path().display());
                Arc::new(store)
            }
            Self::Disabled => Arc::new(NoopStore),
        };
        Ok(store)
    }
}

fn encode<T: Serialize>(value: &T) -> AuthResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn decode<T: DeserializeOwned>(key: &str, payload: &str) -> AuthResult<T> {
    serde_json::from_str(payload)
        .map_err(|e| AuthError::store(format!("Corrupt cache entry for {}: {}", key, e)))
}
