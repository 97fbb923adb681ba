use keyring::Entry;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tracing::debug;

use super::{decode, encode, CredentialStore};
use crate::error::{AuthError, AuthResult};

const SERVICE_NAME: &str = "samlauth";

/// Store backed by the OS keyring, one generic-password item per key
///
/// - macOS: Keychain
/// - Linux: Secret Service
/// - Windows: Credential Manager
pub struct KeychainStore<T> {
    service: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> KeychainStore<T> {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            _marker: PhantomData,
        }
    }

    fn entry(&self, key: &str) -> AuthResult<Entry> {
        Entry::new(&self.service, key)
            .map_err(|e| AuthError::store(format!("Failed to access keyring: {}", e)))
    }
}

impl<T> Default for KeychainStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn keyring_error(key: &str, action: &str, err: keyring::Error) -> AuthError {
    match err {
        keyring::Error::Ambiguous(_) => AuthError::AmbiguousEntry {
            key: key.to_string(),
        },
        e => AuthError::store(format!("Failed to {} keyring entry {}: {}", action, key, e)),
    }
}

impl<T> CredentialStore<T> for KeychainStore<T>
where
    T: Serialize + DeserializeOwned,
{
    fn store(&self, key: &str, value: &T) -> AuthResult<()> {
        let payload = encode(value)?;
        self.entry(key)?
            .set_password(&payload)
            .map_err(|e| keyring_error(key, "store", e))?;
        debug!("Stored keyring entry {}", key);
        Ok(())
    }

    fn fetch(&self, key: &str) -> AuthResult<Option<T>> {
        match self.entry(key)?.get_password() {
            Ok(payload) => decode(key, &payload).map(Some),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(keyring_error(key, "read", e)),
        }
    }

    fn delete(&self, key: &str) -> AuthResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(keyring_error(key, "delete", e)),
        }
    }
}
