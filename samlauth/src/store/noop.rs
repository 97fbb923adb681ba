use super::CredentialStore;
use crate::error::AuthResult;

/// Store that remembers nothing, used when caching is disabled
pub struct NoopStore;

impl<T> CredentialStore<T> for NoopStore {
    fn store(&self, _key: &str, _value: &T) -> AuthResult<()> {
        Ok(())
    }

    fn fetch(&self, _key: &str) -> AuthResult<Option<T>> {
        Ok(None)
    }

    fn delete(&self, _key: &str) -> AuthResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_forgets() {
        let store = NoopStore;
        store.store("dev", &42u32).unwrap();
        assert_eq!(CredentialStore::<u32>::fetch(&store, "dev").unwrap(), None);
        CredentialStore::<u32>::delete(&store, "dev").unwrap();
    }
}
