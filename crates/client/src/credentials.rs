//! Credential repository
//!
//! The credential is owned by a store object injected into the session
//! manager and the API client, never by global state. This keeps tests
//! hermetic: any fake implementing [`CredentialStore`] can stand in.

use async_trait::async_trait;
use dropshelf_domain::{Credential, Result};
use tokio::sync::RwLock;

/// Trait for credential persistence.
///
/// Implementations must replace the credential wholesale; partial updates
/// are composed by the caller before storing.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Retrieve the current credential, if any.
    async fn load(&self) -> Result<Option<Credential>>;

    /// Replace the stored credential.
    async fn store(&self, credential: Credential) -> Result<()>;

    /// Remove the stored credential. Idempotent.
    async fn clear(&self) -> Result<()>;
}

/// Process-lifetime in-memory credential store.
///
/// The default store for a client process; persistent deployments can swap
/// in their own [`CredentialStore`] implementation.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<Option<Credential>>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing credential (e.g. restored at process
    /// start from persisted storage).
    #[must_use]
    pub fn with_credential(credential: Credential) -> Self {
        Self { inner: RwLock::new(Some(credential)) }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credential>> {
        Ok(self.inner.read().await.clone())
    }

    async fn store(&self, credential: Credential) -> Result<()> {
        *self.inner.write().await = Some(credential);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.inner.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the in-memory store.
    use super::*;

    #[tokio::test]
    async fn store_and_load_round_trip() {
        let store = InMemoryCredentialStore::new();
        assert!(store.load().await.expect("load").is_none());

        let cred = Credential::new("tok".to_string(), Some("rtok".to_string()), 3600);
        store.store(cred).await.expect("store");

        let loaded = store.load().await.expect("load").expect("credential present");
        assert_eq!(loaded.access_token, "tok");
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let store = InMemoryCredentialStore::with_credential(Credential::new(
            "tok".to_string(),
            None,
            0,
        ));

        store.clear().await.expect("clear");
        store.clear().await.expect("clear again");
        assert!(store.load().await.expect("load").is_none());
    }
}
