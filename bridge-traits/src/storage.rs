//! Credential Storage Abstraction
//!
//! The core persists one opaque serialized authorization state per tracker
//! provider. The host decides where that blob lives:
//! - macOS/iOS: Keychain
//! - Android: Keystore-backed preferences
//! - Windows: Credential Manager
//! - Linux: Secret Service / a private config file
//!
//! The blob is produced and consumed by `core-auth`; the store never inspects it.
//! An empty string denotes a logged-out provider.

use async_trait::async_trait;

use crate::error::Result;

/// Secure per-provider storage of serialized authorization state.
///
/// # Security Requirements
///
/// Implementations MUST:
/// - Encrypt data at rest when the platform offers it
/// - Never log or expose the stored value
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::CredentialStore;
///
/// async fn forget(store: &dyn CredentialStore) -> Result<()> {
///     store.save_auth_state("anilist", "").await
/// }
/// ```
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the serialized authorization state for `provider`.
    ///
    /// Returns an empty string when nothing has been stored yet.
    async fn load_auth_state(&self, provider: &str) -> Result<String>;

    /// Replace the serialized authorization state for `provider`.
    ///
    /// Each call is a full replace; the last writer wins.
    async fn save_auth_state(&self, provider: &str, state: &str) -> Result<()>;

    /// Remove any stored state for `provider`.
    async fn clear_auth_state(&self, provider: &str) -> Result<()> {
        self.save_auth_state(provider, "").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        entries: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl CredentialStore for MemoryStore {
        async fn load_auth_state(&self, provider: &str) -> Result<String> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .get(provider)
                .cloned()
                .unwrap_or_default())
        }

        async fn save_auth_state(&self, provider: &str, state: &str) -> Result<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(provider.to_string(), state.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_clear_defaults_to_empty_save() {
        let store = MemoryStore::default();
        store.save_auth_state("myanimelist", "{\"a\":1}").await.unwrap();
        store.clear_auth_state("myanimelist").await.unwrap();

        assert_eq!(store.load_auth_state("myanimelist").await.unwrap(), "");
        assert_eq!(store.load_auth_state("anilist").await.unwrap(), "");
    }
}
