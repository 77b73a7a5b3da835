//! Credential Storage using OS Keychain

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::CredentialStore,
};
use keyring::Entry;
use tracing::debug;

const DEFAULT_SERVICE_NAME: &str = "episync";

/// Keyring-based credential storage
///
/// Each provider's serialized auth state is kept as one keychain entry under
/// the service name, keyed by provider id. Uses platform-specific storage:
/// - macOS: Keychain
/// - Windows: Credential Manager (DPAPI)
/// - Linux: Secret Service (libsecret)
pub struct KeyringCredentialStore {
    service_name: String,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::with_service_name(DEFAULT_SERVICE_NAME)
    }

    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, provider: &str) -> Result<Entry> {
        Entry::new(&self.service_name, provider).map_err(Self::map_keyring_error)
    }

    fn map_keyring_error(e: keyring::Error) -> BridgeError {
        BridgeError::OperationFailed(format!("Keyring error: {}", e))
    }

    fn delete(&self, provider: &str) -> Result<()> {
        match self.entry(provider)?.delete_credential() {
            Ok(()) => {
                debug!(provider, "Deleted auth state from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn load_auth_state(&self, provider: &str) -> Result<String> {
        match self.entry(provider)?.get_password() {
            Ok(state) => {
                debug!(provider, "Loaded auth state from keyring");
                Ok(state)
            }
            Err(keyring::Error::NoEntry) => {
                debug!(provider, "No auth state in keyring");
                Ok(String::new())
            }
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    async fn save_auth_state(&self, provider: &str, state: &str) -> Result<()> {
        // Some backends reject empty secrets; an empty state means "nothing stored".
        if state.is_empty() {
            return self.delete(provider);
        }

        self.entry(provider)?
            .set_password(state)
            .map_err(Self::map_keyring_error)?;

        debug!(provider, "Stored auth state in keyring");
        Ok(())
    }
}
