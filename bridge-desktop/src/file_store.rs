//! File-backed credential storage
//!
//! Fallback for desktops without a secret service. Each provider's state is
//! written to `<data_dir>/episync/credentials/<provider>.json` with
//! owner-only permissions on Unix.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::CredentialStore,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

pub struct FileCredentialStore {
    directory: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Store under the platform data directory
    pub fn new() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join("episync")
            .join("credentials");

        Self::with_directory(data_dir)
    }

    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, provider: &str) -> Result<PathBuf> {
        let valid = !provider.is_empty()
            && provider
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(BridgeError::OperationFailed(format!(
                "Invalid provider id for credential file: {:?}",
                provider
            )));
        }
        Ok(self.directory.join(format!("{}.json", provider)))
    }

    async fn write_private(path: &Path, contents: &str) -> Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }
}

impl Default for FileCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load_auth_state(&self, provider: &str) -> Result<String> {
        let path = self.path_for(provider)?;
        match fs::read_to_string(&path).await {
            Ok(state) => Ok(state),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn save_auth_state(&self, provider: &str, state: &str) -> Result<()> {
        let path = self.path_for(provider)?;
        let _guard = self.write_lock.lock().await;

        if state.is_empty() {
            return match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(provider, "Removed credential file");
                    Ok(())
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(BridgeError::Io(e)),
            };
        }

        fs::create_dir_all(&self.directory).await?;

        // Write then rename so a crash never leaves a half-written state file.
        let staging = path.with_extension("json.tmp");
        Self::write_private(&staging, state).await?;
        fs::rename(&staging, &path).await?;

        debug!(provider, path = ?path, "Stored auth state");
        Ok(())
    }
}
