//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `CredentialStore` backed by the OS keychain (`keyring`)
//! - `CredentialStore` backed by private JSON files under the user data
//!   directory, for systems without a secret service
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{KeyringCredentialStore, ReqwestHttpClient};
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let store = KeyringCredentialStore::new();
//! ```

mod file_store;
mod http;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use file_store::FileCredentialStore;
pub use http::ReqwestHttpClient;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringCredentialStore;
