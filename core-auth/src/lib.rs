//! # Tracker Authorization
//!
//! OAuth 2.0 authorization code flow and token lifecycle for the supported
//! anime trackers.
//!
//! ## Overview
//!
//! - [`AuthStateMachine`] owns one tracker's tokens, drives authorization,
//!   refreshes on demand (single-flight) and persists every change through
//!   the host's credential store
//! - [`ProviderAuthClient`] speaks the provider's token endpoint: PKCE for
//!   MyAnimeList, client secret basic auth for AniList
//! - [`AuthState`] is the serializable snapshot kept in the credential store

pub mod error;
pub mod machine;
pub mod oauth;
pub mod types;

pub use error::{AuthError, Result};
pub use machine::{AuthOptions, AuthStateMachine};
pub use oauth::{PendingAuthorization, PkceVerifier, ProviderAuthClient};
pub use types::{AuthFailure, AuthState, AuthStatus, OAuthTokens, ProviderKind};
