//! # AniList Provider
//!
//! Implements `RemoteTrackerClient` for the AniList GraphQL API.
//!
//! ## Overview
//!
//! This module provides:
//! - `Media` lookup by id or search with the viewer's `mediaListEntry`
//! - `SaveMediaListEntry` mutations for progress and status
//! - Status normalization (`CURRENT`, `REPEATING`, ...)
//! - GraphQL error mapping and backoff on rate limiting for reads

pub mod connector;
pub mod error;
pub mod types;

pub use connector::AniListClient;
pub use error::{AniListError, Result};
