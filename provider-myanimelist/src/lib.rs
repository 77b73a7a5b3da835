//! # MyAnimeList Provider
//!
//! Implements `RemoteTrackerClient` for the MyAnimeList API v2.
//!
//! ## Overview
//!
//! This module provides:
//! - Anime lookup by id or title search, including the user's list status
//! - List status updates (`PATCH /anime/{id}/my_list_status`)
//! - Status normalization (`watching`, `on_hold`, ... plus `is_rewatching`)
//! - Backoff on rate limiting and server errors for reads

pub mod connector;
pub mod error;
pub mod types;

pub use connector::MyAnimeListClient;
pub use error::{MyAnimeListError, Result};
