//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the tracker sync core:
//! - Logging and tracing infrastructure
//! - Configuration management (bridges, provider settings, timeouts)
//! - Event bus for auth and sync notifications
//!
//! ## Overview
//!
//! Every other crate in the workspace depends on this one for its logging
//! conventions, its `CoreConfig` and the `EventBus` it publishes to.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
