//! # Host Bridge Traits
//!
//! Capability traits the host must provide to the tracker sync core.
//!
//! ## Overview
//!
//! The core never talks to the network, the credential vault, the browser or
//! the episode database directly. Each of those is a trait defined here and
//! implemented by the host (desktop shims live in `bridge-desktop`).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP used by token endpoints and tracker APIs
//!
//! ### Security & Storage
//! - [`CredentialStore`](storage::CredentialStore) - Per-provider serialized auth state
//!
//! ### Host Integration
//! - [`AuthorizationAgent`](authorization::AuthorizationAgent) - Runs the browser consent step
//! - [`LocalProgressWriter`](progress::LocalProgressWriter) - Marks local episodes fully watched
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic expiry checks
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! use core_runtime::Error;
//!
//! let store = builder.credential_store
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "CredentialStore".to_string(),
//!         message: "No credential store provided. \
//!                  Desktop: enable the desktop-shims feature. \
//!                  Mobile: inject the platform vault adapter.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with actionable messages.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across tasks
//! behind an `Arc`.

pub mod authorization;
pub mod error;
pub mod http;
pub mod progress;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use authorization::{AuthorizationAgent, AuthorizationRequest, AuthorizationResponse};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use progress::LocalProgressWriter;
pub use storage::CredentialStore;
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
