//! # Event Bus System
//!
//! Provides an event-driven channel for tracker authorization and sync
//! notifications using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enums for the auth and sync domains
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐  emit   ┌───────────┐
//! │ AuthStateMachine ├────────>│           │   subscribe  ┌────────────┐
//! └──────────────────┘         │ EventBus  ├─────────────>│ Subscriber │
//! ┌──────────────────┐  emit   │ (broadcast│              └────────────┘
//! │ SyncOrchestrator ├────────>│  channel) │
//! └──────────────────┘         └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Auth(AuthEvent::AuthorizationStarted {
//!         provider: "myanimelist".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Auth(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Publishers ignore the "no subscribers" error: events are informational and
//! never drive control flow inside the core.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Authorization and token lifecycle events
    Auth(AuthEvent),
    /// Per-title reconciliation events
    Sync(SyncEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Auth(AuthEvent::Revoked { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::Authorized { .. }) => EventSeverity::Info,
            CoreEvent::Auth(AuthEvent::LoggedOut { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::Applied { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Provider identifier the event refers to.
    pub fn provider(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.provider(),
            CoreEvent::Sync(e) => e.provider(),
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events emitted by the per-provider authorization state machines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// An authorization request was built and handed to the host.
    AuthorizationStarted { provider: String },
    /// A pending authorization was abandoned.
    AuthorizationCancelled { provider: String },
    /// Code exchange succeeded.
    Authorized {
        provider: String,
        /// Access token expiry (Unix epoch seconds), if the provider sent one.
        expires_at: Option<i64>,
    },
    /// Access token is being refreshed.
    TokenRefreshing { provider: String },
    /// Token refresh completed successfully.
    TokenRefreshed {
        provider: String,
        expires_at: Option<i64>,
    },
    /// The provider rejected the refresh token; a new authorization is needed.
    Revoked { provider: String },
    /// Stored state was cleared.
    LoggedOut { provider: String },
    /// An authorization, exchange or refresh step failed.
    AuthError {
        provider: String,
        /// Stable error kind (e.g. `TokenExchangeFailed`).
        kind: String,
        /// Human-readable error message.
        message: String,
        /// Whether retrying later may succeed without user interaction.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::AuthorizationStarted { .. } => "Authorization started",
            AuthEvent::AuthorizationCancelled { .. } => "Authorization cancelled",
            AuthEvent::Authorized { .. } => "Provider authorized",
            AuthEvent::TokenRefreshing { .. } => "Refreshing access token",
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::Revoked { .. } => "Authorization revoked",
            AuthEvent::LoggedOut { .. } => "Provider logged out",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }

    fn provider(&self) -> &str {
        match self {
            AuthEvent::AuthorizationStarted { provider }
            | AuthEvent::AuthorizationCancelled { provider }
            | AuthEvent::Authorized { provider, .. }
            | AuthEvent::TokenRefreshing { provider }
            | AuthEvent::TokenRefreshed { provider, .. }
            | AuthEvent::Revoked { provider }
            | AuthEvent::LoggedOut { provider }
            | AuthEvent::AuthError { provider, .. } => provider,
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events related to reconciling one title against one tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Sync of a title against a provider began.
    Started { provider: String, title: String },
    /// A decision was computed and applied.
    Applied {
        provider: String,
        title: String,
        /// `noop`, `push` or `pull`.
        action: String,
        /// Remote count written (push) or local episodes marked (pull).
        affected: u32,
    },
    /// Nothing was attempted.
    Skipped {
        provider: String,
        title: String,
        reason: String,
    },
    /// The decision could not be applied.
    Failed {
        provider: String,
        title: String,
        message: String,
        recoverable: bool,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::Applied { .. } => "Sync applied",
            SyncEvent::Skipped { .. } => "Sync skipped",
            SyncEvent::Failed { .. } => "Sync failed",
        }
    }

    fn provider(&self) -> &str {
        match self {
            SyncEvent::Started { provider, .. }
            | SyncEvent::Applied { provider, .. }
            | SyncEvent::Skipped { provider, .. }
            | SyncEvent::Failed { provider, .. } => provider,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel shared by every component that publishes events.
///
/// Cloning is cheap; all clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers falling behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let anilist_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| event.provider() == "anilist");
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
