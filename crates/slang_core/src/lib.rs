//! Core domain logic for Slang It.
//! This crate owns the discovery feed and the store/auth contracts it uses.

pub mod auth;
pub mod config;
pub mod db;
pub mod feed;
pub mod logging;
pub mod model;
pub mod store;

pub use auth::{sign_up, AuthError, AuthProvider, AuthResult, Identity, LocalAuthProvider};
pub use config::{ConfigError, FeedConfig};
pub use feed::service::FeedSnapshot;
pub use feed::{
    Clock, FeedController, FeedError, FeedEvent, FeedHandle, FeedResult, FeedService,
    FeedServiceError, FeedState, SystemClock, VoteOutcome,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::user::{User, UserId, UserList};
pub use model::word::{VoteField, Word, WordId, WordValidationError, SYSTEM_CREATOR_ID};
pub use store::{InMemoryWordStore, SqliteWordStore, StoreError, StoreResult, WordStore};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
