//! Client-side discovery feed.
//!
//! # Responsibility
//! - Keep a priority-shuffled deck of words and a viewing cursor.
//! - Apply votes optimistically and push durable writes in the background.
//! - Refill the deck from the store as the user reaches its end.
//!
//! # Invariants
//! - Only the owning task mutates the deck; background work reports back
//!   through the controller inbox.
//! - Remote write failures never roll back local state.

pub mod clock;
pub mod controller;
pub mod deck;
pub mod seed;
pub mod service;
pub mod shuffle;

pub use clock::{Clock, SystemClock};
pub use controller::{FeedController, FeedError, FeedEvent, FeedResult, FeedState, VoteOutcome};
pub use deck::{Advance, Deck};
pub use service::{FeedHandle, FeedService, FeedServiceError};
pub use shuffle::{prioritized_shuffle, ShufflePolicy, Tier};
