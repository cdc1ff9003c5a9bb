//! Domain model for crowd-sourced slang words and their voters.
//!
//! # Responsibility
//! - Define canonical word and user records shared by store, feed and FFI.
//! - Keep serde field names aligned with the word/user document shapes.
//!
//! # Invariants
//! - Vote counters only increase over a word's lifetime.
//! - User word lists have set semantics.

pub mod user;
pub mod word;
