//! Flutter bridge for the Slang It core.

pub mod api;
