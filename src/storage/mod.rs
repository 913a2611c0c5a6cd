//! Conversation persistence
//!
//! The conversation log is mirrored into a single SQLite table so that
//! questions can be answered with SQL over the message history.

pub mod sqlite;

pub use sqlite::{SqliteStore, StoredMessage};
