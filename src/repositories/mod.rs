//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for the
//! message store.

pub mod message;

pub use message::{InsertOutcome, MessageRepository, NewMessage};
