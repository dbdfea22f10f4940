//! # SQS Monitor Library
//!
//! Ingests messages from monitored queues into a durable store, unwrapping
//! pub/sub delivery envelopes and deduplicating by message id, and exposes the
//! stored messages by queue or topic.

pub mod config;
pub mod dashboard;
pub mod db;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod poller;
pub mod queue;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub use migration;
