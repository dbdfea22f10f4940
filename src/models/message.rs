//! Stored message entity
//!
//! SeaORM entity for the `messages` table. Each row is the durable record of
//! one message observed on a monitored queue, created once per `message_id`
//! and never updated by the ingestion pipeline.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Lifecycle tag assigned to every newly ingested message.
pub const STATE_RECEIVED: &str = "RECEIVED";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    /// Surrogate key used by the message detail view
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Identifier assigned by the queue service; unique across all queues
    #[sea_orm(unique)]
    pub message_id: String,

    /// Last path segment of the queue endpoint the message was received from
    pub queue_name: String,

    /// Publishing topic, from the message attributes or the delivery envelope
    pub topic_arn: Option<String>,

    pub subject: Option<String>,

    /// Payload after envelope unwrapping
    #[sea_orm(column_type = "Text")]
    pub body: String,

    /// Message attributes keyed by name, in the queue service's attribute shape
    #[sea_orm(column_type = "Json", nullable)]
    pub attributes: Option<JsonValue>,

    pub state: String,

    pub received_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
