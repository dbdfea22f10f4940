//! Message repository
//!
//! Durable store for ingested messages. Deduplication relies on the unique
//! index over `message_id`: a concurrent insert of the same id surfaces as
//! [`InsertOutcome::AlreadyExists`] rather than an error.

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{RepositoryError, is_unique_violation};
use crate::models::message::{self, Entity as Message, STATE_RECEIVED};

/// Fields captured for a message the first time it is observed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub message_id: String,
    pub queue_name: String,
    pub topic_arn: Option<String>,
    pub subject: Option<String>,
    pub body: String,
    pub attributes: Option<JsonValue>,
    pub received_at: DateTimeWithTimeZone,
}

impl NewMessage {
    /// Creates a record stamped with the current time and no topic metadata.
    pub fn new(
        message_id: impl Into<String>,
        queue_name: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            queue_name: queue_name.into(),
            topic_arn: None,
            subject: None,
            body: body.into(),
            attributes: None,
            received_at: Utc::now().fixed_offset(),
        }
    }
}

/// Result of [`MessageRepository::insert_if_absent`].
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Created(message::Model),
    /// A row with the same `message_id` was already stored.
    AlreadyExists,
}

#[derive(Debug, Clone)]
pub struct MessageRepository {
    db: Arc<DatabaseConnection>,
}

impl MessageRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Inserts the message unless one with the same `message_id` exists.
    pub async fn insert_if_absent(
        &self,
        new: NewMessage,
    ) -> Result<InsertOutcome, RepositoryError> {
        let model = message::Model {
            id: Uuid::new_v4(),
            message_id: new.message_id,
            queue_name: new.queue_name,
            topic_arn: new.topic_arn,
            subject: new.subject,
            body: new.body,
            attributes: new.attributes,
            state: STATE_RECEIVED.to_string(),
            received_at: new.received_at,
        };
        let active: message::ActiveModel = model.clone().into();

        match Message::insert(active)
            .exec_without_returning(&*self.db)
            .await
        {
            Ok(_) => Ok(InsertOutcome::Created(model)),
            Err(err) if is_unique_violation(&err) => {
                tracing::debug!(
                    message_id = %model.message_id,
                    "Concurrent insert won the race, treating as duplicate"
                );
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn exists(&self, message_id: &str) -> Result<bool, RepositoryError> {
        let count = Message::find()
            .filter(message::Column::MessageId.eq(message_id))
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<message::Model>, RepositoryError> {
        Ok(Message::find_by_id(id).one(&*self.db).await?)
    }

    pub async fn find_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<message::Model>, RepositoryError> {
        Ok(Message::find()
            .filter(message::Column::MessageId.eq(message_id))
            .one(&*self.db)
            .await?)
    }

    /// Messages received from `queue_name`, newest first.
    pub async fn list_by_queue(
        &self,
        queue_name: &str,
    ) -> Result<Vec<message::Model>, RepositoryError> {
        Ok(Message::find()
            .filter(message::Column::QueueName.eq(queue_name))
            .order_by_desc(message::Column::ReceivedAt)
            .order_by_desc(message::Column::Id)
            .all(&*self.db)
            .await?)
    }

    /// Messages published through `topic_arn`, newest first.
    pub async fn list_by_topic(
        &self,
        topic_arn: &str,
    ) -> Result<Vec<message::Model>, RepositoryError> {
        Ok(Message::find()
            .filter(message::Column::TopicArn.eq(topic_arn))
            .order_by_desc(message::Column::ReceivedAt)
            .order_by_desc(message::Column::Id)
            .all(&*self.db)
            .await?)
    }

    pub async fn count_by_queue(&self, queue_name: &str) -> Result<u64, RepositoryError> {
        Ok(Message::find()
            .filter(message::Column::QueueName.eq(queue_name))
            .count(&*self.db)
            .await?)
    }

    pub async fn count_by_topic(&self, topic_arn: &str) -> Result<u64, RepositoryError> {
        Ok(Message::find()
            .filter(message::Column::TopicArn.eq(topic_arn))
            .count(&*self.db)
            .await?)
    }
}
