//! # Ingestion Pipeline
//!
//! Receives batches from monitored queues, normalizes delivery envelopes,
//! stores each message once per `message_id` and removes every delivery from
//! its source queue. Queues are processed one at a time; a failure on one
//! queue never aborts its siblings.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::config::BatchSettings;
use crate::envelope::normalize;
use crate::error::{IngestError, ServiceError};
use crate::queue::{
    QueueClient, RawMessage, TopicSubscriptionResolver, attributes_to_json, queue_name_from_url,
};
use crate::repositories::{InsertOutcome, MessageRepository, NewMessage};

/// Outcome of a pass over every visible queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RefreshSummary {
    pub queues_polled: u64,
    /// Queues whose receive or store step failed
    pub queues_failed: u64,
    pub messages_received: u64,
}

#[derive(Debug, Default)]
struct BatchStats {
    stored: u64,
    duplicates: u64,
    delete_failures: u64,
}

#[derive(Clone)]
pub struct IngestionPipeline {
    queues: Arc<dyn QueueClient>,
    resolver: TopicSubscriptionResolver,
    repository: MessageRepository,
    refresh: BatchSettings,
}

impl IngestionPipeline {
    pub fn new(
        queues: Arc<dyn QueueClient>,
        resolver: TopicSubscriptionResolver,
        repository: MessageRepository,
        refresh: BatchSettings,
    ) -> Self {
        Self {
            queues,
            resolver,
            repository,
            refresh,
        }
    }

    pub fn resolver(&self) -> &TopicSubscriptionResolver {
        &self.resolver
    }

    pub fn repository(&self) -> &MessageRepository {
        &self.repository
    }

    pub async fn list_queues(&self) -> Result<Vec<String>, ServiceError> {
        self.queues.list_queues().await
    }

    /// Batch parameters used by [`Self::ingest_from_all_queues`].
    pub fn refresh_settings(&self) -> BatchSettings {
        self.refresh
    }

    /// Receive one batch from `queue_url`, store new messages and delete every
    /// delivery. Returns the whole batch, duplicates included.
    ///
    /// A failed delete is logged and ignored; the message will be redelivered
    /// and skipped as a duplicate. A store failure stops the batch before the
    /// failing message is deleted. A queue that no longer exists yields an
    /// empty batch.
    #[instrument(skip(self))]
    pub async fn ingest_from_queue(
        &self,
        queue_url: &str,
        max_messages: u32,
        wait_time_seconds: u32,
    ) -> Result<Vec<RawMessage>, IngestError> {
        let batch = match self
            .queues
            .receive_batch(queue_url, max_messages, wait_time_seconds)
            .await
        {
            Ok(batch) => batch,
            Err(ServiceError::NotFound { resource }) => {
                debug!(%resource, "Queue no longer exists, nothing to ingest");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let queue_name = queue_name_from_url(queue_url);
        let labels = vec![("queue", queue_name.clone())];
        counter!("ingest_messages_received_total", &labels).increment(batch.len() as u64);

        let mut stats = BatchStats::default();

        for raw in &batch {
            self.record(&queue_name, raw, &mut stats).await?;
            self.delete(queue_url, raw, &mut stats).await;
        }

        counter!("ingest_messages_stored_total", &labels).increment(stats.stored);
        counter!("ingest_messages_duplicate_total", &labels).increment(stats.duplicates);
        counter!("ingest_delete_failures_total", &labels).increment(stats.delete_failures);

        debug!(
            received = batch.len(),
            stored = stats.stored,
            duplicates = stats.duplicates,
            delete_failures = stats.delete_failures,
            "Queue batch processed"
        );

        Ok(batch)
    }

    /// One pass over every queue using the refresh batch settings.
    #[instrument(skip(self))]
    pub async fn ingest_from_all_queues(&self) -> Result<RefreshSummary, IngestError> {
        let queue_urls = self.queues.list_queues().await?;
        let mut summary = RefreshSummary::default();

        for queue_url in queue_urls {
            summary.queues_polled += 1;
            match self
                .ingest_from_queue(
                    &queue_url,
                    self.refresh.max_messages,
                    self.refresh.wait_time_seconds,
                )
                .await
            {
                Ok(batch) => summary.messages_received += batch.len() as u64,
                Err(err) => {
                    summary.queues_failed += 1;
                    record_queue_failure(&queue_url, &err);
                }
            }
        }

        info!(
            queues_polled = summary.queues_polled,
            queues_failed = summary.queues_failed,
            messages_received = summary.messages_received,
            "Full refresh completed"
        );

        Ok(summary)
    }

    /// Ingest from every live queue subscribed to `topic_arn`, returning the
    /// union of the received batches.
    ///
    /// Non-queue subscriptions and subscriptions whose queue no longer exists
    /// contribute nothing. An unknown topic yields an empty result.
    #[instrument(skip(self))]
    pub async fn ingest_from_topic(
        &self,
        topic_arn: &str,
        max_messages: u32,
        wait_time_seconds: u32,
    ) -> Result<Vec<RawMessage>, IngestError> {
        let subscriptions = match self.resolver.list_subscriptions(topic_arn).await {
            Ok(subscriptions) => subscriptions,
            Err(ServiceError::NotFound { resource }) => {
                debug!(%resource, "Topic not found, nothing to ingest");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut received = Vec::new();

        for subscription in subscriptions
            .iter()
            .filter(|subscription| subscription.is_queue_delivery())
        {
            let queue_url = match self
                .resolver
                .resolve_queue_endpoint(&subscription.endpoint)
                .await
            {
                Ok(Some(queue_url)) => queue_url,
                Ok(None) => {
                    debug!(
                        endpoint = %subscription.endpoint,
                        "Subscribed queue no longer exists, skipping"
                    );
                    continue;
                }
                Err(err) => {
                    record_queue_failure(&subscription.endpoint, &IngestError::from(err));
                    continue;
                }
            };

            match self
                .ingest_from_queue(&queue_url, max_messages, wait_time_seconds)
                .await
            {
                Ok(batch) => received.extend(batch),
                Err(err) => record_queue_failure(&queue_url, &err),
            }
        }

        Ok(received)
    }

    async fn record(
        &self,
        queue_name: &str,
        raw: &RawMessage,
        stats: &mut BatchStats,
    ) -> Result<(), IngestError> {
        if self.repository.exists(&raw.message_id).await? {
            stats.duplicates += 1;
            debug!(message_id = %raw.message_id, "Message already stored");
            return Ok(());
        }

        let normalized = normalize(raw);
        let new_message = NewMessage {
            topic_arn: normalized.topic_arn,
            subject: normalized.subject,
            attributes: attributes_to_json(&raw.attributes),
            ..NewMessage::new(raw.message_id.clone(), queue_name, normalized.body)
        };

        match self.repository.insert_if_absent(new_message).await? {
            InsertOutcome::Created(model) => {
                stats.stored += 1;
                info!(
                    message_id = %model.message_id,
                    queue = %model.queue_name,
                    topic_arn = model.topic_arn.as_deref().unwrap_or_default(),
                    "Stored message"
                );
            }
            InsertOutcome::AlreadyExists => {
                stats.duplicates += 1;
                debug!(message_id = %raw.message_id, "Message stored concurrently");
            }
        }

        Ok(())
    }

    async fn delete(&self, queue_url: &str, raw: &RawMessage, stats: &mut BatchStats) {
        let Some(receipt_handle) = raw.receipt_handle.as_deref() else {
            debug!(message_id = %raw.message_id, "No receipt handle, cannot delete");
            return;
        };

        if let Err(err) = self.queues.delete_message(queue_url, receipt_handle).await {
            stats.delete_failures += 1;
            warn!(
                message_id = %raw.message_id,
                error = %err,
                "Failed to delete message, it may be redelivered"
            );
        }
    }
}

fn record_queue_failure(queue: &str, err: &IngestError) {
    counter!("ingest_queue_failures_total").increment(1);
    warn!(queue, error = %err, "Queue ingestion failed, continuing with remaining queues");
}
