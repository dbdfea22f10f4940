//! Dashboard-facing operations.
//!
//! Read queries never ingest. Callers that want fresh data invoke
//! [`DashboardService::trigger_full_refresh`] or
//! [`DashboardService::refresh_topic`] explicitly before reading.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::IngestError;
use crate::ingest::{IngestionPipeline, RefreshSummary};
use crate::models::message;
use crate::queue::queue_name_from_url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct QueueSummary {
    pub url: String,
    pub name: String,
    /// Stored messages received from this queue
    pub message_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TopicSummary {
    pub arn: String,
    /// Stored messages published through this topic
    pub message_count: u64,
}

#[derive(Clone)]
pub struct DashboardService {
    pipeline: IngestionPipeline,
}

impl DashboardService {
    pub fn new(pipeline: IngestionPipeline) -> Self {
        Self { pipeline }
    }

    pub async fn list_queues_with_counts(&self) -> Result<Vec<QueueSummary>, IngestError> {
        let queue_urls = self.pipeline.list_queues().await?;
        let repository = self.pipeline.repository();

        let mut summaries = Vec::with_capacity(queue_urls.len());
        for url in queue_urls {
            let name = queue_name_from_url(&url);
            let message_count = repository.count_by_queue(&name).await?;
            summaries.push(QueueSummary {
                url,
                name,
                message_count,
            });
        }

        Ok(summaries)
    }

    pub async fn list_messages_for_queue(
        &self,
        queue_name: &str,
    ) -> Result<Vec<message::Model>, IngestError> {
        Ok(self.pipeline.repository().list_by_queue(queue_name).await?)
    }

    pub async fn list_topics_with_counts(&self) -> Result<Vec<TopicSummary>, IngestError> {
        let topics = self.pipeline.resolver().list_topics().await?;
        let repository = self.pipeline.repository();

        let mut summaries = Vec::with_capacity(topics.len());
        for arn in topics {
            let message_count = repository.count_by_topic(&arn).await?;
            summaries.push(TopicSummary { arn, message_count });
        }

        Ok(summaries)
    }

    pub async fn list_messages_for_topic(
        &self,
        topic_arn: &str,
    ) -> Result<Vec<message::Model>, IngestError> {
        Ok(self.pipeline.repository().list_by_topic(topic_arn).await?)
    }

    pub async fn message_detail(&self, id: Uuid) -> Result<Option<message::Model>, IngestError> {
        Ok(self.pipeline.repository().find_by_id(id).await?)
    }

    /// Ingest from every queue with the refresh batch settings.
    pub async fn trigger_full_refresh(&self) -> Result<RefreshSummary, IngestError> {
        self.pipeline.ingest_from_all_queues().await
    }

    /// Ingest from the queues subscribed to `topic_arn`; returns the number of
    /// messages received.
    pub async fn refresh_topic(&self, topic_arn: &str) -> Result<usize, IngestError> {
        let settings = self.pipeline.refresh_settings();
        let received = self
            .pipeline
            .ingest_from_topic(topic_arn, settings.max_messages, settings.wait_time_seconds)
            .await?;
        Ok(received.len())
    }
}
