//! Queue and pub/sub service abstractions.
//!
//! The ingestion pipeline talks to the managed services only through the
//! [`QueueClient`] and [`TopicClient`] traits; the AWS-backed implementations
//! live in [`sqs`] and [`sns`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Map, Value as JsonValue, json};

use crate::error::ServiceError;

pub mod aws;
pub mod sns;
pub mod sqs;

pub use sns::SnsTopicClient;
pub use sqs::SqsQueueClient;

/// Subscription protocol tag for queue delivery.
pub const QUEUE_PROTOCOL: &str = "sqs";

/// Typed value of a message attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    String(String),
    /// Numbers travel as their decimal string representation.
    Number(String),
    Binary(Vec<u8>),
}

/// A message attribute with its declared data type (`String`, `Number.float`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttribute {
    pub data_type: String,
    pub value: AttributeValue,
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            value: AttributeValue::String(value.into()),
        }
    }

    pub fn number(value: impl Into<String>) -> Self {
        Self {
            data_type: "Number".to_string(),
            value: AttributeValue::Number(value.into()),
        }
    }

    pub fn binary(value: impl Into<Vec<u8>>) -> Self {
        Self {
            data_type: "Binary".to_string(),
            value: AttributeValue::Binary(value.into()),
        }
    }

    /// The attribute's string value, if it carries one.
    pub fn string_value(&self) -> Option<&str> {
        match &self.value {
            AttributeValue::String(value) | AttributeValue::Number(value) => Some(value),
            AttributeValue::Binary(_) => None,
        }
    }

    /// Queue-service JSON shape, binary values base64-encoded.
    pub fn to_json(&self) -> JsonValue {
        match &self.value {
            AttributeValue::String(value) | AttributeValue::Number(value) => {
                json!({ "DataType": self.data_type, "StringValue": value })
            }
            AttributeValue::Binary(bytes) => {
                json!({ "DataType": self.data_type, "BinaryValue": STANDARD.encode(bytes) })
            }
        }
    }
}

/// Renders an attribute map for storage; an empty map is stored as absent.
pub fn attributes_to_json(attributes: &BTreeMap<String, MessageAttribute>) -> Option<JsonValue> {
    if attributes.is_empty() {
        return None;
    }

    let map: Map<String, JsonValue> = attributes
        .iter()
        .map(|(name, attribute)| (name.clone(), attribute.to_json()))
        .collect();
    Some(JsonValue::Object(map))
}

/// One delivery of a message as returned by a receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub message_id: String,
    /// Single-use token required to delete this delivery.
    pub receipt_handle: Option<String>,
    pub body: String,
    pub attributes: BTreeMap<String, MessageAttribute>,
}

impl RawMessage {
    pub fn new(
        message_id: impl Into<String>,
        receipt_handle: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            receipt_handle: Some(receipt_handle.into()),
            body: body.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: MessageAttribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }
}

/// A topic subscription: delivery protocol plus endpoint identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub protocol: String,
    /// Queue ARN for queue deliveries, URL or address for other protocols.
    pub endpoint: String,
    pub subscription_arn: Option<String>,
}

impl Subscription {
    pub fn is_queue_delivery(&self) -> bool {
        self.protocol.eq_ignore_ascii_case(QUEUE_PROTOCOL)
    }
}

/// Queue service operations used by the ingestion pipeline.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Every queue endpoint visible to the configured account.
    async fn list_queues(&self) -> Result<Vec<String>, ServiceError>;

    /// Long-poll for up to `max_messages`, waiting at most `wait_time_seconds`.
    /// An empty batch means the wait elapsed without deliveries.
    async fn receive_batch(
        &self,
        queue_url: &str,
        max_messages: u32,
        wait_time_seconds: u32,
    ) -> Result<Vec<RawMessage>, ServiceError>;

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str)
    -> Result<(), ServiceError>;

    /// Endpoint for a queue name, or `None` when the queue does not exist.
    async fn queue_url(&self, queue_name: &str) -> Result<Option<String>, ServiceError>;
}

/// Pub/sub service operations used to scope ingestion to a topic.
#[async_trait]
pub trait TopicClient: Send + Sync {
    async fn list_topics(&self) -> Result<Vec<String>, ServiceError>;

    /// All subscriptions of `topic_arn`, following pagination to the end.
    async fn list_subscriptions(&self, topic_arn: &str)
    -> Result<Vec<Subscription>, ServiceError>;
}

/// Maps topics to the live queues subscribed to them.
#[derive(Clone)]
pub struct TopicSubscriptionResolver {
    topics: Arc<dyn TopicClient>,
    queues: Arc<dyn QueueClient>,
}

impl TopicSubscriptionResolver {
    pub fn new(topics: Arc<dyn TopicClient>, queues: Arc<dyn QueueClient>) -> Self {
        Self { topics, queues }
    }

    pub async fn list_topics(&self) -> Result<Vec<String>, ServiceError> {
        self.topics.list_topics().await
    }

    pub async fn list_subscriptions(
        &self,
        topic_arn: &str,
    ) -> Result<Vec<Subscription>, ServiceError> {
        self.topics.list_subscriptions(topic_arn).await
    }

    /// Pollable endpoint for a subscribed queue's ARN. A deleted queue yields
    /// `Ok(None)`.
    pub async fn resolve_queue_endpoint(
        &self,
        queue_arn: &str,
    ) -> Result<Option<String>, ServiceError> {
        let Some(queue_name) = queue_name_from_arn(queue_arn) else {
            tracing::debug!(queue_arn, "Subscription endpoint carries no queue name");
            return Ok(None);
        };

        match self.queues.queue_url(queue_name).await {
            Err(ServiceError::NotFound { .. }) => Ok(None),
            other => other,
        }
    }
}

/// Short queue name: the last non-empty path segment of the endpoint.
pub fn queue_name_from_url(queue_url: &str) -> String {
    let from_url = url::Url::parse(queue_url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(str::to_string))
    });

    from_url.unwrap_or_else(|| {
        queue_url
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(queue_url)
            .to_string()
    })
}

/// Queue name encoded in a queue ARN: the last `:`-separated segment.
pub fn queue_name_from_arn(queue_arn: &str) -> Option<&str> {
    queue_arn
        .rsplit(':')
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
}
