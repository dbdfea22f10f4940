//! Test utilities: in-memory store and an in-memory queue/topic service.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};

use sqs_monitor::config::BatchSettings;
use sqs_monitor::error::ServiceError;
use sqs_monitor::ingest::IngestionPipeline;
use sqs_monitor::queue::{
    QueueClient, RawMessage, Subscription, TopicClient, TopicSubscriptionResolver,
};
use sqs_monitor::repositories::MessageRepository;

pub const ACCOUNT_URL: &str = "https://sqs.us-east-1.amazonaws.com/123456789012";
pub const ACCOUNT_ARN: &str = "arn:aws:sqs:us-east-1:123456789012";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    Ok(Arc::new(setup_test_db().await?))
}

pub fn queue_url(name: &str) -> String {
    format!("{ACCOUNT_URL}/{name}")
}

pub fn queue_arn(name: &str) -> String {
    format!("{ACCOUNT_ARN}:{name}")
}

pub fn queue_subscription(queue_name: &str) -> Subscription {
    Subscription {
        protocol: "sqs".to_string(),
        endpoint: queue_arn(queue_name),
        subscription_arn: None,
    }
}

#[derive(Default)]
struct FakeState {
    /// Queue URL and its undeleted messages, in listing order.
    queues: Vec<(String, Vec<RawMessage>)>,
    topics: Vec<(String, Vec<Subscription>)>,
    failing_receives: HashSet<String>,
    misconfigured_receives: HashSet<String>,
    failing_lookups: HashSet<String>,
    deleted_queues: HashSet<String>,
    fail_list_queues: bool,
    fail_deletes: bool,
    receive_calls: Vec<(String, u32, u32)>,
    delete_calls: Vec<(String, String)>,
}

/// In-memory stand-in for the queue and pub/sub services.
///
/// Received messages stay queued until deleted, so a failed delete leads to
/// redelivery on the next receive.
#[derive(Default)]
pub struct FakeQueueService {
    state: Mutex<FakeState>,
}

impl FakeQueueService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    pub fn add_queue(&self, name: &str, messages: Vec<RawMessage>) -> String {
        let url = queue_url(name);
        self.state().queues.push((url.clone(), messages));
        url
    }

    pub fn enqueue(&self, name: &str, message: RawMessage) {
        let url = queue_url(name);
        let mut state = self.state();
        if let Some((_, messages)) = state.queues.iter_mut().find(|(u, _)| *u == url) {
            messages.push(message);
        }
    }

    pub fn add_topic(&self, arn: &str, subscriptions: Vec<Subscription>) {
        self.state().topics.push((arn.to_string(), subscriptions));
    }

    pub fn fail_receive(&self, name: &str) {
        self.state().failing_receives.insert(queue_url(name));
    }

    pub fn misconfigure_receive(&self, name: &str) {
        self.state().misconfigured_receives.insert(queue_url(name));
    }

    pub fn fail_lookup(&self, name: &str) {
        self.state().failing_lookups.insert(name.to_string());
    }

    /// Keeps the queue in listings but answers receives with not-found, as
    /// when a queue is deleted between listing and polling.
    pub fn delete_queue_after_listing(&self, name: &str) {
        self.state().deleted_queues.insert(queue_url(name));
    }

    pub fn fail_list_queues(&self) {
        self.state().fail_list_queues = true;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state().fail_deletes = fail;
    }

    pub fn receive_calls(&self) -> Vec<(String, u32, u32)> {
        self.state().receive_calls.clone()
    }

    pub fn delete_calls(&self) -> Vec<(String, String)> {
        self.state().delete_calls.clone()
    }

    pub fn polled_queues(&self) -> BTreeSet<String> {
        self.state()
            .receive_calls
            .iter()
            .map(|(url, _, _)| url.clone())
            .collect()
    }

    pub fn pending(&self, name: &str) -> usize {
        let url = queue_url(name);
        self.state()
            .queues
            .iter()
            .find(|(u, _)| *u == url)
            .map(|(_, messages)| messages.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl QueueClient for FakeQueueService {
    async fn list_queues(&self) -> Result<Vec<String>, ServiceError> {
        let state = self.state();
        if state.fail_list_queues {
            return Err(ServiceError::transient("ListQueues", "connection reset"));
        }
        Ok(state.queues.iter().map(|(url, _)| url.clone()).collect())
    }

    async fn receive_batch(
        &self,
        queue_url: &str,
        max_messages: u32,
        wait_time_seconds: u32,
    ) -> Result<Vec<RawMessage>, ServiceError> {
        let mut state = self.state();
        state
            .receive_calls
            .push((queue_url.to_string(), max_messages, wait_time_seconds));

        if state.misconfigured_receives.contains(queue_url) {
            return Err(ServiceError::Configuration {
                details: "no credentials".to_string(),
            });
        }
        if state.failing_receives.contains(queue_url) {
            return Err(ServiceError::transient("ReceiveMessage", "throttled"));
        }

        let live = state
            .queues
            .iter()
            .find(|(url, _)| url == queue_url && !state.deleted_queues.contains(url));
        match live {
            Some((_, messages)) => Ok(messages
                .iter()
                .take(max_messages as usize)
                .cloned()
                .collect()),
            None => Err(ServiceError::NotFound {
                resource: format!("queue {queue_url}"),
            }),
        }
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.state();
        state
            .delete_calls
            .push((queue_url.to_string(), receipt_handle.to_string()));

        if state.fail_deletes {
            return Err(ServiceError::transient("DeleteMessage", "receipt handle expired"));
        }

        if let Some((_, messages)) = state.queues.iter_mut().find(|(url, _)| url == queue_url) {
            messages.retain(|m| m.receipt_handle.as_deref() != Some(receipt_handle));
        }
        Ok(())
    }

    async fn queue_url(&self, queue_name: &str) -> Result<Option<String>, ServiceError> {
        let state = self.state();
        if state.failing_lookups.contains(queue_name) {
            return Err(ServiceError::transient("GetQueueUrl", "timeout"));
        }
        let url = queue_url(queue_name);
        Ok(state
            .queues
            .iter()
            .any(|(u, _)| *u == url)
            .then_some(url))
    }
}

#[async_trait]
impl TopicClient for FakeQueueService {
    async fn list_topics(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self
            .state()
            .topics
            .iter()
            .map(|(arn, _)| arn.clone())
            .collect())
    }

    async fn list_subscriptions(
        &self,
        topic_arn: &str,
    ) -> Result<Vec<Subscription>, ServiceError> {
        self.state()
            .topics
            .iter()
            .find(|(arn, _)| arn == topic_arn)
            .map(|(_, subscriptions)| subscriptions.clone())
            .ok_or_else(|| ServiceError::NotFound {
                resource: format!("topic {topic_arn}"),
            })
    }
}

/// Pipeline wired to `fake` for both services, refresh batch of 10 with no wait.
pub fn pipeline(fake: &Arc<FakeQueueService>, db: Arc<DatabaseConnection>) -> IngestionPipeline {
    let resolver = TopicSubscriptionResolver::new(fake.clone(), fake.clone());
    IngestionPipeline::new(
        fake.clone(),
        resolver,
        MessageRepository::new(db),
        BatchSettings::new(10, 0),
    )
}
