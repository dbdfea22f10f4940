//! Topic listing and subscription lookup backed by `aws-sdk-sns`.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sns::Client;

use super::aws::map_sdk_error;
use super::{Subscription, TopicClient};
use crate::error::ServiceError;

#[derive(Debug, Clone)]
pub struct SnsTopicClient {
    client: Client,
}

impl SnsTopicClient {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TopicClient for SnsTopicClient {
    async fn list_topics(&self) -> Result<Vec<String>, ServiceError> {
        let mut topics = Vec::new();
        let mut next_token = None;

        loop {
            let output = self
                .client
                .list_topics()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| map_sdk_error("ListTopics", err))?;

            topics.extend(
                output
                    .topics
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|topic| topic.topic_arn),
            );

            match output.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        Ok(topics)
    }

    async fn list_subscriptions(
        &self,
        topic_arn: &str,
    ) -> Result<Vec<Subscription>, ServiceError> {
        let mut subscriptions = Vec::new();
        let mut next_token = None;

        loop {
            let output = match self
                .client
                .list_subscriptions_by_topic()
                .topic_arn(topic_arn)
                .set_next_token(next_token.take())
                .send()
                .await
            {
                Ok(output) => output,
                Err(err)
                    if err
                        .as_service_error()
                        .is_some_and(|service_err| service_err.is_not_found_exception()) =>
                {
                    return Err(ServiceError::NotFound {
                        resource: format!("topic {topic_arn}"),
                    });
                }
                Err(err) => return Err(map_sdk_error("ListSubscriptionsByTopic", err)),
            };

            for subscription in output.subscriptions.unwrap_or_default() {
                let (Some(protocol), Some(endpoint)) =
                    (subscription.protocol, subscription.endpoint)
                else {
                    continue;
                };
                subscriptions.push(Subscription {
                    protocol,
                    endpoint,
                    subscription_arn: subscription.subscription_arn,
                });
            }

            match output.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        Ok(subscriptions)
    }
}
