//! Queue client adapter backed by `aws-sdk-sqs`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::types::{Message, MessageAttributeValue};

use super::aws::map_sdk_error;
use super::{AttributeValue, MessageAttribute, QueueClient, RawMessage};
use crate::error::ServiceError;

#[derive(Debug, Clone)]
pub struct SqsQueueClient {
    client: Client,
}

impl SqsQueueClient {
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
impl QueueClient for SqsQueueClient {
    async fn list_queues(&self) -> Result<Vec<String>, ServiceError> {
        let mut queues = Vec::new();
        let mut next_token = None;

        loop {
            let output = self
                .client
                .list_queues()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| map_sdk_error("ListQueues", err))?;

            if let Some(mut urls) = output.queue_urls {
                queues.append(&mut urls);
            }

            match output.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        Ok(queues)
    }

    async fn receive_batch(
        &self,
        queue_url: &str,
        max_messages: u32,
        wait_time_seconds: u32,
    ) -> Result<Vec<RawMessage>, ServiceError> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(max_messages as i32)
            .wait_time_seconds(wait_time_seconds as i32)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|err| map_sdk_error("ReceiveMessage", err))?;

        let messages = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|message| raw_message(queue_url, message))
            .collect();

        Ok(messages)
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), ServiceError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|err| map_sdk_error("DeleteMessage", err))?;

        Ok(())
    }

    async fn queue_url(&self, queue_name: &str) -> Result<Option<String>, ServiceError> {
        match self.client.get_queue_url().queue_name(queue_name).send().await {
            Ok(output) => Ok(output.queue_url),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_queue_does_not_exist()) =>
            {
                tracing::debug!(queue_name, "Queue does not exist");
                Ok(None)
            }
            Err(err) => Err(map_sdk_error("GetQueueUrl", err)),
        }
    }
}

fn raw_message(queue_url: &str, message: Message) -> Option<RawMessage> {
    let Some(message_id) = message.message_id else {
        tracing::warn!(queue_url, "Skipping received message without an id");
        return None;
    };

    let attributes: BTreeMap<String, MessageAttribute> = message
        .message_attributes
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| message_attribute(&value).map(|attribute| (name, attribute)))
        .collect();

    Some(RawMessage {
        message_id,
        receipt_handle: message.receipt_handle,
        body: message.body.unwrap_or_default(),
        attributes,
    })
}

/// Maps by data type prefix; custom suffixes such as `Number.float` are kept.
fn message_attribute(value: &MessageAttributeValue) -> Option<MessageAttribute> {
    let data_type = value.data_type();

    let typed = if data_type.starts_with("Binary") {
        value
            .binary_value()
            .map(|blob| AttributeValue::Binary(blob.as_ref().to_vec()))
    } else if data_type.starts_with("Number") {
        value
            .string_value()
            .map(|number| AttributeValue::Number(number.to_string()))
    } else {
        value
            .string_value()
            .map(|text| AttributeValue::String(text.to_string()))
    };

    typed.map(|value| MessageAttribute {
        data_type: data_type.to_string(),
        value,
    })
}
