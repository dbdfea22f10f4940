//! Envelope normalization.
//!
//! Messages delivered through a topic arrive wrapped in a JSON envelope
//! carrying `Message`, `Subject` and `TopicArn`. [`normalize`] decides which
//! topic, subject and body to record for a received message, unwrapping the
//! envelope when there is one and keeping the raw body otherwise.

use serde_json::{Map, Value as JsonValue};

use crate::queue::RawMessage;

const TOPIC_ARN_KEY: &str = "TopicArn";
const SUBJECT_KEY: &str = "Subject";
const MESSAGE_KEY: &str = "Message";

/// Canonical topic, subject and body for a received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    pub topic_arn: Option<String>,
    pub subject: Option<String>,
    pub body: String,
}

/// Normalize a received message.
///
/// A `TopicArn` message attribute wins over the envelope's `TopicArn`; the
/// envelope is only consulted when the attribute is absent. A body that is not
/// a JSON object, or an object without `Message`, is stored verbatim.
pub fn normalize(raw: &RawMessage) -> NormalizedMessage {
    let attribute_topic = raw
        .attributes
        .get(TOPIC_ARN_KEY)
        .and_then(|attribute| attribute.string_value())
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let Some(envelope) = parse_object(&raw.body) else {
        return NormalizedMessage {
            topic_arn: attribute_topic,
            subject: None,
            body: raw.body.clone(),
        };
    };

    let topic_arn = attribute_topic.or_else(|| non_empty_string(&envelope, TOPIC_ARN_KEY));
    let subject = non_empty_string(&envelope, SUBJECT_KEY);
    let body = match envelope.get(MESSAGE_KEY) {
        Some(JsonValue::String(message)) => message.clone(),
        None | Some(JsonValue::Null) => raw.body.clone(),
        Some(other) => other.to_string(),
    };

    NormalizedMessage {
        topic_arn,
        subject,
        body,
    }
}

fn parse_object(body: &str) -> Option<Map<String, JsonValue>> {
    match serde_json::from_str::<JsonValue>(body) {
        Ok(JsonValue::Object(map)) => Some(map),
        _ => None,
    }
}

fn non_empty_string(envelope: &Map<String, JsonValue>, key: &str) -> Option<String> {
    envelope
        .get(key)
        .and_then(JsonValue::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MessageAttribute;

    fn message(body: &str) -> RawMessage {
        RawMessage::new("m-1", "rh-1", body)
    }

    #[test]
    fn test_attribute_topic_wins_over_envelope() {
        let raw = message(r#"{"TopicArn": "B", "Message": "x"}"#)
            .with_attribute("TopicArn", MessageAttribute::string("A"));

        let normalized = normalize(&raw);

        assert_eq!(normalized.topic_arn.as_deref(), Some("A"));
        assert_eq!(normalized.body, "x");
        assert_eq!(normalized.subject, None);
    }

    #[test]
    fn test_envelope_is_unwrapped() {
        let raw = message(
            r#"{"Type":"Notification","TopicArn":"arn:aws:sns:us-east-1:1:alerts","Subject":"Disk","Message":"disk at 91%"}"#,
        );

        let normalized = normalize(&raw);

        assert_eq!(
            normalized,
            NormalizedMessage {
                topic_arn: Some("arn:aws:sns:us-east-1:1:alerts".to_string()),
                subject: Some("Disk".to_string()),
                body: "disk at 91%".to_string(),
            }
        );
    }

    #[test]
    fn test_json_without_message_keeps_raw_body() {
        let body = r#"{"test": true, "timestamp": 123}"#;

        let normalized = normalize(&message(body));

        assert_eq!(normalized.body, body);
        assert_eq!(normalized.topic_arn, None);
        assert_eq!(normalized.subject, None);
    }

    #[test]
    fn test_non_json_body_passthrough() {
        let normalized = normalize(
            &message("hello world").with_attribute("TopicArn", MessageAttribute::string("A")),
        );

        assert_eq!(normalized.body, "hello world");
        assert_eq!(normalized.topic_arn.as_deref(), Some("A"));
        assert_eq!(normalized.subject, None);
    }

    #[test]
    fn test_non_object_json_passthrough() {
        for body in ["[1, 2, 3]", "\"quoted\"", "42", "null"] {
            let normalized = normalize(&message(body));
            assert_eq!(normalized.body, body);
            assert_eq!(normalized.topic_arn, None);
        }
    }

    #[test]
    fn test_non_string_message_values() {
        let null_message = r#"{"Message": null, "Subject": "s"}"#;
        let normalized = normalize(&message(null_message));
        assert_eq!(normalized.body, null_message);
        assert_eq!(normalized.subject.as_deref(), Some("s"));

        let nested = normalize(&message(r#"{"Message": {"level": "warn"}}"#));
        assert_eq!(nested.body, r#"{"level":"warn"}"#);
    }

    #[test]
    fn test_empty_or_binary_topic_attribute_falls_back_to_envelope() {
        let envelope = r#"{"TopicArn": "B", "Message": "x", "Subject": ""}"#;

        let empty = normalize(
            &message(envelope).with_attribute("TopicArn", MessageAttribute::string("")),
        );
        assert_eq!(empty.topic_arn.as_deref(), Some("B"));
        assert_eq!(empty.subject, None);

        let binary = normalize(
            &message(envelope).with_attribute("TopicArn", MessageAttribute::binary(b"A".to_vec())),
        );
        assert_eq!(binary.topic_arn.as_deref(), Some("B"));
    }
}
