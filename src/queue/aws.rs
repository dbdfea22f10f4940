//! Shared AWS SDK configuration and error classification.

use std::error::Error as StdError;
use std::fmt::Debug;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_sqs::config::{Credentials, Region};
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use crate::config::AwsConfig;
use crate::error::ServiceError;

const CREDENTIALS_PROVIDER_NAME: &str = "sqs-monitor-config";

/// Error codes that mean the configured credentials are unusable.
const CREDENTIAL_ERROR_CODES: &[&str] = &[
    "InvalidClientTokenId",
    "UnrecognizedClientException",
    "SignatureDoesNotMatch",
    "MissingAuthenticationToken",
    "ExpiredToken",
];

/// Error codes for a queue that was deleted or never existed.
const MISSING_QUEUE_CODES: &[&str] = &[
    "QueueDoesNotExist",
    "AWS.SimpleQueueService.NonExistentQueue",
];

/// Builds the SDK configuration shared by the queue and pub/sub clients.
///
/// Static credentials from `config` take precedence; otherwise the SDK's
/// default provider chain resolves them.
pub async fn load_sdk_config(config: &AwsConfig) -> SdkConfig {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

    if let Some((access_key_id, secret_access_key)) = config.static_credentials() {
        loader = loader.credentials_provider(Credentials::new(
            access_key_id,
            secret_access_key,
            config.session_token.clone(),
            None,
            CREDENTIALS_PROVIDER_NAME,
        ));
    }

    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    loader.load().await
}

/// Classifies an SDK failure. Request construction and credential rejections
/// are configuration errors, a missing queue is not-found, and everything else
/// is transient.
pub(crate) fn map_sdk_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> ServiceError
where
    E: StdError + ProvideErrorMetadata + Send + Sync + 'static,
    R: Debug,
{
    let details = DisplayErrorContext(&err).to_string();

    if matches!(err, SdkError::ConstructionFailure(_)) {
        return ServiceError::Configuration { details };
    }

    match err.code() {
        Some(code) if CREDENTIAL_ERROR_CODES.contains(&code) => {
            return ServiceError::Configuration { details };
        }
        Some(code) if MISSING_QUEUE_CODES.contains(&code) => {
            return ServiceError::NotFound {
                resource: format!("queue ({operation})"),
            };
        }
        _ => {}
    }

    ServiceError::transient(operation, details)
}
