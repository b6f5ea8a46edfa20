//! Lazily initialised parameter-store client.

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

#[derive(Debug, Error)]
pub enum ClientInitError {
    /// Neither `AWS_REGION` nor the SDK's provider chain yielded a region.
    #[error("no AWS region configured for the parameter store client")]
    MissingRegion,
}

/// Parameter-store client built on first use and shared afterwards.
///
/// Construction happens at most once per process. Concurrent first callers
/// wait on the same initialisation; a failed attempt is retried by the next
/// caller rather than cached.
#[derive(Debug, Default)]
pub struct ParameterStoreClient {
    region: Option<String>,
    client: OnceCell<aws_sdk_ssm::Client>,
}

impl ParameterStoreClient {
    pub fn new(region: Option<String>) -> Self {
        Self {
            region,
            client: OnceCell::new(),
        }
    }

    /// Wrap an already built client.
    #[cfg(test)]
    pub fn from_client(client: aws_sdk_ssm::Client) -> Self {
        Self {
            region: None,
            client: OnceCell::new_with(Some(client)),
        }
    }

    #[cfg(test)]
    pub fn is_initialised(&self) -> bool {
        self.client.initialized()
    }

    /// Borrow the client, loading the SDK configuration on first call.
    ///
    /// # Errors
    ///
    /// Returns [`ClientInitError::MissingRegion`] if no region can be resolved.
    pub async fn get(&self) -> Result<&aws_sdk_ssm::Client, ClientInitError> {
        self.client
            .get_or_try_init(|| async {
                // One attempt per fetch; throttling and transport errors surface
                // to the caller as KeyStoreUnavailable.
                let mut loader = aws_config::defaults(BehaviorVersion::latest())
                    .retry_config(RetryConfig::disabled());
                if let Some(region) = self.region.as_ref().filter(|r| !r.trim().is_empty()) {
                    loader = loader.region(Region::new(region.clone()));
                }
                let sdk = loader.load().await;
                let region = sdk.region().ok_or(ClientInitError::MissingRegion)?;
                info!(region = %region, "parameter store client initialised");
                Ok(aws_sdk_ssm::Client::new(&sdk))
            })
            .await
    }
}
