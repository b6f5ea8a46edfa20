//! [`SsmKeySource`]: private keys stored as SecureString parameters.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_ssm::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ssm::operation::get_parameter::GetParameterError;
use tracing::debug;

use super::{KeyId, KeyMaterialSource, KeySourceError, PrivateKeyPem};
use crate::aws::ParameterStoreClient;

/// Error codes the parameter store returns when the caller may not read the key.
const ACCESS_DENIED_CODES: [&str; 4] = [
    "AccessDeniedException",
    "InvalidKeyId",
    "UnrecognizedClientException",
    "ExpiredTokenException",
];

/// Reads `{prefix}/{key_id}/private-key` with server-side decryption.
#[derive(Debug, Clone)]
pub struct SsmKeySource {
    client: Arc<ParameterStoreClient>,
    prefix: String,
}

impl SsmKeySource {
    pub fn new(client: Arc<ParameterStoreClient>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl KeyMaterialSource for SsmKeySource {
    async fn fetch(&self, key_id: &KeyId) -> Result<PrivateKeyPem, KeySourceError> {
        let path = key_id.parameter_path(&self.prefix);
        let client = self
            .client
            .get()
            .await
            .map_err(|e| KeySourceError::Client(e.to_string()))?;

        let output = client
            .get_parameter()
            .name(&path)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| classify(&path, e))?;

        let value = output
            .parameter
            .and_then(|p| p.value)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| KeySourceError::NotFound { path: path.clone() })?;

        debug!(parameter = %path, "private key fetched");
        Ok(PrivateKeyPem::new(value))
    }
}

/// Map a `GetParameter` failure onto the key-source taxonomy.
fn classify(path: &str, err: SdkError<GetParameterError>) -> KeySourceError {
    match &err {
        SdkError::ServiceError(context) => {
            let service_err = context.err();
            if service_err.is_parameter_not_found() || service_err.is_parameter_version_not_found() {
                return KeySourceError::NotFound {
                    path: path.to_owned(),
                };
            }
            match service_err.code() {
                Some(code) if ACCESS_DENIED_CODES.contains(&code) => KeySourceError::AccessDenied {
                    path: path.to_owned(),
                    code: code.to_owned(),
                },
                _ => KeySourceError::Unavailable(DisplayErrorContext(&err).to_string()),
            }
        }
        SdkError::ConstructionFailure(_) => {
            KeySourceError::Client(DisplayErrorContext(&err).to_string())
        }
        _ => KeySourceError::Unavailable(DisplayErrorContext(&err).to_string()),
    }
}
