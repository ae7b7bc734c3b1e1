//! Backends that supply the runtime identity and bearer credential
//!
//! The authenticator talks to these through two small traits so the AWS
//! clients can be swapped for fakes in tests.

use crate::auth::error::AcquisitionError;
use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext as SecretsErrorContext;
use aws_sdk_ssm::error::DisplayErrorContext as SsmErrorContext;
use tracing::debug;

/// Looks up a named configuration parameter
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParameterSource: Send + Sync {
    async fn get_parameter(&self, name: &str) -> Result<String, AcquisitionError>;
}

/// Fetches a secret's string value by id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn get_secret_string(&self, secret_id: &str) -> Result<String, AcquisitionError>;
}

/// SSM Parameter Store backend
#[derive(Debug, Clone)]
pub struct SsmParameterSource {
    client: aws_sdk_ssm::Client,
}

impl SsmParameterSource {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ssm::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl ParameterSource for SsmParameterSource {
    async fn get_parameter(&self, name: &str) -> Result<String, AcquisitionError> {
        debug!("Reading SSM parameter {}", name);
        let output = self
            .client
            .get_parameter()
            .name(name)
            .send()
            .await
            .map_err(|e| AcquisitionError::parameter(name, SsmErrorContext(&e).to_string()))?;

        output
            .parameter()
            .and_then(|parameter| parameter.value())
            .map(str::to_string)
            .ok_or_else(|| AcquisitionError::parameter(name, "parameter has no value"))
    }
}

/// Secrets Manager backend
#[derive(Debug, Clone)]
pub struct SecretsManagerSource {
    client: aws_sdk_secretsmanager::Client,
}

impl SecretsManagerSource {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_secretsmanager::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl SecretSource for SecretsManagerSource {
    async fn get_secret_string(&self, secret_id: &str) -> Result<String, AcquisitionError> {
        debug!("Fetching secret {}", secret_id);
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| AcquisitionError::secret(secret_id, SecretsErrorContext(&e).to_string()))?;

        output
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| AcquisitionError::secret(secret_id, "secret has no string value"))
    }
}
