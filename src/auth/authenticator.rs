//! Runtime endpoint and bearer credential resolution
//!
//! [`AwsAuthenticator`] turns two pieces of stored configuration into
//! everything the client needs to reach a remote MCP runtime:
//!
//! - the runtime ARN, read from SSM Parameter Store, becomes the endpoint URL
//! - the bearer token, read from Secrets Manager (or the local token cache),
//!   becomes the `authorization` header
//!
//! # Usage
//!
//! ```no_run
//! use agentcore_mcp::auth::AwsAuthenticator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let authenticator = AwsAuthenticator::from_aws(Some("us-west-2".to_string()), None).await?;
//! let arn = authenticator
//!     .resolve_endpoint_identity("/mcp_server/runtime/agent_arn")
//!     .await?;
//! let token = authenticator
//!     .acquire_credential("mcp_server/cognito/credentials")
//!     .await?;
//!
//! let url = authenticator.build_url(&arn);
//! let headers = authenticator.build_headers(&token);
//! # Ok(())
//! # }
//! ```

use crate::auth::error::AcquisitionError;
use crate::auth::jwt;
use crate::auth::sources::{
    ParameterSource, SecretSource, SecretsManagerSource, SsmParameterSource,
};
use crate::auth::token_cache::{TokenCache, DEFAULT_NOMINAL_LIFETIME};
use crate::mcp::headers;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Default SSM parameter holding the runtime ARN
pub const DEFAULT_SSM_PARAMETER: &str = "/mcp_server/runtime/agent_arn";

/// Default Secrets Manager id holding the bearer token envelope
pub const DEFAULT_SECRET_ID: &str = "mcp_server/cognito/credentials";

/// Shape of the secret value: `{"bearer_token": "..."}`
#[derive(Debug, Deserialize)]
struct CredentialEnvelope {
    bearer_token: String,
}

/// Resolves the runtime endpoint and bearer credential from AWS
pub struct AwsAuthenticator {
    region: String,
    parameters: Arc<dyn ParameterSource>,
    secrets: Arc<dyn SecretSource>,
    token_cache: Option<TokenCache>,
    nominal_lifetime: Duration,
}

impl AwsAuthenticator {
    pub fn new(
        region: impl Into<String>,
        parameters: Arc<dyn ParameterSource>,
        secrets: Arc<dyn SecretSource>,
    ) -> Self {
        Self {
            region: region.into(),
            parameters,
            secrets,
            token_cache: None,
            nominal_lifetime: DEFAULT_NOMINAL_LIFETIME,
        }
    }

    /// Check `cache` before going to Secrets Manager and store fresh tokens in it
    pub fn with_token_cache(mut self, cache: TokenCache) -> Self {
        self.token_cache = Some(cache);
        self
    }

    /// Lifetime assumed for cached tokens that carry no `exp` claim
    pub fn with_nominal_lifetime(mut self, lifetime: Duration) -> Self {
        self.nominal_lifetime = lifetime;
        self
    }

    /// Build an authenticator backed by the AWS SDK
    ///
    /// With `region` unset the default provider chain decides; failing to
    /// find any region is a configuration error.
    pub async fn from_aws(
        region: Option<String>,
        token_cache: Option<TokenCache>,
    ) -> Result<Self, AcquisitionError> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let sdk_config = loader.load().await;

        let region = sdk_config
            .region()
            .map(|r| r.as_ref().to_string())
            .ok_or_else(|| {
                AcquisitionError::configuration(
                    "no AWS region configured; pass --region or set AWS_REGION",
                )
            })?;
        info!("Using AWS region: {}", region);

        let mut authenticator = Self::new(
            region,
            Arc::new(SsmParameterSource::new(&sdk_config)),
            Arc::new(SecretsManagerSource::new(&sdk_config)),
        );
        authenticator.token_cache = token_cache;
        Ok(authenticator)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn token_cache(&self) -> Option<&TokenCache> {
        self.token_cache.as_ref()
    }

    /// Read the runtime ARN from the parameter store
    pub async fn resolve_endpoint_identity(
        &self,
        parameter_name: &str,
    ) -> Result<String, AcquisitionError> {
        match self.parameters.get_parameter(parameter_name).await {
            Ok(arn) => {
                info!("Resolved runtime ARN: {}", arn);
                Ok(arn)
            }
            Err(e) => {
                error!("Failed to resolve runtime ARN: {}", e);
                Err(e)
            }
        }
    }

    /// Return a bearer token, preferring an unexpired cached one
    pub async fn acquire_credential(&self, secret_id: &str) -> Result<String, AcquisitionError> {
        if let Some(cache) = &self.token_cache {
            if let Some(token) = cache.load().await {
                return Ok(token);
            }
        }
        self.fetch_fresh_credential(secret_id).await
    }

    /// Fetch a bearer token from Secrets Manager, bypassing the cache
    ///
    /// The fetched token is written back to the cache when one is configured.
    pub async fn fetch_fresh_credential(&self, secret_id: &str) -> Result<String, AcquisitionError> {
        let token = match self.read_bearer_token(secret_id).await {
            Ok(token) => token,
            Err(e) => {
                error!("Failed to fetch bearer token: {}", e);
                return Err(e);
            }
        };
        info!("Fetched bearer token from Secrets Manager");

        if let Some(cache) = &self.token_cache {
            cache.save(&token, self.nominal_lifetime).await;
        }
        Ok(token)
    }

    async fn read_bearer_token(&self, secret_id: &str) -> Result<String, AcquisitionError> {
        let secret = self.secrets.get_secret_string(secret_id).await?;
        let envelope: CredentialEnvelope = serde_json::from_str(&secret)
            .map_err(|e| AcquisitionError::invalid_secret(secret_id, e.to_string()))?;
        Ok(envelope.bearer_token)
    }

    /// Invocation URL for the runtime identified by `identity`
    pub fn build_url(&self, identity: &str) -> String {
        let url = runtime_invocation_url(&self.region, identity);
        info!("MCP server URL: {}", url);
        url
    }

    /// Request headers carrying `credential`
    pub fn build_headers(&self, credential: &str) -> HashMap<String, String> {
        auth_headers(credential, chrono::Utc::now())
    }

    /// Whether `credential` has passed its `exp` claim (undecodable counts as expired)
    pub fn is_expired(&self, credential: &str) -> bool {
        jwt::is_token_expired(credential)
    }
}

/// `https://bedrock-agentcore.{region}.amazonaws.com/runtimes/{arn}/invocations?qualifier=DEFAULT`
/// with `:` and `/` in the ARN percent-encoded
pub fn runtime_invocation_url(region: &str, identity: &str) -> String {
    let encoded = identity.replace(':', "%3A").replace('/', "%2F");
    format!(
        "https://bedrock-agentcore.{}.amazonaws.com/runtimes/{}/invocations?qualifier=DEFAULT",
        region, encoded
    )
}

/// Header set sent to the runtime, stamped with `now`
pub fn auth_headers(
    credential: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> HashMap<String, String> {
    let session_id = format!("session-{}", now.timestamp());
    info!("Client session id: {}", session_id);

    let mut map = HashMap::new();
    map.insert(headers::AUTHORIZATION.to_string(), format!("Bearer {}", credential));
    map.insert(headers::CONTENT_TYPE.to_string(), headers::JSON.to_string());
    map.insert(headers::CONTENT_TYPE_LOWER.to_string(), headers::JSON.to_string());
    map.insert(headers::ACCEPT.to_string(), headers::ACCEPT_STREAMABLE.to_string());
    map.insert(headers::MCP_SESSION_ID.to_string(), session_id.clone());
    map.insert(headers::X_SESSION_ID.to_string(), session_id);
    map.insert(
        headers::AMZ_DATE.to_string(),
        now.format("%Y%m%dT%H%M%SZ").to_string(),
    );
    map.insert(
        headers::AMZ_CONTENT_SHA256.to_string(),
        headers::UNSIGNED_PAYLOAD.to_string(),
    );
    map
}
