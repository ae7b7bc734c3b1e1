//! Credentials and endpoint identity for remote MCP runtimes
//!
//! - [`token_cache`] persists the bearer token between runs
//! - [`jwt`] reads expiry claims
//! - [`sources`] wraps SSM and Secrets Manager behind traits
//! - [`authenticator`] combines them into URLs and request headers

pub mod authenticator;
pub mod error;
pub mod jwt;
pub mod sources;
pub mod token_cache;

pub use authenticator::{AwsAuthenticator, DEFAULT_SECRET_ID, DEFAULT_SSM_PARAMETER};
pub use error::AcquisitionError;
pub use sources::{ParameterSource, SecretSource, SecretsManagerSource, SsmParameterSource};
pub use token_cache::TokenCache;
