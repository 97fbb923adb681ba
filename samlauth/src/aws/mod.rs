use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_sdk_sts::config::Region;
use aws_sdk_sts::error::DisplayErrorContext;
use aws_sdk_sts::Client as StsClient;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument};

use crate::common::Credentials;
use crate::error::{AuthError, AuthResult};

/// Everything STS needs to trade an assertion for credentials
#[derive(Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub role_arn: String,
    pub principal_arn: String,
    /// Base64 SAMLResponse as posted by the identity provider
    pub saml_assertion: String,
    pub duration_seconds: i64,
    pub region: String,
}

// The assertion is a bearer token until it expires.
impl std::fmt::Debug for ExchangeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ExchangeRequest")
            .field("role_arn", &self.role_arn)
            .field("principal_arn", &self.principal_arn)
            .field("duration_seconds", &self.duration_seconds)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Service trading a validated assertion for temporary credentials
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Issue the exchange once; failures are returned, never retried
    async fn exchange(&self, request: &ExchangeRequest) -> AuthResult<Credentials>;
}

/// `AssumeRoleWithSAML` against the regional STS endpoint
#[derive(Debug, Clone, Default)]
pub struct StsTokenExchange;

impl StsTokenExchange {
    pub fn new() -> Self {
        Self
    }

    async fn client(region: &str) -> StsClient {
        // AssumeRoleWithSAML is unsigned; loading the default credential chain
        // could re-enter this very credential_process.
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .retry_config(RetryConfig::disabled())
            .no_credentials()
            .load()
            .await;
        StsClient::new(&config)
    }
}

#[async_trait]
impl TokenExchange for StsTokenExchange {
    #[instrument(skip(self))]
    async fn exchange(&self, request: &ExchangeRequest) -> AuthResult<Credentials> {
        let duration = i32::try_from(request.duration_seconds).map_err(|_| {
            AuthError::token_exchange(
                &request.role_arn,
                format!("duration {}s out of range", request.duration_seconds),
            )
        })?;

        let client = Self::client(&request.region).await;
        let output = client
            .assume_role_with_saml()
            .role_arn(&request.role_arn)
            .principal_arn(&request.principal_arn)
            .saml_assertion(&request.saml_assertion)
            .duration_seconds(duration)
            .send()
            .await
            .map_err(|e| {
                error!("Could not assume role {}: {}", request.role_arn, DisplayErrorContext(&e));
                AuthError::token_exchange(&request.role_arn, DisplayErrorContext(&e).to_string())
            })?;

        if let Some(user) = output.assumed_role_user() {
            info!("Assumed {}", user.arn());
        }

        let credentials = output.credentials().ok_or_else(|| {
            AuthError::token_exchange(&request.role_arn, "STS response carried no credentials")
        })?;
        let credentials = from_sts(credentials)
            .map_err(|message| AuthError::token_exchange(&request.role_arn, message))?;

        debug!("Session obtained: {:?}", credentials);
        Ok(credentials)
    }
}

fn from_sts(creds: &aws_sdk_sts::types::Credentials) -> Result<Credentials, String> {
    let expiration = creds.expiration();
    let expiration = DateTime::<Utc>::from_timestamp(expiration.secs(), expiration.subsec_nanos())
        .ok_or_else(|| format!("STS expiration {:?} out of range", expiration))?;

    Ok(Credentials {
        access_key_id: creds.access_key_id().to_string(),
        secret_access_key: creds.secret_access_key().to_string(),
        session_token: creds.session_token().to_string(),
        expiration,
    })
}
