//! Orchestration of one credential request: cache check, then the browser
//! sign-in flow when the cache cannot answer.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::aws::{ExchangeRequest, StsTokenExchange, TokenExchange};
use crate::browser::SystemBrowser;
use crate::commands::LoginCommand;
use crate::common::{AuthOptions, Credentials, ProfileConfig, SamlData};
use crate::error::AuthResult;
use crate::saml::{self, AssertionParser};
use crate::server::{AssertionHandler, CallbackEndpoint};
use crate::store::CredentialStore;

pub mod output;

use output::{CredentialProcessWriter, OutputWriter};

/// Validates an assertion, exchanges it and persists the result
pub struct SamlAuthHandler {
    options: AuthOptions,
    exchange: Arc<dyn TokenExchange>,
    store: Arc<dyn CredentialStore<Credentials>>,
}

impl SamlAuthHandler {
    pub fn new(
        options: AuthOptions,
        exchange: Arc<dyn TokenExchange>,
        store: Arc<dyn CredentialStore<Credentials>>,
    ) -> Self {
        Self {
            options,
            exchange,
            store,
        }
    }
}

#[async_trait]
impl AssertionHandler for SamlAuthHandler {
    async fn handle(&self, data: SamlData) -> AuthResult<Credentials> {
        let validated = saml::validate(&data.assertion, &self.options)?;
        info!(
            "Assuming {} via {} for {}s",
            self.options.role_arn, validated.principal_arn, validated.duration_seconds
        );

        let request = ExchangeRequest {
            role_arn: self.options.role_arn.clone(),
            principal_arn: validated.principal_arn,
            saml_assertion: data.encoded_response,
            duration_seconds: validated.duration_seconds,
            region: self.options.region.clone(),
        };
        let credentials = self.exchange.exchange(&request).await?;

        self.store.store(&self.options.profile, &credentials)?;
        debug!("Cached credentials for profile {}", self.options.profile);

        Ok(credentials)
    }
}

pub struct Authenticator {
    options: AuthOptions,
    store: Arc<dyn CredentialStore<Credentials>>,
    exchange: Arc<dyn TokenExchange>,
    endpoint: CallbackEndpoint,
    writer: Arc<dyn OutputWriter>,
}

impl Authenticator {
    pub fn new(
        options: AuthOptions,
        store: Arc<dyn CredentialStore<Credentials>>,
        exchange: Arc<dyn TokenExchange>,
        endpoint: CallbackEndpoint,
        writer: Arc<dyn OutputWriter>,
    ) -> Self {
        Self {
            options,
            store,
            exchange,
            endpoint,
            writer,
        }
    }

    /// Unexpired cached credentials for this profile, if any
    pub fn cached(&self) -> AuthResult<Option<Credentials>> {
        let now = Utc::now();
        Ok(self
            .store
            .fetch(&self.options.profile)?
            .filter(|c| c.is_valid_at(now)))
    }

    /// Drop the cache entry so the next run signs in again
    pub fn forget(&self) -> AuthResult<()> {
        info!("Removing cached credentials for {}", self.options.profile);
        self.store.delete(&self.options.profile)
    }

    /// Produce credentials for the profile and write them out
    #[instrument(skip(self), fields(profile = %self.options.profile))]
    pub async fn authenticate(&self) -> AuthResult<Credentials> {
        if let Some(credentials) = self.cached()? {
            info!(
                "Using cached credentials valid until {}",
                credentials.expiration_rfc3339()
            );
            self.writer.write_credentials(&credentials)?;
            return Ok(credentials);
        }

        debug!("No usable cached credentials, starting sign-in");
        let handler = Arc::new(SamlAuthHandler::new(
            self.options.clone(),
            self.exchange.clone(),
            self.store.clone(),
        ));
        let credentials = self.endpoint.run(&self.options.idp_url, handler).await?;

        self.writer.write_credentials(&credentials)?;
        Ok(credentials)
    }
}

pub async fn run(cmd: LoginCommand) -> Result<()> {
    let config = ProfileConfig::load(Some(cmd.profile.as_str()))?;
    let options = config.into_options(&cmd.profile, cmd.duration);
    debug!("Options: {:?}", options);

    let store = cmd.cache.open::<Credentials>()?;
    let endpoint = CallbackEndpoint::new(
        cmd.port,
        options.profile.clone(),
        AssertionParser::new(options.audience.clone()),
        Arc::new(SystemBrowser),
    );
    let authenticator = Authenticator::new(
        options,
        store,
        Arc::new(StsTokenExchange::new()),
        endpoint,
        Arc::new(CredentialProcessWriter),
    );

    if cmd.refresh {
        authenticator.forget()?;
    }
    authenticator.authenticate().await?;

    Ok(())
}
