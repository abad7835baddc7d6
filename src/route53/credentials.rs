use std::{fmt, future::Future};

use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use aws_types::region::Region;
use tracing::debug;

use super::{config::non_empty, Config, Error};

/// Represents the AWS credentials requests are signed with.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Resolves the credentials to sign with.
    ///
    /// Keys set in the configuration win. Otherwise the default AWS credential chain is asked for the configured
    /// profile: environment, shared config and credentials files (including `credential_process`, assumed roles
    /// and SSO), then container and instance metadata.
    pub fn resolve(config: &Config) -> Result<Self, Error> {
        if let (Some(id), Some(secret)) = (non_empty(&config.access_key_id), non_empty(&config.secret_access_key)) {
            debug!("Using AWS credentials from the configuration");
            return Ok(Self {
                access_key_id: id.to_owned(),
                secret_access_key: secret.to_owned(),
                session_token: non_empty(&config.session_token).map(str::to_owned),
            });
        }

        let profile = non_empty(&config.profile).map(str::to_owned);
        let region = config.region().to_owned();

        block_on(async move {
            let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));
            if let Some(profile) = &profile {
                debug!("Resolving AWS credentials of profile {}", profile);
                loader = loader.profile_name(profile);
            }

            let sdk_config = loader.load().await;
            let provider = sdk_config
                .credentials_provider()
                .ok_or_else(|| Error::Credentials("no credentials provider available".to_owned()))?;
            Self::from_provider(&provider).await
        })?
    }

    async fn from_provider(provider: &impl ProvideCredentials) -> Result<Self, Error> {
        let credentials = provider
            .provide_credentials()
            .await
            .map_err(|err| Error::Credentials(err.to_string()))?;

        debug!("Using AWS credentials with access key {}", credentials.access_key_id());
        Ok(Self {
            access_key_id: credentials.access_key_id().to_owned(),
            secret_access_key: credentials.secret_access_key().to_owned(),
            session_token: credentials.session_token().map(str::to_owned),
        })
    }
}

/// Drives a future to completion on a throwaway current-thread runtime.
fn block_on<F: Future>(future: F) -> Result<F::Output, Error> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| Error::Credentials(format!("cannot start credential runtime: {}", err)))?;
    Ok(runtime.block_on(future))
}
