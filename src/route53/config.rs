use std::time::Duration;

use serde::Deserialize;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);

/// Controls whether delete operations wait for their changes to propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePropagation {
    /// Follow [`Config::wait_for_propagation`].
    #[default]
    #[serde(alias = "")]
    Inherit,
    Always,
    Never,
}

/// Configures the Route53 provider.
///
/// Every field is optional; zero values fall back to the defaults. Credentials that are not set here are looked up
/// through the default AWS credential chain.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The AWS region, `us-east-1` if not set. It selects the AWS partition.
    pub region: Option<String>,

    /// The AWS profile to resolve credentials for, `AWS_PROFILE` or `default` if not set.
    #[serde(alias = "aws_profile")]
    pub profile: Option<String>,

    pub access_key_id: Option<String>,

    pub secret_access_key: Option<String>,

    #[serde(alias = "token")]
    pub session_token: Option<String>,

    /// The maximum number of attempts per request, 5 if not set.
    pub max_retries: u32,

    /// The maximum number of seconds to wait for a change to propagate, 60 if not set.
    pub max_wait_dur: u64,

    /// Whether to block until every change is propagated.
    pub wait_for_propagation: bool,

    /// Overrides [`Config::wait_for_propagation`] for delete operations.
    pub wait_for_delete_propagation: DeletePropagation,

    /// The hosted zone to use instead of looking it up by name. The `/hostedzone/` prefix is optional.
    pub hosted_zone_id: Option<String>,

    /// The Route53 API endpoint, derived from the region if not set.
    pub endpoint: Option<String>,
}

impl Config {
    pub fn region(&self) -> &str {
        non_empty(&self.region).unwrap_or(DEFAULT_REGION)
    }

    pub fn max_attempts(&self) -> u32 {
        if self.max_retries == 0 {
            DEFAULT_MAX_RETRIES
        } else {
            self.max_retries
        }
    }

    pub fn max_wait(&self) -> Duration {
        if self.max_wait_dur == 0 {
            DEFAULT_MAX_WAIT
        } else {
            Duration::from_secs(self.max_wait_dur)
        }
    }

    pub fn should_wait_for_propagation(&self) -> bool {
        self.wait_for_propagation
    }

    pub fn should_wait_for_delete_propagation(&self) -> bool {
        match self.wait_for_delete_propagation {
            DeletePropagation::Inherit => self.wait_for_propagation,
            DeletePropagation::Always => true,
            DeletePropagation::Never => false,
        }
    }

    /// Returns the configured hosted zone ID without its `/hostedzone/` prefix.
    pub fn hosted_zone_id(&self) -> Option<&str> {
        non_empty(&self.hosted_zone_id).map(|id| id.trim_start_matches("/hostedzone/"))
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
