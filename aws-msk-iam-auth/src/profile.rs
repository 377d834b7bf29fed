/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Profile file based credentials
//!
//! Credentials are read from `~/.aws/credentials` and `~/.aws/config`. The locations of these
//! files can be overridden with `AWS_SHARED_CREDENTIALS_FILE` and `AWS_CONFIG_FILE`.
//!
//! Only static keys are supported:
//! ```ini
//! [default]
//! aws_access_key_id = 123
//! aws_secret_access_key = 456
//! aws_session_token = 789
//! ```

use crate::cache::ExpiringCache;
use crate::provider_config::ProviderConfig;
use aws_msk_iam_types::credential::{self, future, CredentialsError, ProvideCredentials};
use aws_msk_iam_types::os_shim_internal::{Env, Fs};
use aws_msk_iam_types::Credentials;
use std::time::Duration;
use tracing::Instrument;

mod parse;
mod source;

pub use parse::ProfileParseError;

pub(crate) const PROFILE_PROVIDER: &str = "ProfileFile";

/// Profile credentials are re-read from disk after this long
const PROFILE_CACHE_DURATION: Duration = Duration::from_secs(5 * 60);

/// AWS Profile based credentials provider
///
/// Without an explicit profile name, the profile is selected by `AWS_PROFILE`, falling back to
/// `default`.
///
/// ```rust,no_run
/// use aws_msk_iam_auth::profile::ProfileFileCredentialsProvider;
/// let provider = ProfileFileCredentialsProvider::builder()
///     .profile_name("msk")
///     .build();
/// ```
#[derive(Debug)]
pub struct ProfileFileCredentialsProvider {
    env: Env,
    fs: Fs,
    profile_override: Option<String>,
    cache: ExpiringCache,
}

impl ProfileFileCredentialsProvider {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// The explicitly configured profile name, `None` when the ambient profile is used
    pub fn profile_name(&self) -> Option<&str> {
        self.profile_override.as_deref()
    }

    fn load(&self) -> credential::Result {
        let source = source::load(&self.env, &self.fs);
        let profiles = parse::parse_profiles(&source).map_err(CredentialsError::provider_error)?;
        let name = self
            .profile_override
            .as_deref()
            .unwrap_or_else(|| source.profile.as_ref());
        let profile = profiles.get(name).ok_or_else(|| {
            CredentialsError::not_loaded(format!("profile `{}` was not defined", name))
        })?;
        let property = |key: &str| {
            profile
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };
        match (
            property("aws_access_key_id"),
            property("aws_secret_access_key"),
        ) {
            (Some(access_key), Some(secret_key)) => {
                tracing::debug!(profile = %name, "loaded static credentials from profile");
                Ok(Credentials::new(
                    access_key,
                    secret_key,
                    property("aws_session_token").map(str::to_string),
                    None,
                    PROFILE_PROVIDER,
                ))
            }
            (None, None) => {
                match ["role_arn", "source_profile", "credential_source", "credential_process"]
                    .iter()
                    .find(|key| property(key).is_some())
                {
                    Some(key) => Err(CredentialsError::invalid_configuration(format!(
                        "profile `{}` uses `{}`, which is not supported. Only static keys can be read from a profile",
                        name, key
                    ))),
                    None => Err(CredentialsError::not_loaded(format!(
                        "profile `{}` did not contain static credentials",
                        name
                    ))),
                }
            }
            (Some(_), None) => Err(CredentialsError::invalid_configuration(format!(
                "profile `{}` is missing `aws_secret_access_key`",
                name
            ))),
            (None, Some(_)) => Err(CredentialsError::invalid_configuration(format!(
                "profile `{}` is missing `aws_access_key_id`",
                name
            ))),
        }
    }

    async fn credentials(&self) -> credential::Result {
        self.cache.get_or_load(|| async { self.load() }).await
    }

    /// Re-read the profile files
    ///
    /// A profile that no longer exists stops resolving. On any other error the cached
    /// credentials are kept.
    async fn reload(&self) -> Result<(), CredentialsError> {
        match self.load() {
            Ok(credentials) => {
                self.cache.replace(credentials).await;
                Ok(())
            }
            Err(err) if err.is_not_loaded() => {
                tracing::debug!(error = %err, "profile no longer provides credentials, clearing cache");
                self.cache.clear().await;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

impl ProvideCredentials for ProfileFileCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials().instrument(tracing::debug_span!(
            "profile_credentials",
            profile = ?self.profile_override
        )))
    }

    fn refresh<'a>(&'a self) -> future::Refresh<'a>
    where
        Self: 'a,
    {
        future::Refresh::new(self.reload())
    }
}

/// Builder for [`ProfileFileCredentialsProvider`]
#[derive(Default)]
pub struct Builder {
    config: Option<ProviderConfig>,
    profile_name: Option<String>,
}

impl Builder {
    /// Override the configuration used for this provider
    pub fn configure(mut self, config: &ProviderConfig) -> Self {
        self.config = Some(config.clone());
        self
    }

    /// Read `profile_name` instead of the profile selected by `AWS_PROFILE`
    pub fn profile_name(mut self, profile_name: impl Into<String>) -> Self {
        self.profile_name = Some(profile_name.into());
        self
    }

    pub fn build(self) -> ProfileFileCredentialsProvider {
        let config = self.config.unwrap_or_default();
        ProfileFileCredentialsProvider {
            env: config.env(),
            fs: config.fs(),
            profile_override: self.profile_name,
            cache: ExpiringCache::new(config.time_source(), Duration::ZERO)
                .with_default_expiration(PROFILE_CACHE_DURATION),
        }
    }
}
