/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Load credentials by exchanging a web identity token (for example an EKS service account
//! token) through `sts:AssumeRoleWithWebIdentity`
//!
//! Configuration is read from system properties first, then from the environment:
//!
//! | system property          | environment variable          |
//! |--------------------------|-------------------------------|
//! | `aws.webIdentityTokenFile` | `AWS_WEB_IDENTITY_TOKEN_FILE` |
//! | `aws.roleArn`              | `AWS_ROLE_ARN`                |
//! | `aws.roleSessionName`      | `AWS_ROLE_SESSION_NAME`       |
//!
//! The session name is optional and defaults to `web-identity-<epoch millis>`.

use crate::cache::{ExpiringCache, DEFAULT_BUFFER_TIME};
use crate::provider_config::ProviderConfig;
use crate::sts::{missing_sts_client, AssumeRoleWithWebIdentityRequest, SharedStsClient, StsClient};
use aws_msk_iam_types::credential::{self, future, CredentialsError, ProvideCredentials};
use aws_msk_iam_types::os_shim_internal::{Env, Fs, Properties};
use aws_msk_iam_types::time::SharedTimeSource;
use std::time::UNIX_EPOCH;
use tracing::Instrument;

const ENV_TOKEN_FILE: &str = "AWS_WEB_IDENTITY_TOKEN_FILE";
const ENV_ROLE_ARN: &str = "AWS_ROLE_ARN";
const ENV_SESSION_NAME: &str = "AWS_ROLE_SESSION_NAME";

const PROPERTY_TOKEN_FILE: &str = "aws.webIdentityTokenFile";
const PROPERTY_ROLE_ARN: &str = "aws.roleArn";
const PROPERTY_SESSION_NAME: &str = "aws.roleSessionName";

#[derive(Debug, Eq, PartialEq)]
struct Settings {
    token_file: String,
    role_arn: String,
    session_name: String,
}

/// Credentials provider for `sts:AssumeRoleWithWebIdentity`
#[derive(Debug)]
pub struct WebIdentityTokenCredentialsProvider {
    env: Env,
    fs: Fs,
    properties: Properties,
    time_source: SharedTimeSource,
    sts_client: Option<SharedStsClient>,
    cache: ExpiringCache,
}

impl WebIdentityTokenCredentialsProvider {
    pub fn builder() -> Builder {
        Builder::default()
    }

    fn setting(&self, property: &str, env_var: &str) -> Option<String> {
        self.properties
            .get(property)
            .or_else(|| self.env.get(env_var).ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn settings(&self) -> Result<Settings, CredentialsError> {
        let token_file = self
            .setting(PROPERTY_TOKEN_FILE, ENV_TOKEN_FILE)
            .ok_or_else(|| {
                CredentialsError::not_loaded(format!("${} was not set", ENV_TOKEN_FILE))
            })?;
        let role_arn = self
            .setting(PROPERTY_ROLE_ARN, ENV_ROLE_ARN)
            .ok_or_else(|| {
                CredentialsError::invalid_configuration(format!(
                    "${} was set but ${} was not",
                    ENV_TOKEN_FILE, ENV_ROLE_ARN
                ))
            })?;
        let session_name = self
            .setting(PROPERTY_SESSION_NAME, ENV_SESSION_NAME)
            .unwrap_or_else(|| {
                let millis = self
                    .time_source
                    .now()
                    .duration_since(UNIX_EPOCH)
                    .map(|since_epoch| since_epoch.as_millis())
                    .unwrap_or_default();
                format!("web-identity-{}", millis)
            });
        Ok(Settings {
            token_file,
            role_arn,
            session_name,
        })
    }

    async fn load(&self) -> credential::Result {
        let settings = self.settings()?;
        let sts = self.sts_client.as_ref().ok_or_else(missing_sts_client)?;
        let token = self
            .fs
            .read_to_end(&settings.token_file)
            .map_err(|err| {
                CredentialsError::provider_error(format!(
                    "could not read web identity token file `{}`: {}",
                    settings.token_file, err
                ))
            })?;
        let token = String::from_utf8(token).map_err(CredentialsError::unhandled)?;
        tracing::debug!(role_arn = %settings.role_arn, session_name = %settings.session_name, "assuming role with web identity");
        sts.assume_role_with_web_identity(AssumeRoleWithWebIdentityRequest {
            role_arn: settings.role_arn,
            role_session_name: settings.session_name,
            web_identity_token: token.trim().to_string(),
        })
        .await
    }

    async fn credentials(&self) -> credential::Result {
        self.cache.get_or_load(|| self.load()).await
    }

    async fn reload(&self) -> Result<(), CredentialsError> {
        match self.settings() {
            Err(err) if err.is_not_loaded() => Ok(()),
            _ => {
                let credentials = self.load().await?;
                self.cache.replace(credentials).await;
                Ok(())
            }
        }
    }
}

impl ProvideCredentials for WebIdentityTokenCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(
            self.credentials()
                .instrument(tracing::debug_span!("web_identity_token")),
        )
    }

    fn refresh<'a>(&'a self) -> future::Refresh<'a>
    where
        Self: 'a,
    {
        future::Refresh::new(self.reload())
    }
}

/// Builder for [`WebIdentityTokenCredentialsProvider`]
#[derive(Default)]
pub struct Builder {
    config: Option<ProviderConfig>,
}

impl Builder {
    pub fn configure(mut self, config: &ProviderConfig) -> Self {
        self.config = Some(config.clone());
        self
    }

    pub fn build(self) -> WebIdentityTokenCredentialsProvider {
        let config = self.config.unwrap_or_default();
        WebIdentityTokenCredentialsProvider {
            env: config.env(),
            fs: config.fs(),
            properties: config.properties(),
            time_source: config.time_source(),
            sts_client: config.sts_client(),
            cache: ExpiringCache::new(config.time_source(), DEFAULT_BUFFER_TIME),
        }
    }
}
