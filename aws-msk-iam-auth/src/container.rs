/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Container and instance metadata credentials
//!
//! In an ECS task the agent exposes credentials at `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI`
//! (relative to `http://169.254.170.2`) or at `AWS_CONTAINER_CREDENTIALS_FULL_URI`. Everywhere
//! else the EC2 instance metadata service is queried, unless `AWS_EC2_METADATA_DISABLED` is `true`.

use crate::cache::{ExpiringCache, DEFAULT_BUFFER_TIME};
use crate::http::{HttpClient, SharedHttpClient};
use crate::json_credentials::{parse_json_credentials, JsonCredentials};
use crate::provider_config::ProviderConfig;
use crate::timeout::Timeout;
use aws_msk_iam_types::credential::{self, future, CredentialsError, ProvideCredentials};
use aws_msk_iam_types::os_shim_internal::Env;
use aws_msk_iam_types::Credentials;
use bytes::Bytes;
use http::{Method, Request, Response, StatusCode, Uri};
use std::time::Duration;
use tracing::Instrument;

pub(crate) const ECS_PROVIDER: &str = "EcsContainer";
pub(crate) const IMDS_PROVIDER: &str = "Ec2InstanceMetadata";

const ENV_RELATIVE_URI: &str = "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI";
const ENV_FULL_URI: &str = "AWS_CONTAINER_CREDENTIALS_FULL_URI";
const ENV_AUTHORIZATION_TOKEN: &str = "AWS_CONTAINER_AUTHORIZATION_TOKEN";
const ENV_METADATA_DISABLED: &str = "AWS_EC2_METADATA_DISABLED";
const ENV_METADATA_ENDPOINT: &str = "AWS_EC2_METADATA_SERVICE_ENDPOINT";

const ECS_HOST: &str = "http://169.254.170.2";
const IMDS_ENDPOINT: &str = "http://169.254.169.254";
const IMDS_TOKEN_PATH: &str = "/latest/api/token";
const IMDS_CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";
const IMDS_TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const IMDS_TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
const IMDS_TOKEN_TTL_SECONDS: u64 = 21_600;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Hosts allowed for a plain `http` `AWS_CONTAINER_CREDENTIALS_FULL_URI`
const ALLOWED_FULL_URI_HOSTS: &[&str] = &["localhost", "127.0.0.1", "[::1]", "::1"];

#[derive(Debug, Eq, PartialEq)]
enum Endpoint {
    Ecs {
        uri: String,
        authorization: Option<String>,
    },
    Imds {
        base: String,
    },
    Disabled,
}

/// Credentials provider for ECS tasks and EC2 instances
///
/// Each HTTP request is bounded by a timeout (one second unless overridden). Credentials are
/// cached until shortly before they expire.
#[derive(Debug)]
pub struct ContainerCredentialsProvider {
    env: Env,
    http_client: Option<SharedHttpClient>,
    timeout: Duration,
    cache: ExpiringCache,
}

impl ContainerCredentialsProvider {
    pub fn builder() -> Builder {
        Builder::default()
    }

    fn endpoint(&self) -> Result<Endpoint, CredentialsError> {
        let var = |key: &str| {
            self.env
                .get(key)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        if let Some(relative) = var(ENV_RELATIVE_URI) {
            return Ok(Endpoint::Ecs {
                uri: format!("{}{}", ECS_HOST, relative),
                authorization: None,
            });
        }
        if let Some(full) = var(ENV_FULL_URI) {
            let supports_https = self
                .http_client
                .as_ref()
                .map(|client| client.supports_https())
                .unwrap_or(true);
            validate_full_uri(&full, supports_https)?;
            return Ok(Endpoint::Ecs {
                uri: full,
                authorization: var(ENV_AUTHORIZATION_TOKEN),
            });
        }
        if var(ENV_METADATA_DISABLED)
            .map(|value| value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
        {
            return Ok(Endpoint::Disabled);
        }
        Ok(Endpoint::Imds {
            base: var(ENV_METADATA_ENDPOINT)
                .map(|endpoint| endpoint.trim_end_matches('/').to_string())
                .unwrap_or_else(|| IMDS_ENDPOINT.to_string()),
        })
    }

    fn client(&self) -> Result<&SharedHttpClient, CredentialsError> {
        self.http_client
            .as_ref()
            .ok_or_else(|| CredentialsError::not_loaded("no HTTP client is configured"))
    }

    async fn load(&self) -> credential::Result {
        match self.endpoint()? {
            Endpoint::Disabled => Err(CredentialsError::not_loaded(format!(
                "instance metadata was disabled via {}",
                ENV_METADATA_DISABLED
            ))),
            Endpoint::Ecs { uri, authorization } => {
                let mut request = Request::get(uri.as_str());
                if let Some(authorization) = authorization {
                    request = request.header(http::header::AUTHORIZATION, authorization);
                }
                let response = self.send(build(request)?).await?;
                parse_credentials(&response, ECS_PROVIDER)
            }
            Endpoint::Imds { base } => self.load_from_imds(&base).await,
        }
    }

    async fn load_from_imds(&self, base: &str) -> credential::Result {
        let token = self.imds_token(base).await?;
        let with_token = |path: String| {
            let mut request = Request::get(path);
            if let Some(token) = &token {
                request = request.header(IMDS_TOKEN_HEADER, token.as_str());
            }
            build(request)
        };

        let response = self
            .send(with_token(format!("{}{}", base, IMDS_CREDENTIALS_PATH))?)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(CredentialsError::not_loaded(
                "no IAM role is attached to this instance",
            ));
        }
        let role_name = body_text(&response)?
            .lines()
            .next()
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                CredentialsError::not_loaded("no IAM role is attached to this instance")
            })?;
        tracing::debug!(role = %role_name, "loaded instance profile role name");

        let response = self
            .send(with_token(format!(
                "{}{}{}",
                base, IMDS_CREDENTIALS_PATH, role_name
            ))?)
            .await?;
        parse_credentials(&response, IMDS_PROVIDER)
    }

    /// Fetch an IMDSv2 session token, `None` when only IMDSv1 is available
    async fn imds_token(&self, base: &str) -> Result<Option<String>, CredentialsError> {
        let request = Request::builder()
            .method(Method::PUT)
            .uri(format!("{}{}", base, IMDS_TOKEN_PATH))
            .header(IMDS_TOKEN_TTL_HEADER, IMDS_TOKEN_TTL_SECONDS.to_string());
        let response = self.send(build(request)?).await?;
        match response.status() {
            status if status.is_success() => Ok(Some(body_text(&response)?.trim().to_string())),
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => {
                tracing::debug!(status = %response.status(), "IMDSv2 unavailable, falling back to IMDSv1");
                Ok(None)
            }
            status => Err(CredentialsError::provider_error(format!(
                "failed to retrieve an instance metadata token: status {}",
                status
            ))),
        }
    }

    async fn send(&self, request: Request<()>) -> Result<Response<Bytes>, CredentialsError> {
        let client = self.client()?;
        tracing::debug!(uri = %request.uri(), method = %request.method(), "sending metadata request");
        Timeout::new(client.send(request), self.timeout)
            .await?
            .map_err(CredentialsError::provider_error)
    }

    async fn credentials(&self) -> credential::Result {
        self.cache.get_or_load(|| self.load()).await
    }

    async fn reload(&self) -> Result<(), CredentialsError> {
        if self.cache.expiry().await.is_none() {
            tracing::debug!("nothing loaded from metadata yet, skipping refresh");
            return Ok(());
        }
        let credentials = self.load().await?;
        self.cache.replace(credentials).await;
        Ok(())
    }
}

/// `supports_https` is false when the configured client cannot speak TLS
fn validate_full_uri(uri: &str, supports_https: bool) -> Result<(), CredentialsError> {
    let parsed: Uri = uri.parse().map_err(CredentialsError::invalid_configuration)?;
    match (parsed.scheme_str(), parsed.host()) {
        (Some("https"), Some(_)) if supports_https => Ok(()),
        (Some("https"), Some(_)) => Err(CredentialsError::invalid_configuration(format!(
            "{} is an https URI, but the configured HTTP client does not support TLS",
            ENV_FULL_URI
        ))),
        (Some("http"), Some(host)) if ALLOWED_FULL_URI_HOSTS.iter().any(|allowed| *allowed == host) => {
            Ok(())
        }
        _ => Err(CredentialsError::invalid_configuration(format!(
            "{} must use https or point at a loopback host, got `{}`",
            ENV_FULL_URI, uri
        ))),
    }
}

fn build(request: http::request::Builder) -> Result<Request<()>, CredentialsError> {
    request
        .body(())
        .map_err(CredentialsError::invalid_configuration)
}

fn body_text(response: &Response<Bytes>) -> Result<&str, CredentialsError> {
    std::str::from_utf8(response.body().as_ref()).map_err(CredentialsError::unhandled)
}

fn parse_credentials(
    response: &Response<Bytes>,
    provider_name: &'static str,
) -> credential::Result {
    if !response.status().is_success() {
        return Err(CredentialsError::provider_error(format!(
            "credentials endpoint returned status {}",
            response.status()
        )));
    }
    match parse_json_credentials(body_text(response)?).map_err(CredentialsError::unhandled)? {
        JsonCredentials::RefreshableCredentials {
            access_key_id,
            secret_access_key,
            session_token,
            expiration,
        } => Ok(Credentials::new(
            access_key_id,
            secret_access_key,
            Some(session_token),
            Some(expiration),
            provider_name,
        )),
        JsonCredentials::Error { code, message } => Err(CredentialsError::provider_error(
            format!("failed to load credentials [{}]: {}", code, message),
        )),
    }
}

impl ProvideCredentials for ContainerCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(
            self.credentials()
                .instrument(tracing::debug_span!("container_credentials")),
        )
    }

    fn refresh<'a>(&'a self) -> future::Refresh<'a>
    where
        Self: 'a,
    {
        future::Refresh::new(self.reload())
    }
}

/// Builder for [`ContainerCredentialsProvider`]
#[derive(Default)]
pub struct Builder {
    config: Option<ProviderConfig>,
    timeout: Option<Duration>,
}

impl Builder {
    pub fn configure(mut self, config: &ProviderConfig) -> Self {
        self.config = Some(config.clone());
        self
    }

    /// Timeout applied to each HTTP request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> ContainerCredentialsProvider {
        let config = self.config.unwrap_or_default();
        ContainerCredentialsProvider {
            env: config.env(),
            http_client: config.http_client(),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            cache: ExpiringCache::new(config.time_source(), DEFAULT_BUFFER_TIME),
        }
    }
}
