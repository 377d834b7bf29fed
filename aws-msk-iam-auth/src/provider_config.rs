/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Configuration Options for Credential Providers

use crate::http::SharedHttpClient;
use crate::sts::SharedStsClient;
use aws_msk_iam_types::os_shim_internal::{Env, Fs, Properties};
use aws_msk_iam_types::time::{SharedTimeSource, TimeSource};

/// Configuration options for Credential Providers
///
/// Every credential provider in this crate is built from a `ProviderConfig`. It carries the
/// process dependencies (environment, file system, system properties, clock) and the external
/// collaborators (HTTP client, STS client) so that nothing is read implicitly from global state.
///
/// ```rust
/// use aws_msk_iam_auth::provider_config::ProviderConfig;
/// use aws_msk_iam_types::os_shim_internal::Env;
/// let conf = ProviderConfig::default().with_env(Env::from_slice(&[("AWS_PROFILE", "msk")]));
/// ```
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    env: Env,
    fs: Fs,
    properties: Properties,
    time_source: SharedTimeSource,
    http_client: Option<SharedHttpClient>,
    sts_client: Option<SharedStsClient>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            env: Env::default(),
            fs: Fs::default(),
            properties: Properties::default(),
            time_source: SharedTimeSource::default(),
            http_client: crate::http::default_http_client(),
            sts_client: None,
        }
    }
}

impl ProviderConfig {
    /// Configuration with no HTTP client, no STS client and an empty environment, file system
    /// and property set
    ///
    /// Useful as a starting point for tests: nothing leaks in from the real process.
    pub fn empty() -> Self {
        ProviderConfig {
            env: Env::from_slice(&[]),
            fs: Fs::from_slice(&[]),
            properties: Properties::from_slice(&[]),
            time_source: SharedTimeSource::default(),
            http_client: None,
            sts_client: None,
        }
    }

    pub(crate) fn env(&self) -> Env {
        self.env.clone()
    }

    pub(crate) fn fs(&self) -> Fs {
        self.fs.clone()
    }

    pub(crate) fn properties(&self) -> Properties {
        self.properties.clone()
    }

    pub(crate) fn time_source(&self) -> SharedTimeSource {
        self.time_source.clone()
    }

    pub(crate) fn http_client(&self) -> Option<SharedHttpClient> {
        self.http_client.clone()
    }

    pub(crate) fn sts_client(&self) -> Option<SharedStsClient> {
        self.sts_client.clone()
    }

    #[doc(hidden)]
    pub fn with_fs(self, fs: Fs) -> Self {
        ProviderConfig { fs, ..self }
    }

    #[doc(hidden)]
    pub fn with_env(self, env: Env) -> Self {
        ProviderConfig { env, ..self }
    }

    #[doc(hidden)]
    pub fn with_properties(self, properties: Properties) -> Self {
        ProviderConfig { properties, ..self }
    }

    /// Override the clock used to decide when cached credentials are stale
    pub fn with_time_source(self, time_source: impl TimeSource) -> Self {
        ProviderConfig {
            time_source: SharedTimeSource::new(time_source),
            ..self
        }
    }

    /// Override the HTTP client used for container and instance metadata requests
    pub fn with_http_client(self, http_client: SharedHttpClient) -> Self {
        ProviderConfig {
            http_client: Some(http_client),
            ..self
        }
    }

    /// Set the STS client used by the assume role and web identity providers
    pub fn with_sts_client(self, sts_client: SharedStsClient) -> Self {
        ProviderConfig {
            sts_client: Some(sts_client),
            ..self
        }
    }
}
