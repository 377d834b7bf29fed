/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! The credential resolver handed to the authentication layer

use crate::chain::ProviderChain;
use crate::default_chain::default_sources;
use crate::error::{ConfigurationError, NoCredentialsResolved, RefreshFailure};
use crate::options::ResolverOptions;
use crate::profile::ProfileFileCredentialsProvider;
use crate::provider_config::ProviderConfig;
use crate::source::CredentialSource;
use crate::sts::AssumeRoleProvider;
use aws_msk_iam_types::credential::{future, CredentialsError, ProvideCredentials};
use aws_msk_iam_types::Credentials;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A single source of AWS credentials assembled from connection options
///
/// Sources are consulted in this order:
///
/// 1. the profile named by `awsProfileName`, if set
/// 2. the role named by `awsRoleArn`, if set
/// 3. the [default chain](crate::default_chain::DefaultCredentialsChain)
///
/// Construction performs no I/O and only fails for malformed options. If no source can provide
/// credentials, the failure surfaces from [`credentials`](CredentialResolver::credentials).
///
/// When a role is assumed, a background thread keeps its session fresh. Release it with
/// [`close`](CredentialResolver::close).
#[derive(Debug)]
pub struct CredentialResolver {
    chain: ProviderChain,
    assume_role: Option<Arc<AssumeRoleProvider>>,
}

impl CredentialResolver {
    /// Create a resolver for `options` that reads the real process environment
    pub fn new(options: &HashMap<String, Value>) -> Result<Self, ConfigurationError> {
        Self::builder().options(options).build()
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Credentials from the first source in the chain that provides them
    ///
    /// Safe to call concurrently. Fails with [`NoCredentialsResolved`], listing every attempted
    /// source, when no source provides credentials.
    pub async fn credentials(&self) -> Result<Credentials, NoCredentialsResolved> {
        self.chain.credentials().await
    }

    /// Refresh every source in the chain
    ///
    /// Failures are logged and returned, but never stop the remaining sources from refreshing.
    /// Cached credentials of sources that failed to refresh stay in use.
    pub async fn refresh(&self) -> Result<(), RefreshFailure> {
        self.chain.refresh().await.map_err(|err| {
            tracing::warn!(error = %err, "error refreshing credentials");
            err
        })
    }

    /// Release the background refresh of an assumed role
    ///
    /// Does nothing if no role is assumed. Calling `close` again has no further effect.
    pub fn close(&self) {
        if let Some(assume_role) = &self.assume_role {
            assume_role.close();
        }
    }

    /// The sources of this resolver, in precedence order
    pub fn sources(&self) -> &[CredentialSource] {
        self.chain.sources()
    }
}

impl ProvideCredentials for CredentialResolver {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        self.chain.provide_credentials()
    }

    fn refresh<'a>(&'a self) -> future::Refresh<'a>
    where
        Self: 'a,
    {
        future::Refresh::new(async move {
            CredentialResolver::refresh(self)
                .await
                .map_err(CredentialsError::provider_error)
        })
    }
}

/// Builder for [`CredentialResolver`]
#[derive(Default)]
pub struct Builder {
    options: Option<HashMap<String, Value>>,
    resolver_options: Option<ResolverOptions>,
    config: Option<ProviderConfig>,
}

impl Builder {
    /// Untyped options, for example from [`parse_jaas_config`](crate::options::parse_jaas_config)
    pub fn options(mut self, options: &HashMap<String, Value>) -> Self {
        self.options = Some(options.clone());
        self.resolver_options = None;
        self
    }

    /// Already validated options
    pub fn resolver_options(mut self, options: ResolverOptions) -> Self {
        self.resolver_options = Some(options);
        self.options = None;
        self
    }

    /// Override the process dependencies and collaborators of every source
    pub fn configure(mut self, config: &ProviderConfig) -> Self {
        self.config = Some(config.clone());
        self
    }

    pub fn build(self) -> Result<CredentialResolver, ConfigurationError> {
        let options = match (self.resolver_options, self.options) {
            (Some(options), _) => options,
            (None, Some(options)) => ResolverOptions::from_map(&options)?,
            (None, None) => ResolverOptions::default(),
        };
        let config = self.config.unwrap_or_default();

        let mut sources: Vec<CredentialSource> = vec![];
        if let Some(profile_name) = options.profile_name() {
            sources.push(
                ProfileFileCredentialsProvider::builder()
                    .configure(&config)
                    .profile_name(profile_name)
                    .build()
                    .into(),
            );
        }
        let assume_role = options.role_arn().map(|role_arn| {
            Arc::new(
                AssumeRoleProvider::builder(role_arn)
                    .session_name(options.role_session_name())
                    .configure(&config)
                    .build(),
            )
        });
        if let Some(assume_role) = &assume_role {
            sources.push(assume_role.clone().into());
        }
        sources.extend(default_sources(&config));

        let chain = ProviderChain::from_sources(sources);
        tracing::debug!(
            sources = ?chain.sources().iter().map(|s| s.name()).collect::<Vec<_>>(),
            "built credential provider chain"
        );
        Ok(CredentialResolver { chain, assume_role })
    }
}
