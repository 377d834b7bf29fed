/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::error::{NoCredentialsResolved, RefreshFailure, SourceFailure};
use crate::source::CredentialSource;
use aws_msk_iam_types::credential::{future, CredentialsError, ProvideCredentials};
use aws_msk_iam_types::Credentials;
use tracing::Instrument;

/// Credentials provider that checks a series of sources
///
/// Each source is checked in turn. The first source that returns credentials wins; later sources
/// are not consulted. A failing source is logged and skipped.
///
/// ## Example
/// ```rust
/// use aws_msk_iam_auth::chain::ProviderChain;
/// use aws_msk_iam_auth::environment::EnvironmentVariableCredentialsProvider;
/// use aws_msk_iam_auth::system_properties::SystemPropertiesCredentialsProvider;
/// let chain = ProviderChain::first_try(EnvironmentVariableCredentialsProvider::new())
///     .or_else(SystemPropertiesCredentialsProvider::new());
/// assert_eq!(chain.sources().len(), 2);
/// ```
#[derive(Debug)]
pub struct ProviderChain {
    sources: Vec<CredentialSource>,
}

impl ProviderChain {
    pub(crate) fn from_sources(sources: Vec<CredentialSource>) -> Self {
        ProviderChain { sources }
    }

    pub fn first_try(source: impl Into<CredentialSource>) -> Self {
        ProviderChain {
            sources: vec![source.into()],
        }
    }

    pub fn or_else(mut self, source: impl Into<CredentialSource>) -> Self {
        self.sources.push(source.into());
        self
    }

    /// The sources of this chain, in precedence order
    pub fn sources(&self) -> &[CredentialSource] {
        &self.sources
    }

    /// Credentials from the first source that provides them
    pub async fn credentials(&self) -> Result<Credentials, NoCredentialsResolved> {
        let mut failures = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let name = source.name();
            let span = tracing::info_span!("load_credentials", provider = %name);
            match source.provide_credentials().instrument(span).await {
                Ok(credentials) => {
                    tracing::info!(provider = %name, "loaded credentials");
                    return Ok(credentials);
                }
                Err(e) => {
                    if e.is_not_loaded() {
                        tracing::debug!(provider = %name, error = %e, "provider in chain did not provide credentials");
                    } else {
                        tracing::info!(provider = %name, error = %e, "provider in chain failed");
                    }
                    failures.push(SourceFailure::new(name, e));
                }
            }
        }
        Err(NoCredentialsResolved::new(failures))
    }

    /// Refresh every source
    ///
    /// A failing source does not stop the others from being refreshed.
    pub async fn refresh(&self) -> Result<(), RefreshFailure> {
        let mut failures = vec![];
        for source in &self.sources {
            let name = source.name();
            if let Err(e) = source
                .refresh()
                .instrument(tracing::debug_span!("refresh_credentials", provider = %name))
                .await
            {
                tracing::warn!(provider = %name, error = %e, "failed to refresh credentials");
                failures.push(SourceFailure::new(name, e));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(RefreshFailure::new(failures))
        }
    }
}

impl ProvideCredentials for ProviderChain {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(async move {
            self.credentials()
                .await
                .map_err(|err| CredentialsError::not_loaded(err.to_string()))
        })
    }

    fn refresh<'a>(&'a self) -> future::Refresh<'a>
    where
        Self: 'a,
    {
        future::Refresh::new(async move {
            ProviderChain::refresh(self)
                .await
                .map_err(CredentialsError::provider_error)
        })
    }
}
