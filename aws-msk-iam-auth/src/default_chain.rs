/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! The fallback sequence every resolver ends with

use crate::chain::ProviderChain;
use crate::container::ContainerCredentialsProvider;
use crate::environment::EnvironmentVariableCredentialsProvider;
use crate::profile::ProfileFileCredentialsProvider;
use crate::provider_config::ProviderConfig;
use crate::source::CredentialSource;
use crate::system_properties::SystemPropertiesCredentialsProvider;
use crate::web_identity_token::WebIdentityTokenCredentialsProvider;
use aws_msk_iam_types::credential::{future, ProvideCredentials};

/// Default Credential Provider Chain
///
/// Resolution order:
/// 1. Environment variables: [`EnvironmentVariableCredentialsProvider`]
/// 2. System properties: [`SystemPropertiesCredentialsProvider`]
/// 3. Web identity token: [`WebIdentityTokenCredentialsProvider`]
/// 4. Shared config (`~/.aws/config`, `~/.aws/credentials`) for the profile selected by
///    `AWS_PROFILE`: [`ProfileFileCredentialsProvider`]
/// 5. Container or instance metadata: [`ContainerCredentialsProvider`]
///
/// This chain also supplies the base credentials used to assume a role.
///
/// ```rust
/// use aws_msk_iam_auth::default_chain::DefaultCredentialsChain;
/// let chain = DefaultCredentialsChain::builder().build();
/// assert_eq!(chain.sources().len(), 5);
/// ```
#[derive(Debug)]
pub struct DefaultCredentialsChain(ProviderChain);

impl DefaultCredentialsChain {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn sources(&self) -> &[CredentialSource] {
        self.0.sources()
    }
}

impl ProvideCredentials for DefaultCredentialsChain {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        self.0.provide_credentials()
    }

    fn refresh<'a>(&'a self) -> future::Refresh<'a>
    where
        Self: 'a,
    {
        ProvideCredentials::refresh(&self.0)
    }
}

/// Builder for [`DefaultCredentialsChain`]
#[derive(Default)]
pub struct Builder {
    config: Option<ProviderConfig>,
}

impl Builder {
    pub fn configure(mut self, config: &ProviderConfig) -> Self {
        self.config = Some(config.clone());
        self
    }

    pub fn build(self) -> DefaultCredentialsChain {
        let config = self.config.unwrap_or_default();
        DefaultCredentialsChain(ProviderChain::from_sources(default_sources(&config)))
    }
}

/// The default sources, in resolution order
pub(crate) fn default_sources(config: &ProviderConfig) -> Vec<CredentialSource> {
    vec![
        EnvironmentVariableCredentialsProvider::new_with_env(config.env()).into(),
        SystemPropertiesCredentialsProvider::new_with_properties(config.properties()).into(),
        WebIdentityTokenCredentialsProvider::builder()
            .configure(config)
            .build()
            .into(),
        ProfileFileCredentialsProvider::builder()
            .configure(config)
            .build()
            .into(),
        ContainerCredentialsProvider::builder()
            .configure(config)
            .build()
            .into(),
    ]
}
