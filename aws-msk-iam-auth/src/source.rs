/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! The closed set of credential sources a chain is assembled from

use crate::container::ContainerCredentialsProvider;
use crate::environment::EnvironmentVariableCredentialsProvider;
use crate::profile::ProfileFileCredentialsProvider;
use crate::sts::AssumeRoleProvider;
use crate::system_properties::SystemPropertiesCredentialsProvider;
use crate::web_identity_token::WebIdentityTokenCredentialsProvider;
use aws_msk_iam_types::credential::{future, ProvideCredentials};
use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// The kind of a [`CredentialSource`]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SourceKind {
    Profile,
    AssumeRole,
    Environment,
    SystemProperties,
    WebIdentityToken,
    Container,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Profile => "Profile",
            SourceKind::AssumeRole => "AssumeRole",
            SourceKind::Environment => "EnvironmentVariables",
            SourceKind::SystemProperties => "SystemProperties",
            SourceKind::WebIdentityToken => "WebIdentityToken",
            SourceKind::Container => "ContainerMetadata",
        }
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential source in a [`ProviderChain`](crate::chain::ProviderChain)
///
/// The assume role variant is shared so that its owner can release the background refresh loop
/// while the chain still refers to it.
#[derive(Debug)]
pub enum CredentialSource {
    Profile(ProfileFileCredentialsProvider),
    AssumeRole(Arc<AssumeRoleProvider>),
    Environment(EnvironmentVariableCredentialsProvider),
    SystemProperties(SystemPropertiesCredentialsProvider),
    WebIdentityToken(WebIdentityTokenCredentialsProvider),
    Container(ContainerCredentialsProvider),
}

impl CredentialSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            CredentialSource::Profile(_) => SourceKind::Profile,
            CredentialSource::AssumeRole(_) => SourceKind::AssumeRole,
            CredentialSource::Environment(_) => SourceKind::Environment,
            CredentialSource::SystemProperties(_) => SourceKind::SystemProperties,
            CredentialSource::WebIdentityToken(_) => SourceKind::WebIdentityToken,
            CredentialSource::Container(_) => SourceKind::Container,
        }
    }

    /// Display name used in logs and errors
    ///
    /// A named profile is reported as `Profile(<name>)`.
    pub fn name(&self) -> Cow<'static, str> {
        match self {
            CredentialSource::Profile(profile) => match profile.profile_name() {
                Some(name) => Cow::Owned(format!("Profile({})", name)),
                None => Cow::Borrowed(SourceKind::Profile.as_str()),
            },
            other => Cow::Borrowed(other.kind().as_str()),
        }
    }

    fn provider(&self) -> &dyn ProvideCredentials {
        match self {
            CredentialSource::Profile(provider) => provider,
            CredentialSource::AssumeRole(provider) => &**provider,
            CredentialSource::Environment(provider) => provider,
            CredentialSource::SystemProperties(provider) => provider,
            CredentialSource::WebIdentityToken(provider) => provider,
            CredentialSource::Container(provider) => provider,
        }
    }
}

impl ProvideCredentials for CredentialSource {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        self.provider().provide_credentials()
    }

    fn refresh<'a>(&'a self) -> future::Refresh<'a>
    where
        Self: 'a,
    {
        self.provider().refresh()
    }
}

impl From<ProfileFileCredentialsProvider> for CredentialSource {
    fn from(provider: ProfileFileCredentialsProvider) -> Self {
        CredentialSource::Profile(provider)
    }
}

impl From<Arc<AssumeRoleProvider>> for CredentialSource {
    fn from(provider: Arc<AssumeRoleProvider>) -> Self {
        CredentialSource::AssumeRole(provider)
    }
}

impl From<EnvironmentVariableCredentialsProvider> for CredentialSource {
    fn from(provider: EnvironmentVariableCredentialsProvider) -> Self {
        CredentialSource::Environment(provider)
    }
}

impl From<SystemPropertiesCredentialsProvider> for CredentialSource {
    fn from(provider: SystemPropertiesCredentialsProvider) -> Self {
        CredentialSource::SystemProperties(provider)
    }
}

impl From<WebIdentityTokenCredentialsProvider> for CredentialSource {
    fn from(provider: WebIdentityTokenCredentialsProvider) -> Self {
        CredentialSource::WebIdentityToken(provider)
    }
}

impl From<ContainerCredentialsProvider> for CredentialSource {
    fn from(provider: ContainerCredentialsProvider) -> Self {
        CredentialSource::Container(provider)
    }
}
