/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Errors surfaced by the [`CredentialResolver`](crate::CredentialResolver)
//!
//! Individual sources report [`CredentialsError`]. The resolver collects those into
//! [`NoCredentialsResolved`] or [`RefreshFailure`] so that every attempted source is visible.

use aws_msk_iam_types::CredentialsError;
use std::borrow::Cow;
use thiserror::Error;

/// A recognized configuration option had an unusable value
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    #[error("option `{key}` must be a string but was {found}")]
    InvalidType {
        key: &'static str,
        found: &'static str,
    },
    #[error("option `{key}` must not be blank")]
    EmptyValue { key: &'static str },
    #[error("malformed JAAS configuration: {reason}")]
    MalformedJaasConfig { reason: String },
}

/// A single source in the chain failed
#[derive(Debug, Error)]
#[error("{provider}: {error}")]
pub struct SourceFailure {
    provider: Cow<'static, str>,
    #[source]
    error: CredentialsError,
}

impl SourceFailure {
    pub(crate) fn new(provider: impl Into<Cow<'static, str>>, error: CredentialsError) -> Self {
        SourceFailure {
            provider: provider.into(),
            error,
        }
    }

    /// Name of the failing source
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn error(&self) -> &CredentialsError {
        &self.error
    }
}

fn join(failures: &[SourceFailure]) -> String {
    if failures.is_empty() {
        return "no sources were configured".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Every source in the chain was tried and none provided credentials
#[derive(Debug, Error)]
#[error("no credentials could be resolved from the chain [{}]", join(.failures))]
pub struct NoCredentialsResolved {
    failures: Vec<SourceFailure>,
}

impl NoCredentialsResolved {
    pub(crate) fn new(failures: Vec<SourceFailure>) -> Self {
        NoCredentialsResolved { failures }
    }

    /// One entry per attempted source, in chain order
    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }

    /// Names of the attempted sources, in chain order
    pub fn attempted(&self) -> Vec<&str> {
        self.failures.iter().map(SourceFailure::provider).collect()
    }
}

/// One or more sources failed to refresh
///
/// Every source is refreshed regardless of the others, so this lists all failures of a single
/// refresh.
#[derive(Debug, Error)]
#[error("failed to refresh credentials [{}]", join(.failures))]
pub struct RefreshFailure {
    failures: Vec<SourceFailure>,
}

impl RefreshFailure {
    pub(crate) fn new(failures: Vec<SourceFailure>) -> Self {
        RefreshFailure { failures }
    }

    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }
}

#[cfg(test)]
mod test {
    use super::{ConfigurationError, NoCredentialsResolved, SourceFailure};
    use aws_msk_iam_types::CredentialsError;

    #[test]
    fn no_credentials_lists_every_source() {
        let err = NoCredentialsResolved::new(vec![
            SourceFailure::new(
                "EnvironmentVariables",
                CredentialsError::not_loaded("AWS_ACCESS_KEY_ID not set"),
            ),
            SourceFailure::new("ContainerMetadata", CredentialsError::ProviderClosed),
        ]);
        assert_eq!(
            err.attempted(),
            vec!["EnvironmentVariables", "ContainerMetadata"]
        );
        let message = err.to_string();
        assert!(message.starts_with("no credentials could be resolved from the chain [EnvironmentVariables: "));
        assert!(message.contains("; ContainerMetadata: "));
    }

    #[test]
    fn configuration_messages() {
        assert_eq!(
            ConfigurationError::InvalidType {
                key: "awsRoleArn",
                found: "a number"
            }
            .to_string(),
            "option `awsRoleArn` must be a string but was a number"
        );
        assert_eq!(
            ConfigurationError::EmptyValue {
                key: "awsProfileName"
            }
            .to_string(),
            "option `awsProfileName` must not be blank"
        );
    }
}
