/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Load credentials from process-wide system properties

use aws_msk_iam_types::credential::{self, future, CredentialsError, ProvideCredentials};
use aws_msk_iam_types::os_shim_internal::Properties;
use aws_msk_iam_types::Credentials;

pub const ACCESS_KEY_PROPERTY: &str = "aws.accessKeyId";
pub const SECRET_KEY_PROPERTY: &str = "aws.secretKey";
pub const SESSION_TOKEN_PROPERTY: &str = "aws.sessionToken";

pub(crate) const SYSTEM_PROPERTIES_PROVIDER: &str = "SystemProperties";

/// Load Credentials from system properties
///
/// - `aws.accessKeyId`
/// - `aws.secretKey`
/// - `aws.sessionToken` (optional)
///
/// Properties are read from [`Properties`]; applications populate the process registry with
/// [`Properties::set_system_property`].
#[derive(Debug)]
pub struct SystemPropertiesCredentialsProvider {
    properties: Properties,
}

impl SystemPropertiesCredentialsProvider {
    pub fn new() -> Self {
        Self::new_with_properties(Properties::real())
    }

    pub fn new_with_properties(properties: Properties) -> Self {
        Self { properties }
    }

    fn property(&self, key: &str) -> Option<String> {
        self.properties
            .get(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn credentials(&self) -> credential::Result {
        let access_key = self.property(ACCESS_KEY_PROPERTY).ok_or_else(|| {
            CredentialsError::not_loaded(format!("system property not set: {}", ACCESS_KEY_PROPERTY))
        })?;
        let secret_key = self.property(SECRET_KEY_PROPERTY).ok_or_else(|| {
            CredentialsError::not_loaded(format!("system property not set: {}", SECRET_KEY_PROPERTY))
        })?;
        Ok(Credentials::new(
            access_key,
            secret_key,
            self.property(SESSION_TOKEN_PROPERTY),
            None,
            SYSTEM_PROPERTIES_PROVIDER,
        ))
    }
}

impl Default for SystemPropertiesCredentialsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvideCredentials for SystemPropertiesCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::ready(self.credentials())
    }
}

#[cfg(test)]
mod test {
    use super::SystemPropertiesCredentialsProvider;
    use aws_msk_iam_types::credential::ProvideCredentials;
    use aws_msk_iam_types::os_shim_internal::Properties;

    #[tokio::test]
    async fn loads_keys_and_token() {
        let provider = SystemPropertiesCredentialsProvider::new_with_properties(
            Properties::from_slice(&[
                ("aws.accessKeyId", "AKID"),
                ("aws.secretKey", "SECRET"),
                ("aws.sessionToken", "TOKEN"),
            ]),
        );
        let creds = provider.provide_credentials().await.expect("valid credentials");
        assert_eq!(creds.access_key_id(), "AKID");
        assert_eq!(creds.secret_access_key(), "SECRET");
        assert_eq!(creds.session_token(), Some("TOKEN"));
        assert_eq!(creds.provider_name(), "SystemProperties");
    }

    #[tokio::test]
    async fn missing_access_key_is_not_loaded() {
        let provider = SystemPropertiesCredentialsProvider::new_with_properties(
            Properties::from_slice(&[("aws.secretKey", "SECRET")]),
        );
        let err = provider
            .provide_credentials()
            .await
            .expect_err("no access key");
        assert!(err.is_not_loaded());
        assert!(err.to_string().contains("aws.accessKeyId"));
    }
}
