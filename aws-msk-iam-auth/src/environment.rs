/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Load credentials from the process environment

use aws_msk_iam_types::credential::{self, future, CredentialsError, ProvideCredentials};
use aws_msk_iam_types::os_shim_internal::Env;
use aws_msk_iam_types::Credentials;

/// Load Credentials from Environment Variables
///
/// - `AWS_ACCESS_KEY_ID`, falling back to `AWS_ACCESS_KEY`
/// - `AWS_SECRET_ACCESS_KEY`, falling back to `AWS_SECRET_KEY`
/// - `AWS_SESSION_TOKEN` (optional)
#[derive(Debug)]
pub struct EnvironmentVariableCredentialsProvider {
    env: Env,
}

impl EnvironmentVariableCredentialsProvider {
    fn credentials(&self) -> credential::Result {
        let access_key = first_non_empty(&self.env, &["AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY"])
            .ok_or_else(|| CredentialsError::not_loaded("environment variable not set: AWS_ACCESS_KEY_ID"))?;
        let secret_key = first_non_empty(&self.env, &["AWS_SECRET_ACCESS_KEY", "AWS_SECRET_KEY"])
            .ok_or_else(|| CredentialsError::not_loaded("environment variable not set: AWS_SECRET_ACCESS_KEY"))?;
        let session_token = first_non_empty(&self.env, &["AWS_SESSION_TOKEN"]);
        Ok(Credentials::new(
            access_key,
            secret_key,
            session_token,
            None,
            ENV_PROVIDER,
        ))
    }
}

fn first_non_empty(env: &Env, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env.get(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

impl EnvironmentVariableCredentialsProvider {
    /// Create a `EnvironmentVariableCredentialsProvider` reading the real process environment
    pub fn new() -> Self {
        Self::new_with_env(Env::real())
    }

    /// Create a new `EnvironmentVariableCredentialsProvider` with `Env` overridden
    ///
    /// This function is intended for tests that mock out the process environment.
    pub fn new_with_env(env: Env) -> Self {
        Self { env }
    }
}

impl Default for EnvironmentVariableCredentialsProvider {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) const ENV_PROVIDER: &str = "EnvironmentVariables";

impl ProvideCredentials for EnvironmentVariableCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::ready(self.credentials())
    }
}
