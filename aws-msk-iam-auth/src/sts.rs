/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Credential providers backed by the AWS Security Token Service (STS)
//!
//! This crate does not talk to STS itself. Callers that need role assumption supply an
//! [`StsClient`] through [`ProviderConfig::with_sts_client`](crate::provider_config::ProviderConfig::with_sts_client);
//! the providers in this module own everything around the call: deciding when to call, caching
//! the session credentials, refreshing them in the background and releasing that background work.

use crate::http::BoxFuture;
use aws_msk_iam_types::credential::{self, CredentialsError};
use aws_msk_iam_types::Credentials;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

pub use assume_role::{AssumeRoleProvider, AssumeRoleProviderBuilder};

mod assume_role;

/// Session name used when `awsRoleSessionName` is not configured
pub const DEFAULT_ROLE_SESSION_NAME: &str = "aws-msk-iam-auth";

/// Input to `sts:AssumeRole`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub role_session_name: String,
}

/// Input to `sts:AssumeRoleWithWebIdentity`
#[derive(Clone, Eq, PartialEq)]
pub struct AssumeRoleWithWebIdentityRequest {
    pub role_arn: String,
    pub role_session_name: String,
    pub web_identity_token: String,
}

impl Debug for AssumeRoleWithWebIdentityRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssumeRoleWithWebIdentityRequest")
            .field("role_arn", &self.role_arn)
            .field("role_session_name", &self.role_session_name)
            .field("web_identity_token", &"** redacted **")
            .finish()
    }
}

/// The STS operations needed by the role based credential providers
///
/// Implementations are expected to apply their own timeouts and retries. Returned credentials
/// should carry the session expiration so that they can be refreshed ahead of time.
pub trait StsClient: Send + Sync {
    /// Exchange `base_credentials` for session credentials of `request.role_arn`
    fn assume_role<'a>(
        &'a self,
        request: AssumeRoleRequest,
        base_credentials: Credentials,
    ) -> BoxFuture<'a, credential::Result>;

    /// Exchange an OIDC token for session credentials of `request.role_arn`
    fn assume_role_with_web_identity<'a>(
        &'a self,
        request: AssumeRoleWithWebIdentityRequest,
    ) -> BoxFuture<'a, credential::Result>;
}

/// STS client that may be shared between providers
#[derive(Clone)]
pub struct SharedStsClient(Arc<dyn StsClient>);

impl SharedStsClient {
    pub fn new(client: impl StsClient + 'static) -> Self {
        SharedStsClient(Arc::new(client))
    }
}

impl Debug for SharedStsClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SharedStsClient")
    }
}

impl StsClient for SharedStsClient {
    fn assume_role<'a>(
        &'a self,
        request: AssumeRoleRequest,
        base_credentials: Credentials,
    ) -> BoxFuture<'a, credential::Result> {
        self.0.assume_role(request, base_credentials)
    }

    fn assume_role_with_web_identity<'a>(
        &'a self,
        request: AssumeRoleWithWebIdentityRequest,
    ) -> BoxFuture<'a, credential::Result> {
        self.0.assume_role_with_web_identity(request)
    }
}

pub(crate) fn missing_sts_client() -> CredentialsError {
    CredentialsError::invalid_configuration(
        "role based credentials require an STS client, but none was configured",
    )
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::{AssumeRoleRequest, AssumeRoleWithWebIdentityRequest, StsClient};
    use crate::http::BoxFuture;
    use aws_msk_iam_types::credential::{self, CredentialsError};
    use aws_msk_iam_types::Credentials;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, SystemTime};

    /// Records every call and hands out numbered session credentials
    ///
    /// Generation `n` returns `ASIA{n}` / `secret{n}` / `token{n}` expiring `ttl` after `now`.
    #[derive(Clone)]
    pub(crate) struct FakeSts {
        pub(crate) calls: Arc<AtomicUsize>,
        pub(crate) assume_role_requests: Arc<Mutex<Vec<(AssumeRoleRequest, Credentials)>>>,
        pub(crate) web_identity_requests: Arc<Mutex<Vec<AssumeRoleWithWebIdentityRequest>>>,
        pub(crate) ttl: Duration,
        pub(crate) fail: Arc<Mutex<bool>>,
        pub(crate) now: Arc<dyn Fn() -> SystemTime + Send + Sync>,
    }

    impl FakeSts {
        pub(crate) fn new(now: impl Fn() -> SystemTime + Send + Sync + 'static, ttl: Duration) -> Self {
            FakeSts {
                calls: Default::default(),
                assume_role_requests: Default::default(),
                web_identity_requests: Default::default(),
                ttl,
                fail: Default::default(),
                now: Arc::new(now),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn set_failing(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        fn next(&self) -> credential::Result {
            if *self.fail.lock().unwrap() {
                return Err(CredentialsError::provider_error("sts is unavailable"));
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Credentials::new(
                format!("ASIA{}", n),
                format!("secret{}", n),
                Some(format!("token{}", n)),
                Some((self.now)() + self.ttl),
                "FakeSts",
            ))
        }
    }

    impl StsClient for FakeSts {
        fn assume_role<'a>(
            &'a self,
            request: AssumeRoleRequest,
            base_credentials: Credentials,
        ) -> BoxFuture<'a, credential::Result> {
            self.assume_role_requests
                .lock()
                .unwrap()
                .push((request, base_credentials));
            let result = self.next();
            Box::pin(async move { result })
        }

        fn assume_role_with_web_identity<'a>(
            &'a self,
            request: AssumeRoleWithWebIdentityRequest,
        ) -> BoxFuture<'a, credential::Result> {
            self.web_identity_requests.lock().unwrap().push(request);
            let result = self.next();
            Box::pin(async move { result })
        }
    }
}
