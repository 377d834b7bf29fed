/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

#![allow(dead_code)]

use aws_msk_iam_auth::http::{BoxError, BoxFuture, HttpClient, SharedHttpClient};
use aws_msk_iam_auth::provider_config::ProviderConfig;
use aws_msk_iam_auth::sts::{
    AssumeRoleRequest, AssumeRoleWithWebIdentityRequest, SharedStsClient, StsClient,
};
use aws_msk_iam_types::credential;
use aws_msk_iam_types::os_shim_internal::{Env, Fs, Properties};
use aws_msk_iam_types::Credentials;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// STS fake handing out numbered sessions: `ASIA{n}` / `secret{n}` / `token{n}`
#[derive(Clone, Default)]
pub struct TestSts {
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<AssumeRoleRequest>>>,
}

impl TestSts {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<AssumeRoleRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn session(&self) -> credential::Result {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Credentials::new(
            format!("ASIA{}", n),
            format!("secret{}", n),
            Some(format!("token{}", n)),
            Some(SystemTime::now() + Duration::from_secs(3600)),
            "TestSts",
        ))
    }
}

impl StsClient for TestSts {
    fn assume_role<'a>(
        &'a self,
        request: AssumeRoleRequest,
        _base_credentials: Credentials,
    ) -> BoxFuture<'a, credential::Result> {
        self.requests.lock().unwrap().push(request);
        Box::pin(async move {
            // give concurrent readers a chance to interleave with the swap
            tokio::task::yield_now().await;
            self.session()
        })
    }

    fn assume_role_with_web_identity<'a>(
        &'a self,
        _request: AssumeRoleWithWebIdentityRequest,
    ) -> BoxFuture<'a, credential::Result> {
        Box::pin(async move { self.session() })
    }
}

/// HTTP client that counts requests and fails every one of them
#[derive(Clone, Default)]
pub struct FailingHttp {
    requests: Arc<AtomicUsize>,
}

impl FailingHttp {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl HttpClient for FailingHttp {
    fn send<'a>(
        &'a self,
        _request: http::Request<()>,
    ) -> BoxFuture<'a, Result<http::Response<Bytes>, BoxError>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err("connection refused".into()) })
    }
}

/// A configuration isolated from the real process
pub fn config(
    env: &[(&str, &str)],
    files: &[(&str, &str)],
    sts: &TestSts,
    http: &FailingHttp,
) -> ProviderConfig {
    ProviderConfig::empty()
        .with_env(Env::from_slice(env))
        .with_fs(Fs::from_slice(files))
        .with_properties(Properties::from_slice(&[]))
        .with_sts_client(SharedStsClient::new(sts.clone()))
        .with_http_client(SharedHttpClient::new(http.clone()))
}

/// True when every part of `credentials` comes from the same STS session
pub fn is_consistent(credentials: &Credentials) -> bool {
    let generation = match credentials.access_key_id().strip_prefix("ASIA") {
        Some(generation) => generation,
        None => return true,
    };
    credentials.secret_access_key() == format!("secret{}", generation)
        && credentials.session_token() == Some(format!("token{}", generation).as_str())
}
