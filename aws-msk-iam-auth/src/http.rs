/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! HTTP client abstraction used by the metadata credential providers
//!
//! Credential endpoints (container credentials, instance metadata) only need a tiny slice of
//! HTTP: send a request without a body and read the whole response. [`HttpClient`] captures that
//! contract so tests can substitute a fake. With the `hyper-client` feature enabled (the default),
//! [`HyperClient`] is used when no other client is configured.

use bytes::Bytes;
use std::error::Error;
use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Minimal HTTP client
pub trait HttpClient: Send + Sync {
    fn send<'a>(
        &'a self,
        request: http::Request<()>,
    ) -> BoxFuture<'a, Result<http::Response<Bytes>, BoxError>>;

    /// Whether this client can send requests to `https` URIs
    fn supports_https(&self) -> bool {
        true
    }
}

/// HTTP client that may be shared between providers
#[derive(Clone)]
pub struct SharedHttpClient(Arc<dyn HttpClient>);

impl SharedHttpClient {
    pub fn new(client: impl HttpClient + 'static) -> Self {
        SharedHttpClient(Arc::new(client))
    }
}

impl Debug for SharedHttpClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SharedHttpClient")
    }
}

impl HttpClient for SharedHttpClient {
    fn send<'a>(
        &'a self,
        request: http::Request<()>,
    ) -> BoxFuture<'a, Result<http::Response<Bytes>, BoxError>> {
        self.0.send(request)
    }

    fn supports_https(&self) -> bool {
        self.0.supports_https()
    }
}

/// Create the HTTP client for the currently enabled cargo features.
///
/// Returns `None` when the `hyper-client` feature is disabled.
pub(crate) fn default_http_client() -> Option<SharedHttpClient> {
    #[cfg(feature = "hyper-client")]
    {
        Some(SharedHttpClient::new(HyperClient::new()))
    }
    #[cfg(not(feature = "hyper-client"))]
    {
        None
    }
}

#[cfg(feature = "hyper-client")]
pub use hyper_client::HyperClient;

#[cfg(feature = "hyper-client")]
mod hyper_client {
    use super::{BoxError, BoxFuture, HttpClient};
    use bytes::Bytes;
    use hyper::client::HttpConnector;
    use hyper::{Body, Client};

    /// Plain HTTP client backed by `hyper`
    ///
    /// Metadata endpoints are link-local or loopback addresses, so TLS is not supported.
    #[derive(Clone, Debug)]
    pub struct HyperClient {
        client: Client<HttpConnector, Body>,
    }

    impl HyperClient {
        pub fn new() -> Self {
            HyperClient {
                client: Client::new(),
            }
        }
    }

    impl Default for HyperClient {
        fn default() -> Self {
            Self::new()
        }
    }

    impl HyperClient {
        async fn call(&self, request: http::Request<()>) -> Result<http::Response<Bytes>, BoxError> {
            let (parts, _) = request.into_parts();
            let request = http::Request::from_parts(parts, Body::empty());
            let response = self.client.request(request).await?;
            let (parts, body) = response.into_parts();
            let body = hyper::body::to_bytes(body).await?;
            Ok(http::Response::from_parts(parts, body))
        }
    }

    impl HttpClient for HyperClient {
        fn send<'a>(
            &'a self,
            request: http::Request<()>,
        ) -> BoxFuture<'a, Result<http::Response<Bytes>, BoxError>> {
            Box::pin(self.call(request))
        }

        fn supports_https(&self) -> bool {
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::{BoxError, BoxFuture, HttpClient};
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// A recorded request: method, uri and headers flattened into `(name, value)` pairs
    #[derive(Clone, Debug)]
    pub(crate) struct RecordedRequest {
        pub(crate) method: http::Method,
        pub(crate) uri: String,
        pub(crate) headers: Vec<(String, String)>,
    }

    impl RecordedRequest {
        pub(crate) fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    /// Replays canned responses in order and records every request it receives
    #[derive(Clone, Default)]
    pub(crate) struct ReplayingClient {
        responses: Arc<Mutex<VecDeque<Result<(u16, String), String>>>>,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    impl ReplayingClient {
        pub(crate) fn new(responses: Vec<(u16, &str)>) -> Self {
            let client = ReplayingClient::default();
            for (status, body) in responses {
                client.push(status, body);
            }
            client
        }

        pub(crate) fn push(&self, status: u16, body: &str) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok((status, body.to_string())));
        }

        pub(crate) fn push_error(&self, message: &str) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(message.to_string()));
        }

        pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl HttpClient for ReplayingClient {
        fn send<'a>(
            &'a self,
            request: http::Request<()>,
        ) -> BoxFuture<'a, Result<http::Response<Bytes>, BoxError>> {
            self.requests.lock().unwrap().push(RecordedRequest {
                method: request.method().clone(),
                uri: request.uri().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_str().unwrap().to_string()))
                    .collect(),
            });
            let next = self.responses.lock().unwrap().pop_front();
            Box::pin(async move {
                match next {
                    Some(Ok((status, body))) => Ok(http::Response::builder()
                        .status(status)
                        .body(Bytes::from(body))
                        .unwrap()),
                    Some(Err(message)) => Err(message.into()),
                    None => Err("no more responses were recorded".into()),
                }
            })
        }
    }
}
