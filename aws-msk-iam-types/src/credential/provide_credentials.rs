/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::Credentials;
use std::borrow::Cow;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
#[non_exhaustive]
pub enum CredentialsError {
    /// No credentials were available for this provider
    ///
    /// This is the expected outcome when the provider is simply not configured (no environment
    /// variables, no profile entry, no container endpoint). Provider chains fall through to the
    /// next provider.
    CredentialsNotLoaded(Cow<'static, str>),

    /// Loading credentials from this provider exceeded the maximum allowed duration
    ProviderTimedOut(Duration),

    /// The provider was given an invalid configuration
    ///
    /// For example:
    /// - an STS backed provider without an STS client
    /// - a container credentials URI that is not a valid URI
    InvalidConfiguration(Box<dyn Error + Send + Sync + 'static>),

    /// The provider experienced an error during credential resolution
    ///
    /// This may include errors like a 503 from the container metadata endpoint or a file system
    /// error when attempting to read a profile file.
    ProviderError(Box<dyn Error + Send + Sync + 'static>),

    /// The provider released its resources and can no longer load credentials
    ProviderClosed,

    /// An unexpected error occurred during credential resolution
    ///
    /// If the error is something that can occur during expected usage of a provider, `ProviderError`
    /// should be returned instead. Unhandled is reserved for exceptional cases, for example:
    /// - Returned data not UTF-8
    /// - A provider returns data that is missing required fields
    Unhandled(Box<dyn Error + Send + Sync + 'static>),
}

impl CredentialsError {
    pub fn not_loaded(reason: impl Into<Cow<'static, str>>) -> Self {
        CredentialsError::CredentialsNotLoaded(reason.into())
    }

    pub fn provider_error(err: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        CredentialsError::ProviderError(err.into())
    }

    pub fn invalid_configuration(err: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        CredentialsError::InvalidConfiguration(err.into())
    }

    pub fn unhandled(err: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        CredentialsError::Unhandled(err.into())
    }

    /// True when the provider was merely unconfigured rather than broken
    pub fn is_not_loaded(&self) -> bool {
        matches!(self, CredentialsError::CredentialsNotLoaded(_))
    }
}

impl Display for CredentialsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsError::CredentialsNotLoaded(reason) => {
                write!(f, "The provider could not provide credentials: {}", reason)
            }
            CredentialsError::ProviderTimedOut(d) => write!(
                f,
                "Credentials provider timed out after {} seconds",
                d.as_secs()
            ),
            CredentialsError::InvalidConfiguration(err) => {
                write!(f, "The credentials provider was not properly configured: {}", err)
            }
            CredentialsError::ProviderError(err) => {
                write!(f, "An error occurred while loading credentials: {}", err)
            }
            CredentialsError::ProviderClosed => {
                write!(f, "The credentials provider has been closed")
            }
            CredentialsError::Unhandled(err) => write!(f, "Unexpected credentials error: {}", err),
        }
    }
}

impl Error for CredentialsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CredentialsError::InvalidConfiguration(e)
            | CredentialsError::ProviderError(e)
            | CredentialsError::Unhandled(e) => Some(e.as_ref() as _),
            _ => None,
        }
    }
}

pub type Result = std::result::Result<Credentials, CredentialsError>;

pub mod future {
    use crate::credential::CredentialsError;
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

    /// Either a value that is already available or a boxed future that will produce it
    ///
    /// Trimmed down from `aws_smithy_async::future::now_or_later::NowOrLater`: `Later` always
    /// holds a boxed future, and `Now` panics if polled again after completion.
    enum NowOrLater<'a, T> {
        Now(Option<T>),
        Later(BoxFuture<'a, T>),
    }

    impl<'a, T: Unpin> Future for NowOrLater<'a, T> {
        type Output = T;

        fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            match self.get_mut() {
                NowOrLater::Now(value) => {
                    Poll::Ready(value.take().expect("cannot be polled after completion"))
                }
                NowOrLater::Later(future) => future.as_mut().poll(cx),
            }
        }
    }

    /// Future returned by [`ProvideCredentials::provide_credentials`](super::ProvideCredentials::provide_credentials)
    pub struct ProvideCredentials<'a>(NowOrLater<'a, super::Result>);

    impl<'a> ProvideCredentials<'a> {
        pub fn new(future: impl Future<Output = super::Result> + Send + 'a) -> Self {
            ProvideCredentials(NowOrLater::Later(Box::pin(future)))
        }

        pub fn ready(credentials: super::Result) -> Self {
            ProvideCredentials(NowOrLater::Now(Some(credentials)))
        }
    }

    impl Future for ProvideCredentials<'_> {
        type Output = super::Result;

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            Pin::new(&mut self.0).poll(cx)
        }
    }

    /// Future returned by [`ProvideCredentials::refresh`](super::ProvideCredentials::refresh)
    pub struct Refresh<'a>(NowOrLater<'a, Result<(), CredentialsError>>);

    impl<'a> Refresh<'a> {
        pub fn new(future: impl Future<Output = Result<(), CredentialsError>> + Send + 'a) -> Self {
            Refresh(NowOrLater::Later(Box::pin(future)))
        }

        pub fn ready(result: Result<(), CredentialsError>) -> Self {
            Refresh(NowOrLater::Now(Some(result)))
        }
    }

    impl Future for Refresh<'_> {
        type Output = Result<(), CredentialsError>;

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            Pin::new(&mut self.0).poll(cx)
        }
    }
}

/// Asynchronous Credentials Provider
///
/// Implementations must be safe to call concurrently: any internal caching has to publish new
/// credentials atomically so a reader never observes a half-updated value.
pub trait ProvideCredentials: Send + Sync {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a;

    /// Force the provider to reload its internal state
    ///
    /// Providers without internal state don't need to override this.
    fn refresh<'a>(&'a self) -> future::Refresh<'a>
    where
        Self: 'a,
    {
        future::Refresh::ready(Ok(()))
    }
}

impl ProvideCredentials for Credentials {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::ready(Ok(self.clone()))
    }
}

impl ProvideCredentials for Arc<dyn ProvideCredentials> {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        self.as_ref().provide_credentials()
    }

    fn refresh<'a>(&'a self) -> future::Refresh<'a>
    where
        Self: 'a,
    {
        self.as_ref().refresh()
    }
}

/// Credentials provider wrapper that may be shared
///
/// Newtype wrapper around `ProvideCredentials` that implements `Clone` using an internal `Arc`.
#[derive(Clone)]
pub struct SharedCredentialsProvider(Arc<dyn ProvideCredentials>);

impl SharedCredentialsProvider {
    pub fn new(provider: impl ProvideCredentials + 'static) -> Self {
        Self(Arc::new(provider))
    }
}

impl Debug for SharedCredentialsProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SharedCredentialsProvider")
    }
}

impl AsRef<dyn ProvideCredentials> for SharedCredentialsProvider {
    fn as_ref(&self) -> &(dyn ProvideCredentials + 'static) {
        self.0.as_ref()
    }
}

impl From<Arc<dyn ProvideCredentials>> for SharedCredentialsProvider {
    fn from(provider: Arc<dyn ProvideCredentials>) -> Self {
        SharedCredentialsProvider(provider)
    }
}

impl ProvideCredentials for SharedCredentialsProvider {
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
        self.0.refresh()
    }
}

#[cfg(test)]
mod test {
    use crate::credential::{future, CredentialsError, ProvideCredentials, SharedCredentialsProvider};
    use crate::Credentials;
    use std::error::Error;

    #[tokio::test]
    async fn static_credentials_provide_themselves() {
        let provider = SharedCredentialsProvider::new(Credentials::from_keys("akid", "secret", None));
        let creds = provider.provide_credentials().await.expect("static creds");
        assert_eq!(creds.access_key_id(), "akid");
        provider.refresh().await.expect("refresh is a no-op");
    }

    #[test]
    fn not_loaded_is_distinguishable() {
        let err = CredentialsError::not_loaded("no env vars");
        assert!(err.is_not_loaded());
        assert!(err.to_string().contains("no env vars"));
        let err = CredentialsError::provider_error("boom");
        assert!(!err.is_not_loaded());
        assert_eq!(err.source().map(|e| e.to_string()), Some("boom".to_string()));
    }

    #[tokio::test]
    async fn ready_and_boxed_futures_resolve() {
        let now = future::ProvideCredentials::ready(Ok(Credentials::from_keys("now", "s", None)));
        assert_eq!(now.await.unwrap().access_key_id(), "now");
        let later = future::ProvideCredentials::new(async {
            tokio::task::yield_now().await;
            Ok(Credentials::from_keys("later", "s", None))
        });
        assert_eq!(later.await.unwrap().access_key_id(), "later");
        future::Refresh::ready(Err(CredentialsError::ProviderClosed))
            .await
            .expect_err("ready error");
    }
}
