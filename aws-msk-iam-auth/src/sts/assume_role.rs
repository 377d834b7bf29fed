/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Assume role credentials with a background refresh loop

use crate::cache::{ExpiringCache, DEFAULT_BUFFER_TIME};
use crate::default_chain::DefaultCredentialsChain;
use crate::provider_config::ProviderConfig;
use crate::sts::{missing_sts_client, AssumeRoleRequest, SharedStsClient, StsClient, DEFAULT_ROLE_SESSION_NAME};
use crate::timeout::Timeout;
use aws_msk_iam_types::credential::{
    self, future, CredentialsError, ProvideCredentials, SharedCredentialsProvider,
};
use aws_msk_iam_types::time::SharedTimeSource;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;

/// How often the background loop checks whether the session is about to expire
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound for a single background refresh
const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(5);

/// The background loop refreshes the session this long before it expires
///
/// Callers only reload on their own once the session is within [`DEFAULT_BUFFER_TIME`] of
/// expiring, so in the common case they never wait on STS.
const DEFAULT_REFRESH_AHEAD: Duration = Duration::from_secs(5 * 60);

const REFRESH_THREAD_NAME: &str = "msk-iam-assume-role-refresh";

#[derive(Clone)]
struct Inner {
    request: AssumeRoleRequest,
    sts_client: Option<SharedStsClient>,
    base: SharedCredentialsProvider,
    cache: ExpiringCache,
    time: SharedTimeSource,
    refresh_ahead: Duration,
}

impl Inner {
    async fn assume_role(&self) -> credential::Result {
        let sts = self.sts_client.as_ref().ok_or_else(missing_sts_client)?;
        let base = self
            .base
            .provide_credentials()
            .instrument(tracing::debug_span!("load_base_credentials"))
            .await?;
        tracing::debug!(role_arn = %self.request.role_arn, session_name = %self.request.role_session_name, "assuming role");
        sts.assume_role(self.request.clone(), base).await
    }

    async fn credentials(&self) -> credential::Result {
        self.cache.get_or_load(|| self.assume_role()).await
    }

    async fn reload(&self) -> Result<(), CredentialsError> {
        let credentials = self.assume_role().await?;
        self.cache.replace(credentials).await;
        Ok(())
    }

    /// True once loaded credentials are within `refresh_ahead` of expiring
    async fn needs_refresh(&self) -> bool {
        match self.cache.expiry().await {
            Some(Some(expiry)) => self.time.now() + self.refresh_ahead >= expiry,
            // nothing was loaded yet, or the session never expires
            _ => false,
        }
    }
}

struct RefreshLoop {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RefreshLoop {
    fn spawn(inner: Inner, poll_interval: Duration, timeout: Duration) -> std::io::Result<Self> {
        let (cancel, cancelled) = watch::channel(false);
        let handle = thread::Builder::new()
            .name(REFRESH_THREAD_NAME.into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        tracing::error!(error = %err, "failed to start the credential refresh runtime");
                        return;
                    }
                };
                runtime.block_on(
                    refresh_loop(inner, cancelled, poll_interval, timeout)
                        .instrument(tracing::debug_span!("assume_role_refresh_loop")),
                );
            })?;
        Ok(RefreshLoop { cancel, handle })
    }

    fn cancel(&self) {
        // the loop may already have exited, in which case nobody is listening
        let _ = self.cancel.send(true);
    }
}

/// Delay before the next attempt after `failures` consecutive failed refreshes
///
/// Doubles from `poll_interval` and never exceeds `max`.
fn backoff(poll_interval: Duration, failures: u32, max: Duration) -> Duration {
    poll_interval
        .checked_mul(1 << failures.min(16))
        .unwrap_or(max)
        .min(max)
        .max(poll_interval)
}

async fn refresh_loop(
    inner: Inner,
    mut cancelled: watch::Receiver<bool>,
    poll_interval: Duration,
    timeout: Duration,
) {
    tracing::debug!("starting credential refresh loop");
    let max_backoff = inner.refresh_ahead / 2;
    let mut failures: u32 = 0;
    loop {
        if *cancelled.borrow() {
            break;
        }
        let mut wait = poll_interval;
        if inner.needs_refresh().await {
            tracing::info!(role_arn = %inner.request.role_arn, "refreshing assumed role credentials");
            let failed = tokio::select! {
                result = Timeout::new(inner.reload(), timeout) => match result {
                    Ok(Ok(())) => {
                        tracing::info!("refreshed assumed role credentials");
                        false
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(error = %err, "failed to refresh assumed role credentials");
                        true
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "refreshing assumed role credentials timed out");
                        true
                    }
                },
                _ = cancelled.changed() => break,
            };
            if failed {
                failures = failures.saturating_add(1);
                wait = backoff(poll_interval, failures, max_backoff);
                tracing::debug!(failures, retry_in = ?wait, "backing off before the next refresh");
            } else {
                failures = 0;
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancelled.changed() => break,
        }
    }
    tracing::debug!("credential refresh loop stopped");
}

/// Credentials provider that assumes a role through STS
///
/// The STS call is authenticated with base credentials that come from the default credential
/// chain unless overridden. Session credentials are cached. A background thread refreshes them
/// ahead of expiry so that callers rarely wait on STS, and nothing is loaded until the first
/// call to [`provide_credentials`](ProvideCredentials::provide_credentials).
///
/// The background thread is released by [`close`](AssumeRoleProvider::close). Dropping the
/// provider signals the thread to stop without waiting for it.
///
/// ```rust,no_run
/// use aws_msk_iam_auth::sts::AssumeRoleProvider;
/// let provider = AssumeRoleProvider::builder("arn:aws:iam::123456789012:role/msk-client")
///     .session_name("my-consumer")
///     .build();
/// provider.close();
/// ```
pub struct AssumeRoleProvider {
    inner: Inner,
    refresh_loop: Mutex<Option<RefreshLoop>>,
    closed: AtomicBool,
}

impl Debug for AssumeRoleProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssumeRoleProvider")
            .field("role_arn", &self.inner.request.role_arn)
            .field("session_name", &self.inner.request.role_session_name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl AssumeRoleProvider {
    pub fn builder(role_arn: impl Into<String>) -> AssumeRoleProviderBuilder {
        AssumeRoleProviderBuilder::new(role_arn)
    }

    pub fn role_arn(&self) -> &str {
        &self.inner.request.role_arn
    }

    pub fn session_name(&self) -> &str {
        &self.inner.request.role_session_name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop the background refresh loop and wait for its thread to exit
    ///
    /// Calling `close` more than once has no further effect. Once closed, the provider fails
    /// every request with [`CredentialsError::ProviderClosed`].
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let refresh_loop = self
            .refresh_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(refresh_loop) = refresh_loop {
            refresh_loop.cancel();
            // never join from the refresh thread itself
            if refresh_loop.handle.thread().id() != thread::current().id()
                && refresh_loop.handle.join().is_err()
            {
                tracing::warn!("credential refresh thread panicked");
            }
        }
        tracing::debug!(role_arn = %self.role_arn(), "closed assume role provider");
    }

    async fn credentials(&self) -> credential::Result {
        if self.is_closed() {
            return Err(CredentialsError::ProviderClosed);
        }
        self.inner.credentials().await
    }

    async fn reload(&self) -> Result<(), CredentialsError> {
        if self.is_closed() {
            return Err(CredentialsError::ProviderClosed);
        }
        self.inner.reload().await
    }
}

impl Drop for AssumeRoleProvider {
    fn drop(&mut self) {
        let refresh_loop = self
            .refresh_loop
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(refresh_loop) = refresh_loop {
            refresh_loop.cancel();
        }
    }
}

impl ProvideCredentials for AssumeRoleProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials().instrument(tracing::debug_span!(
            "assume_role",
            role_arn = %self.role_arn()
        )))
    }

    fn refresh<'a>(&'a self) -> future::Refresh<'a>
    where
        Self: 'a,
    {
        future::Refresh::new(self.reload())
    }
}

/// Builder for [`AssumeRoleProvider`]
pub struct AssumeRoleProviderBuilder {
    role_arn: String,
    session_name: Option<String>,
    config: Option<ProviderConfig>,
    base: Option<SharedCredentialsProvider>,
    poll_interval: Duration,
    refresh_timeout: Duration,
    refresh_ahead: Duration,
}

impl AssumeRoleProviderBuilder {
    pub fn new(role_arn: impl Into<String>) -> Self {
        AssumeRoleProviderBuilder {
            role_arn: role_arn.into(),
            session_name: None,
            config: None,
            base: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            refresh_ahead: DEFAULT_REFRESH_AHEAD,
        }
    }

    /// Session name for the assumed role
    ///
    /// Blank names are replaced with `aws-msk-iam-auth`.
    pub fn session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = Some(session_name.into());
        self
    }

    pub fn configure(mut self, config: &ProviderConfig) -> Self {
        self.config = Some(config.clone());
        self
    }

    /// Credentials used to call STS
    ///
    /// Defaults to the [`DefaultCredentialsChain`] built from the same configuration.
    pub fn base_credentials(mut self, base: impl ProvideCredentials + 'static) -> Self {
        self.base = Some(SharedCredentialsProvider::new(base));
        self
    }

    /// How often the background loop wakes up to check the session expiry
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Upper bound for a single background refresh
    pub fn refresh_timeout(mut self, refresh_timeout: Duration) -> Self {
        self.refresh_timeout = refresh_timeout;
        self
    }

    /// Refresh this long before the session expires
    pub fn refresh_ahead(mut self, refresh_ahead: Duration) -> Self {
        self.refresh_ahead = refresh_ahead;
        self
    }

    pub fn build(self) -> AssumeRoleProvider {
        let config = self.config.unwrap_or_default();
        let session_name = self
            .session_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_ROLE_SESSION_NAME.to_string());
        let base = self.base.unwrap_or_else(|| {
            SharedCredentialsProvider::new(
                DefaultCredentialsChain::builder().configure(&config).build(),
            )
        });
        let inner = Inner {
            request: AssumeRoleRequest {
                role_arn: self.role_arn,
                role_session_name: session_name,
            },
            sts_client: config.sts_client(),
            base,
            cache: ExpiringCache::new(config.time_source(), DEFAULT_BUFFER_TIME),
            time: config.time_source(),
            refresh_ahead: self.refresh_ahead,
        };
        let refresh_loop =
            match RefreshLoop::spawn(inner.clone(), self.poll_interval, self.refresh_timeout) {
                Ok(refresh_loop) => Some(refresh_loop),
                Err(err) => {
                    tracing::warn!(error = %err, "could not start the credential refresh thread, credentials will only be refreshed on demand");
                    None
                }
            };
        AssumeRoleProvider {
            inner,
            refresh_loop: Mutex::new(refresh_loop),
            closed: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{backoff, AssumeRoleProvider};
    use crate::provider_config::ProviderConfig;
    use crate::sts::test_util::FakeSts;
    use crate::sts::SharedStsClient;
    use aws_msk_iam_types::credential::{CredentialsError, ProvideCredentials};
    use aws_msk_iam_types::time::ManualTimeSource;
    use aws_msk_iam_types::Credentials;
    use std::time::{Duration, Instant, UNIX_EPOCH};

    const ROLE: &str = "arn:aws:iam::123456789012:role/msk-client";

    fn fake_sts(time: &ManualTimeSource) -> FakeSts {
        let time = time.clone();
        FakeSts::new(move || time.now(), Duration::from_secs(15 * 60))
    }

    fn provider(time: &ManualTimeSource, sts: &FakeSts) -> AssumeRoleProvider {
        AssumeRoleProvider::builder(ROLE)
            .configure(
                &ProviderConfig::empty()
                    .with_time_source(time.clone())
                    .with_sts_client(SharedStsClient::new(sts.clone())),
            )
            .base_credentials(Credentials::from_keys("BASEAKID", "base-secret", None))
            .poll_interval(Duration::from_millis(10))
            .build()
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition was not met in time");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn session_name_defaults() {
        let provider = AssumeRoleProvider::builder(ROLE)
            .configure(&ProviderConfig::empty())
            .session_name("   ")
            .build();
        assert_eq!(provider.role_arn(), ROLE);
        assert_eq!(provider.session_name(), "aws-msk-iam-auth");
        provider.close();
    }

    #[tokio::test]
    async fn assumes_role_with_base_credentials() {
        let time = ManualTimeSource::new(UNIX_EPOCH + Duration::from_secs(1_000));
        let sts = fake_sts(&time);
        let provider = provider(&time, &sts);
        assert_eq!(sts.calls(), 0, "construction does not call STS");

        let creds = provider.provide_credentials().await.expect("assumed role");
        assert_eq!(creds.access_key_id(), "ASIA1");
        assert_eq!(creds.session_token(), Some("token1"));
        provider.provide_credentials().await.expect("cached");
        assert_eq!(sts.calls(), 1);

        let (request, base) = sts.assume_role_requests.lock().unwrap()[0].clone();
        assert_eq!(request.role_arn, ROLE);
        assert_eq!(request.role_session_name, "aws-msk-iam-auth");
        assert_eq!(base.access_key_id(), "BASEAKID");
        provider.close();
    }

    #[tokio::test]
    async fn background_loop_refreshes_ahead_of_expiry() {
        let time = ManualTimeSource::new(UNIX_EPOCH + Duration::from_secs(1_000));
        let sts = fake_sts(&time);
        let provider = provider(&time, &sts);
        provider.provide_credentials().await.unwrap();

        // ten minutes in, the session is within five minutes of expiring
        time.advance(Duration::from_secs(10 * 60 + 1));
        wait_for(|| sts.calls() >= 2).await;
        let creds = provider.provide_credentials().await.unwrap();
        assert_eq!(creds.access_key_id(), "ASIA2");
        assert_eq!(creds.secret_access_key(), "secret2");
        assert_eq!(creds.session_token(), Some("token2"));
        provider.close();
    }

    #[tokio::test]
    async fn failed_refresh_keeps_serving_the_old_session() {
        let time = ManualTimeSource::new(UNIX_EPOCH + Duration::from_secs(1_000));
        let sts = fake_sts(&time);
        let provider = provider(&time, &sts);
        provider.provide_credentials().await.unwrap();

        sts.set_failing(true);
        provider.refresh().await.expect_err("sts is down");
        let creds = provider.provide_credentials().await.expect("old session");
        assert_eq!(creds.access_key_id(), "ASIA1");
        provider.close();
    }

    #[test]
    fn backoff_doubles_up_to_the_limit() {
        let poll = Duration::from_millis(10);
        let max = Duration::from_millis(100);
        assert_eq!(backoff(poll, 1, max), Duration::from_millis(20));
        assert_eq!(backoff(poll, 3, max), Duration::from_millis(80));
        assert_eq!(backoff(poll, 4, max), max);
        assert_eq!(backoff(poll, u32::MAX, max), max);
        // never faster than the poll interval
        assert_eq!(backoff(poll, 1, Duration::ZERO), poll);
    }

    #[tokio::test]
    async fn failing_refreshes_back_off() {
        let time = ManualTimeSource::new(UNIX_EPOCH + Duration::from_secs(1_000));
        let sts = fake_sts(&time);
        let provider = provider(&time, &sts);
        provider.provide_credentials().await.unwrap();
        let attempts = || sts.assume_role_requests.lock().unwrap().len();
        assert_eq!(attempts(), 1);

        sts.set_failing(true);
        time.advance(Duration::from_secs(11 * 60));
        tokio::time::sleep(Duration::from_millis(500)).await;
        // polling every 10ms without backoff would have made ~50 attempts
        let failed_attempts = attempts() - 1;
        assert!(
            (1..=8).contains(&failed_attempts),
            "{} attempts while STS was failing",
            failed_attempts
        );

        sts.set_failing(false);
        wait_for(|| sts.calls() >= 2).await;
        let creds = provider.provide_credentials().await.unwrap();
        assert_eq!(creds.access_key_id(), "ASIA2");
        provider.close();
    }

    #[tokio::test]
    async fn close_is_idempotent_and_stops_the_provider() {
        let time = ManualTimeSource::new(UNIX_EPOCH + Duration::from_secs(1_000));
        let sts = fake_sts(&time);
        let provider = provider(&time, &sts);
        provider.provide_credentials().await.unwrap();

        provider.close();
        assert!(provider.is_closed());
        provider.close();
        assert!(provider.is_closed());

        let err = provider.provide_credentials().await.expect_err("closed");
        assert!(matches!(err, CredentialsError::ProviderClosed));
        let err = provider.refresh().await.expect_err("closed");
        assert!(matches!(err, CredentialsError::ProviderClosed));

        // the loop is gone: nothing refreshes even once the session is about to expire
        time.advance(Duration::from_secs(14 * 60));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sts.calls(), 1);
    }

    #[tokio::test]
    async fn missing_sts_client() {
        let provider = AssumeRoleProvider::builder(ROLE)
            .configure(&ProviderConfig::empty())
            .base_credentials(Credentials::from_keys("BASEAKID", "base-secret", None))
            .build();
        let err = provider.provide_credentials().await.expect_err("no sts");
        assert!(matches!(err, CredentialsError::InvalidConfiguration(_)));
        provider.close();
    }

    #[tokio::test]
    async fn base_credential_failures_are_reported() {
        let time = ManualTimeSource::new(UNIX_EPOCH);
        let sts = fake_sts(&time);
        let provider = AssumeRoleProvider::builder(ROLE)
            .configure(
                &ProviderConfig::empty()
                    .with_time_source(time.clone())
                    .with_sts_client(SharedStsClient::new(sts.clone())),
            )
            .build();
        let err = provider.provide_credentials().await.expect_err("no base credentials");
        assert!(err.is_not_loaded(), "{}", err);
        assert_eq!(sts.calls(), 0);
        provider.close();
    }
}
