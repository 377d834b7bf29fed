/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use aws_msk_iam_types::credential;
use aws_msk_iam_types::time::SharedTimeSource;
use aws_msk_iam_types::Credentials;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{OnceCell, RwLock};
use tracing::trace;

/// Default time before expiry at which cached credentials are considered stale
pub(crate) const DEFAULT_BUFFER_TIME: Duration = Duration::from_secs(60);

/// Cache for a single set of credentials
///
/// Loads are single-flight: concurrent callers that find the cache empty share one load. A new
/// value is published by replacing the cell under the write lock, so readers either see the old
/// `Credentials` or the new one, never a mix.
#[derive(Clone, Debug)]
pub(crate) struct ExpiringCache {
    value: Arc<RwLock<OnceCell<(Credentials, SystemTime)>>>,
    time: SharedTimeSource,
    buffer_time: Duration,
    default_expiration: Option<Duration>,
}

impl ExpiringCache {
    pub(crate) fn new(time: SharedTimeSource, buffer_time: Duration) -> Self {
        ExpiringCache {
            value: Arc::new(RwLock::new(OnceCell::new())),
            time,
            buffer_time,
            default_expiration: None,
        }
    }

    /// Credentials without an expiry are kept for `expiration` instead of forever
    pub(crate) fn with_default_expiration(mut self, expiration: Duration) -> Self {
        self.default_expiration = Some(expiration);
        self
    }

    fn expires_at(&self, credentials: &Credentials, loaded_at: SystemTime) -> Option<SystemTime> {
        credentials.expiry().or_else(|| {
            self.default_expiration
                .map(|expiration| loaded_at + expiration)
        })
    }

    fn is_fresh(&self, expires_at: Option<SystemTime>, now: SystemTime) -> bool {
        match expires_at {
            Some(expires_at) => now + self.buffer_time < expires_at,
            None => true,
        }
    }

    /// Returns the cached credentials if they are not within the buffer time of expiring
    pub(crate) async fn get(&self) -> Option<Credentials> {
        let now = self.time.now();
        let lock = self.value.read().await;
        match lock.get() {
            Some((creds, loaded_at)) if self.is_fresh(self.expires_at(creds, *loaded_at), now) => {
                Some(creds.clone())
            }
            _ => None,
        }
    }

    /// Expiry of the cached credentials, if anything is cached
    pub(crate) async fn expiry(&self) -> Option<Option<SystemTime>> {
        let lock = self.value.read().await;
        lock.get()
            .map(|(creds, loaded_at)| self.expires_at(creds, *loaded_at))
    }

    /// Returns fresh cached credentials or runs `f` to load new ones
    pub(crate) async fn get_or_load<F, Fut>(&self, f: F) -> credential::Result
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = credential::Result>,
    {
        if let Some(creds) = self.get().await {
            return Ok(creds);
        }
        self.clear_if_stale().await;
        let lock = self.value.read().await;
        let time = self.time.clone();
        let loaded = lock
            .get_or_try_init(|| async move {
                let creds = f().await?;
                Ok::<_, credential::CredentialsError>((creds, time.now()))
            })
            .await?;
        Ok(loaded.0.clone())
    }

    /// Publish `credentials`, replacing whatever was cached
    pub(crate) async fn replace(&self, credentials: Credentials) {
        let loaded_at = self.time.now();
        let mut lock = self.value.write().await;
        *lock = OnceCell::new_with(Some((credentials, loaded_at)));
    }

    /// Forget the cached credentials so the next read loads again
    pub(crate) async fn clear(&self) {
        let mut lock = self.value.write().await;
        *lock = OnceCell::new();
    }

    /// Returns true if the cache was cleared
    async fn clear_if_stale(&self) -> bool {
        let now = self.time.now();
        let mut lock = self.value.write().await;

        // Only clear the cache if it hasn't been cleared by another task. If it was already
        // cleared, then another task is initializing the empty cell.
        let stale = match lock.get() {
            Some((creds, loaded_at)) => !self.is_fresh(self.expires_at(creds, *loaded_at), now),
            None => false,
        };
        if stale {
            trace!("clearing stale credentials");
            *lock = OnceCell::new();
        }
        stale
    }
}

#[cfg(test)]
mod test {
    use super::ExpiringCache;
    use aws_msk_iam_types::credential::CredentialsError;
    use aws_msk_iam_types::time::{ManualTimeSource, SharedTimeSource};
    use aws_msk_iam_types::Credentials;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn epoch_secs(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn credentials(expired_secs: u64) -> Credentials {
        Credentials::new("test", "test", None, Some(epoch_secs(expired_secs)), "test")
    }

    fn cache(time: &ManualTimeSource) -> ExpiringCache {
        ExpiringCache::new(SharedTimeSource::new(time.clone()), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn loads_once_until_stale() {
        let time = ManualTimeSource::new(epoch_secs(100));
        let cache = cache(&time);
        let loads = AtomicUsize::new(0);
        let load = |expiry| {
            loads.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, CredentialsError>(credentials(expiry)) }
        };

        let creds = cache.get_or_load(|| load(1000)).await.unwrap();
        assert_eq!(creds.expiry(), Some(epoch_secs(1000)));
        let creds = cache.get_or_load(|| load(2000)).await.unwrap();
        assert_eq!(creds.expiry(), Some(epoch_secs(1000)));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        // within the buffer time of the expiry counts as stale
        time.set_time(epoch_secs(995));
        let creds = cache.get_or_load(|| load(2000)).await.unwrap();
        assert_eq!(creds.expiry(), Some(epoch_secs(2000)));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_load_leaves_cache_empty() {
        let time = ManualTimeSource::new(epoch_secs(100));
        let cache = cache(&time);
        let err = cache
            .get_or_load(|| async { Err(CredentialsError::not_loaded("nope")) })
            .await
            .expect_err("load failed");
        assert!(err.is_not_loaded());
        assert!(cache.get().await.is_none());
        assert_eq!(cache.expiry().await, None);
    }

    #[tokio::test]
    async fn replace_swaps_the_whole_value() {
        let time = ManualTimeSource::new(epoch_secs(100));
        let cache = cache(&time);
        cache.replace(credentials(1000)).await;
        cache
            .replace(Credentials::new(
                "new",
                "new-secret",
                Some("new-token".into()),
                Some(epoch_secs(3000)),
                "test",
            ))
            .await;
        let creds = cache.get().await.expect("cached");
        assert_eq!(creds.access_key_id(), "new");
        assert_eq!(creds.session_token(), Some("new-token"));
        assert_eq!(cache.expiry().await, Some(Some(epoch_secs(3000))));
    }

    #[tokio::test]
    async fn clear_forgets_the_value() {
        let time = ManualTimeSource::new(epoch_secs(100));
        let cache = cache(&time);
        cache.replace(credentials(1000)).await;
        cache.clear().await;
        assert!(cache.get().await.is_none());
        assert_eq!(cache.expiry().await, None);
    }

    #[tokio::test]
    async fn default_expiration_applies_to_non_expiring_credentials() {
        let time = ManualTimeSource::new(epoch_secs(100));
        let cache = cache(&time).with_default_expiration(Duration::from_secs(300));
        cache.replace(Credentials::from_keys("a", "b", None)).await;
        assert!(cache.get().await.is_some());
        time.set_time(epoch_secs(395));
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn concurrent_loads_are_single_flight() {
        let time = ManualTimeSource::new(epoch_secs(100));
        let cache = cache(&time);
        let loads = Arc::new(AtomicUsize::new(0));
        let mut tasks = vec![];
        for _ in 0..16 {
            let cache = cache.clone();
            let loads = loads.clone();
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_load(|| async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok::<_, CredentialsError>(credentials(1000))
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
