/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Time source abstraction so that credential expiry can be tested deterministically

use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

/// Trait with a `now()` function returning the current time
pub trait TimeSource: Send + Sync + 'static {
    fn now(&self) -> SystemTime;
}

/// Time source that delegates to [`SystemTime::now`]
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Time source that can be shared across providers
#[derive(Clone)]
pub struct SharedTimeSource(Arc<dyn TimeSource>);

impl SharedTimeSource {
    pub fn new(source: impl TimeSource) -> Self {
        SharedTimeSource(Arc::new(source))
    }

    pub fn now(&self) -> SystemTime {
        self.0.now()
    }
}

impl Default for SharedTimeSource {
    fn default() -> Self {
        SharedTimeSource::new(SystemTimeSource)
    }
}

impl Debug for SharedTimeSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SharedTimeSource")
    }
}

/// Time source that only moves when told to
///
/// # Examples
///
/// ```rust
/// use aws_msk_iam_types::time::ManualTimeSource;
/// use std::time::{Duration, UNIX_EPOCH};
/// let time = ManualTimeSource::new(UNIX_EPOCH);
/// time.advance(Duration::from_secs(100));
/// assert_eq!(time.now(), UNIX_EPOCH + Duration::from_secs(100));
/// ```
#[derive(Clone, Debug)]
pub struct ManualTimeSource {
    now: Arc<Mutex<SystemTime>>,
}

impl ManualTimeSource {
    pub fn new(start_time: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start_time)),
        }
    }

    pub fn set_time(&self, time: SystemTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }

    pub fn advance(&self, delta: Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += delta;
    }

    pub fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> SystemTime {
        ManualTimeSource::now(self)
    }
}
