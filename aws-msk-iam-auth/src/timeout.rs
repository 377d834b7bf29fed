/*
 * Original Copyright (c) 2021 Tokio Contributors. Licensed under the Apache-2.0 license.
 * Modifications Copyright 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use aws_msk_iam_types::CredentialsError;
use pin_project::pin_project;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct TimedOutError(pub(crate) Duration);

impl Error for TimedOutError {}

impl fmt::Display for TimedOutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timed out after {:?}", self.0)
    }
}

impl From<TimedOutError> for CredentialsError {
    fn from(err: TimedOutError) -> Self {
        CredentialsError::ProviderTimedOut(err.0)
    }
}

/// Race `value` against `sleep`, preferring `value` when both are ready
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
#[derive(Debug)]
pub(crate) struct Timeout<T, S> {
    #[pin]
    value: T,
    #[pin]
    sleep: S,
    duration: Duration,
}

impl<T> Timeout<T, tokio::time::Sleep> {
    pub(crate) fn new(value: T, duration: Duration) -> Self {
        Timeout::with_sleep(value, tokio::time::sleep(duration), duration)
    }
}

impl<T, S> Timeout<T, S> {
    pub(crate) fn with_sleep(value: T, sleep: S, duration: Duration) -> Timeout<T, S> {
        Timeout {
            value,
            sleep,
            duration,
        }
    }
}

impl<T, S> Future for Timeout<T, S>
where
    T: Future,
    S: Future,
{
    type Output = Result<T::Output, TimedOutError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let me = self.project();

        // First, try polling the future
        if let Poll::Ready(v) = me.value.poll(cx) {
            return Poll::Ready(Ok(v));
        }

        // Now check the timer
        match me.sleep.poll(cx) {
            Poll::Ready(_) => Poll::Ready(Err(TimedOutError(*me.duration))),
            Poll::Pending => Poll::Pending,
        }
    }
}
