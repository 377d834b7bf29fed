/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Types shared by the MSK IAM credential providers
//!
//! This crate holds the credential vocabulary ([`Credentials`], [`CredentialsError`] and the
//! [`ProvideCredentials`](credential::ProvideCredentials) trait) together with the
//! [`os_shim_internal`] abstractions used to keep providers testable without touching the real
//! process environment.

pub mod credential;
#[doc(hidden)]
pub mod os_shim_internal;
pub mod time;

pub use credential::Credentials;
pub use credential::CredentialsError;
