/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! MSK IAM Credentials
//!
//! ## Implementing your own credentials source
//!
//! ### With static credentials
//! [`Credentials`](credentials::Credentials) implement
//! [`ProvideCredentials`](provide_credentials::ProvideCredentials) directly, so no custom
//! implementation is required:
//! ```rust
//! use aws_msk_iam_types::credential::ProvideCredentials;
//! use aws_msk_iam_types::Credentials;
//!
//! fn signing_source() -> impl ProvideCredentials {
//!     Credentials::from_keys("akid", "secret_key", None)
//! }
//! ```
//!
//! ### With dynamically loaded credentials
//! Define an inherent `async fn` on your structure, then call that method from the trait
//! implementation:
//! ```rust
//! use aws_msk_iam_types::credential::{self, future, CredentialsError, ProvideCredentials};
//! use aws_msk_iam_types::Credentials;
//!
//! struct VaultCredentialsSource;
//!
//! impl VaultCredentialsSource {
//!     async fn load_credentials(&self) -> credential::Result {
//!         Err(CredentialsError::not_loaded("vault is sealed"))
//!     }
//! }
//!
//! impl ProvideCredentials for VaultCredentialsSource {
//!     fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
//!     where
//!         Self: 'a,
//!     {
//!         future::ProvideCredentials::new(self.load_credentials())
//!     }
//! }
//! ```

pub mod credentials;
pub mod provide_credentials;

pub use credentials::Credentials;
pub use provide_credentials::future;
pub use provide_credentials::CredentialsError;
pub use provide_credentials::ProvideCredentials;
pub use provide_credentials::Result;
pub use provide_credentials::SharedCredentialsProvider;
