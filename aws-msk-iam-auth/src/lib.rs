/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! AWS credential resolution for the MSK IAM SASL mechanism
//!
//! The client authenticating to an MSK broker only needs one thing from this crate: a single,
//! stable source of AWS credentials to sign its authentication payload. [`CredentialResolver`]
//! builds that source from the options supplied on the authentication configuration line:
//!
//! ```text
//! sasl.jaas.config = software.amazon.msk.auth.iam.IAMLoginModule required awsProfileName="msk";
//! ```
//!
//! The resolver composes an ordered fallback chain of credential sources:
//!
//! 1. a named profile, when `awsProfileName` is set
//! 2. an assumed role, when `awsRoleArn` is set (session name from `awsRoleSessionName`,
//!    defaulting to `aws-msk-iam-auth`)
//! 3. environment variables
//! 4. system properties
//! 5. a web identity token
//! 6. the ambient profile (`AWS_PROFILE` or `default`)
//! 7. container or instance metadata
//!
//! ```rust,no_run
//! # async fn docs() -> Result<(), Box<dyn std::error::Error>> {
//! use aws_msk_iam_auth::options::parse_jaas_config;
//! use aws_msk_iam_auth::CredentialResolver;
//!
//! let options = parse_jaas_config(
//!     r#"software.amazon.msk.auth.iam.IAMLoginModule required awsProfileName="msk";"#,
//! )?;
//! let resolver = CredentialResolver::new(&options)?;
//! let credentials = resolver.credentials().await?;
//! # drop(credentials);
//! resolver.close();
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod container;
pub mod default_chain;
pub mod environment;
pub mod error;
pub mod http;
mod json_credentials;
pub mod options;
pub mod profile;
pub mod provider_config;
pub mod resolver;
pub mod source;
pub mod sts;
pub mod system_properties;
pub mod web_identity_token;

mod cache;
mod timeout;

pub use resolver::CredentialResolver;
pub use source::{CredentialSource, SourceKind};
