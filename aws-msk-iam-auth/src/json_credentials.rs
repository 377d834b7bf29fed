/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Parser for the JSON credential documents returned by the container and instance metadata
//! endpoints

use serde::Deserialize;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::SystemTime;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug)]
pub(crate) enum InvalidJsonCredentials {
    /// The response was not valid JSON
    JsonError(serde_json::Error),

    /// A required field was missing
    MissingField(&'static str),

    /// `Expiration` was not an RFC 3339 timestamp
    InvalidExpiration(time::error::Parse),
}

impl Display for InvalidJsonCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            InvalidJsonCredentials::JsonError(err) => {
                write!(f, "invalid JSON in response: {}", err)
            }
            InvalidJsonCredentials::MissingField(field) => write!(
                f,
                "Expected field `{}` in response but it was missing",
                field
            ),
            InvalidJsonCredentials::InvalidExpiration(err) => {
                write!(f, "invalid `Expiration` in response: {}", err)
            }
        }
    }
}

impl Error for InvalidJsonCredentials {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InvalidJsonCredentials::JsonError(err) => Some(err),
            InvalidJsonCredentials::InvalidExpiration(err) => Some(err),
            InvalidJsonCredentials::MissingField(_) => None,
        }
    }
}

#[derive(PartialEq, Eq)]
pub(crate) enum JsonCredentials {
    RefreshableCredentials {
        access_key_id: String,
        secret_access_key: String,
        session_token: String,
        expiration: SystemTime,
    },
    Error {
        code: String,
        message: String,
    },
}

impl fmt::Debug for JsonCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            JsonCredentials::RefreshableCredentials {
                access_key_id,
                expiration,
                ..
            } => f
                .debug_struct("RefreshableCredentials")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"** redacted **")
                .field("session_token", &"** redacted **")
                .field("expiration", expiration)
                .finish(),
            JsonCredentials::Error { code, message } => f
                .debug_struct("Error")
                .field("code", code)
                .field("message", message)
                .finish(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawCredentials {
    code: Option<String>,
    message: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    token: Option<String>,
    expiration: Option<String>,
}

/// Parse a credential document
///
/// ECS responses carry only the credential fields. IMDS responses also carry `Code`, which is
/// `Success` unless the role could not be assumed, in which case `Message` explains why.
pub(crate) fn parse_json_credentials(
    credentials_response: &str,
) -> Result<JsonCredentials, InvalidJsonCredentials> {
    let raw: RawCredentials =
        serde_json::from_str(credentials_response).map_err(InvalidJsonCredentials::JsonError)?;
    if let Some(code) = raw.code.filter(|code| code != "Success") {
        return Ok(JsonCredentials::Error {
            code,
            message: raw.message.unwrap_or_default(),
        });
    }
    let expiration = raw
        .expiration
        .ok_or(InvalidJsonCredentials::MissingField("Expiration"))?;
    let expiration = OffsetDateTime::parse(&expiration, &Rfc3339)
        .map_err(InvalidJsonCredentials::InvalidExpiration)?;
    Ok(JsonCredentials::RefreshableCredentials {
        access_key_id: raw
            .access_key_id
            .ok_or(InvalidJsonCredentials::MissingField("AccessKeyId"))?,
        secret_access_key: raw
            .secret_access_key
            .ok_or(InvalidJsonCredentials::MissingField("SecretAccessKey"))?,
        session_token: raw
            .token
            .ok_or(InvalidJsonCredentials::MissingField("Token"))?,
        expiration: expiration.into(),
    })
}
