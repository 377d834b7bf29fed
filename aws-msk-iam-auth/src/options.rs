/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Options recognized by the [`CredentialResolver`](crate::CredentialResolver)
//!
//! Options arrive as an untyped map, usually parsed from the `sasl.jaas.config` line of a client
//! configuration:
//!
//! ```text
//! software.amazon.msk.auth.iam.IAMLoginModule required awsRoleArn="arn:aws:iam::123456789012:role/msk" awsRoleSessionName="consumer";
//! ```

use crate::error::ConfigurationError;
use crate::sts::DEFAULT_ROLE_SESSION_NAME;
use serde_json::Value;
use std::collections::HashMap;

/// Name of a profile to read credentials from, ahead of every other source
pub const AWS_PROFILE_NAME: &str = "awsProfileName";

/// ARN of a role to assume
pub const AWS_ROLE_ARN: &str = "awsRoleArn";

/// Session name used when assuming `awsRoleArn`
pub const AWS_ROLE_SESSION_NAME: &str = "awsRoleSessionName";

/// Typed view of the recognized options
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolverOptions {
    profile_name: Option<String>,
    role_arn: Option<String>,
    role_session_name: String,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        ResolverOptions {
            profile_name: None,
            role_arn: None,
            role_session_name: DEFAULT_ROLE_SESSION_NAME.to_string(),
        }
    }
}

impl ResolverOptions {
    /// Read the recognized options out of `options`
    ///
    /// Unknown keys are ignored. `null` values count as absent. A blank session name falls back
    /// to the default, while a blank profile name or role ARN is rejected.
    pub fn from_map(options: &HashMap<String, Value>) -> Result<Self, ConfigurationError> {
        tracing::debug!(count = options.len(), "number of options to configure credential provider");
        let profile_name = non_blank(options, AWS_PROFILE_NAME)?;
        if let Some(profile_name) = &profile_name {
            tracing::debug!(profile = %profile_name, "profile name");
        }
        let role_arn = non_blank(options, AWS_ROLE_ARN)?;
        if let Some(role_arn) = &role_arn {
            tracing::debug!(role_arn = %role_arn, "role ARN");
        }
        let role_session_name = string_option(options, AWS_ROLE_SESSION_NAME)?
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_ROLE_SESSION_NAME.to_string());
        Ok(ResolverOptions {
            profile_name,
            role_arn,
            role_session_name,
        })
    }

    pub fn profile_name(&self) -> Option<&str> {
        self.profile_name.as_deref()
    }

    pub fn role_arn(&self) -> Option<&str> {
        self.role_arn.as_deref()
    }

    pub fn role_session_name(&self) -> &str {
        &self.role_session_name
    }

    /// Read credentials from `profile_name` ahead of every other source
    pub fn with_profile_name(mut self, profile_name: impl Into<String>) -> Self {
        self.profile_name = Some(profile_name.into());
        self
    }

    /// Assume `role_arn`, using `session_name` when given
    pub fn with_role(mut self, role_arn: impl Into<String>, session_name: Option<&str>) -> Self {
        self.role_arn = Some(role_arn.into());
        if let Some(session_name) = session_name.map(str::trim).filter(|name| !name.is_empty()) {
            self.role_session_name = session_name.to_string();
        }
        self
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn string_option<'a>(
    options: &'a HashMap<String, Value>,
    key: &'static str,
) -> Result<Option<&'a str>, ConfigurationError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(other) => Err(ConfigurationError::InvalidType {
            key,
            found: type_name(other),
        }),
    }
}

fn non_blank(
    options: &HashMap<String, Value>,
    key: &'static str,
) -> Result<Option<String>, ConfigurationError> {
    match string_option(options, key)? {
        Some(value) if value.trim().is_empty() => Err(ConfigurationError::EmptyValue { key }),
        Some(value) => Ok(Some(value.trim().to_string())),
        None => Ok(None),
    }
}

const CONTROL_FLAGS: &[&str] = &["required", "requisite", "sufficient", "optional"];

/// Parse a JAAS login module configuration line into an options map
///
/// The expected shape is `<login module> <control flag> key=value ... ;`. Values may be bare
/// words or double quoted, in which case `\"` and `\\` escapes are understood. Every value is
/// returned as a JSON string.
///
/// ```rust
/// use aws_msk_iam_auth::options::parse_jaas_config;
/// let options = parse_jaas_config(
///     r#"software.amazon.msk.auth.iam.IAMLoginModule required awsProfileName="msk";"#,
/// ).unwrap();
/// assert_eq!(options["awsProfileName"], "msk");
/// ```
pub fn parse_jaas_config(line: &str) -> Result<HashMap<String, Value>, ConfigurationError> {
    let malformed = |reason: &str| ConfigurationError::MalformedJaasConfig {
        reason: reason.to_string(),
    };
    let line = line.trim();
    let body = line
        .strip_suffix(';')
        .ok_or_else(|| malformed("configuration must end with `;`"))?;
    let mut scanner = Scanner::new(body);

    let module = scanner
        .word()
        .ok_or_else(|| malformed("missing login module name"))?;
    if module.contains('=') {
        return Err(malformed("missing login module name"));
    }
    let flag = scanner
        .word()
        .ok_or_else(|| malformed("missing control flag"))?;
    if !CONTROL_FLAGS
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(flag))
    {
        return Err(malformed(&format!("invalid control flag `{}`", flag)));
    }

    let mut options = HashMap::new();
    while let Some((key, value)) = scanner.option().map_err(|reason| malformed(&reason))? {
        options.insert(key, Value::String(value));
    }
    Ok(options)
}

struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Scanner { rest: input }
    }

    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    /// Next whitespace delimited word
    fn word(&mut self) -> Option<&'a str> {
        self.skip_whitespace();
        if self.rest.is_empty() {
            return None;
        }
        let end = self
            .rest
            .find(char::is_whitespace)
            .unwrap_or_else(|| self.rest.len());
        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(word)
    }

    /// Next `key=value` pair, `None` once the input is exhausted
    fn option(&mut self) -> Result<Option<(String, String)>, String> {
        self.skip_whitespace();
        if self.rest.is_empty() {
            return Ok(None);
        }
        let rest: &'a str = self.rest;
        let eq = rest
            .find('=')
            .ok_or_else(|| format!("expected `key=value` at `{}`", rest))?;
        let key = rest[..eq].trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(format!("invalid option name `{}`", key));
        }
        self.rest = rest[eq + 1..].trim_start();
        let value_start: &'a str = self.rest;
        let value = if let Some(quoted) = value_start.strip_prefix('"') {
            let mut value = String::new();
            let mut chars = quoted.char_indices();
            let mut end = None;
            while let Some((idx, ch)) = chars.next() {
                match ch {
                    '\\' => match chars.next() {
                        Some((_, escaped)) => value.push(escaped),
                        None => break,
                    },
                    '"' => {
                        end = Some(idx);
                        break;
                    }
                    other => value.push(other),
                }
            }
            let end = end.ok_or_else(|| format!("unterminated quoted value for `{}`", key))?;
            self.rest = &quoted[end + 1..];
            value
        } else {
            self.word()
                .ok_or_else(|| format!("missing value for `{}`", key))?
                .to_string()
        };
        Ok(Some((key.to_string(), value)))
    }
}

#[cfg(test)]
mod test {
    use super::{parse_jaas_config, ResolverOptions};
    use crate::error::ConfigurationError;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tracing_test::traced_test;

    fn options(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).expect("object")
    }

    #[test]
    #[traced_test]
    fn empty_options() {
        let parsed = ResolverOptions::from_map(&HashMap::new()).unwrap();
        assert_eq!(parsed, ResolverOptions::default());
        assert_eq!(parsed.role_session_name(), "aws-msk-iam-auth");
        assert!(logs_contain("number of options to configure credential provider"));
    }

    #[test]
    fn all_options() {
        let parsed = ResolverOptions::from_map(&options(json!({
            "awsProfileName": "msk",
            "awsRoleArn": "arn:aws:iam::123:role/r",
            "awsRoleSessionName": "custom",
            "somethingElse": 42,
        })))
        .unwrap();
        assert_eq!(parsed.profile_name(), Some("msk"));
        assert_eq!(parsed.role_arn(), Some("arn:aws:iam::123:role/r"));
        assert_eq!(parsed.role_session_name(), "custom");
    }

    #[test]
    fn blank_session_name_uses_default() {
        let parsed = ResolverOptions::from_map(&options(json!({
            "awsRoleArn": "arn:aws:iam::123:role/r",
            "awsRoleSessionName": "  ",
        })))
        .unwrap();
        assert_eq!(parsed.role_session_name(), "aws-msk-iam-auth");
    }

    #[test]
    fn invalid_values() {
        let err = ResolverOptions::from_map(&options(json!({ "awsRoleArn": 12 }))).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidType {
                key: "awsRoleArn",
                found: "a number"
            }
        ));
        let err =
            ResolverOptions::from_map(&options(json!({ "awsProfileName": "" }))).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::EmptyValue {
                key: "awsProfileName"
            }
        ));
        assert!(ResolverOptions::from_map(&options(json!({ "awsProfileName": null })))
            .unwrap()
            .profile_name()
            .is_none());
    }

    #[test]
    fn with_role_keeps_default_for_blank_session() {
        let options = ResolverOptions::default().with_role("arn:aws:iam::123:role/r", Some(""));
        assert_eq!(options.role_session_name(), "aws-msk-iam-auth");
        let options = options.with_role("arn:aws:iam::123:role/r", Some("mine"));
        assert_eq!(options.role_session_name(), "mine");
    }

    #[test]
    fn jaas_line() {
        let parsed = parse_jaas_config(
            r#"software.amazon.msk.auth.iam.IAMLoginModule required awsRoleArn="arn:aws:iam::123:role/r" awsRoleSessionName = "with \"quotes\"" debug=true ;"#,
        )
        .unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed["awsRoleArn"], "arn:aws:iam::123:role/r");
        assert_eq!(parsed["awsRoleSessionName"], r#"with "quotes""#);
        assert_eq!(parsed["debug"], "true");
    }

    #[test]
    fn jaas_line_without_options() {
        let parsed =
            parse_jaas_config("software.amazon.msk.auth.iam.IAMLoginModule required;").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn malformed_jaas_lines() {
        for line in &[
            "software.amazon.msk.auth.iam.IAMLoginModule required",
            ";",
            "software.amazon.msk.auth.iam.IAMLoginModule;",
            "software.amazon.msk.auth.iam.IAMLoginModule always;",
            r#"software.amazon.msk.auth.iam.IAMLoginModule required awsProfileName="msk;"#,
            "software.amazon.msk.auth.iam.IAMLoginModule required awsProfileName;",
            "software.amazon.msk.auth.iam.IAMLoginModule required awsProfileName=;",
        ] {
            let err = parse_jaas_config(line).expect_err(line);
            assert!(
                matches!(err, ConfigurationError::MalformedJaasConfig { .. }),
                "{}",
                line
            );
        }
    }
}
