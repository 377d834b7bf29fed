/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Reader for the subset of the shared config format needed for static keys
//!
//! Sections (`[name]`), `key = value` properties and full-line comments are understood. Nested
//! sub-properties are folded into their parent value and otherwise ignored.

use super::source::{File, FileKind, Source};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Display, Formatter};

pub(super) type Properties = HashMap<String, String>;

/// Profiles merged from the config and credentials files
#[derive(Debug, Default)]
pub(super) struct ProfileSet {
    profiles: HashMap<String, Properties>,
}

impl ProfileSet {
    pub(super) fn get(&self, name: &str) -> Option<&Properties> {
        self.profiles.get(name)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProfileParseError {
    location: String,
    line_number: usize,
    message: String,
}

impl Display for ProfileParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error parsing {} on line {}: {}",
            self.location, self.line_number, self.message
        )
    }
}

impl Error for ProfileParseError {}

/// Parse and merge both files of `source`
///
/// Config file entries are read first so that credentials file entries take precedence.
pub(super) fn parse_profiles(source: &Source) -> Result<ProfileSet, ProfileParseError> {
    let mut set = ProfileSet::default();
    merge(&mut set, &source.config_file)?;
    merge(&mut set, &source.credentials_file)?;
    Ok(set)
}

fn merge(set: &mut ProfileSet, file: &File) -> Result<(), ProfileParseError> {
    let mut default_has_profile_prefix = false;
    for (section, properties) in parse_file(file)? {
        let name = match (file.kind, section.as_str()) {
            (FileKind::Credentials, any) => any.to_string(),
            (FileKind::Config, "default") if default_has_profile_prefix => {
                tracing::warn!("profile `default` ignored because `[profile default]` was found which takes priority");
                continue;
            }
            (FileKind::Config, "default") => "default".to_string(),
            (FileKind::Config, other) => match other.strip_prefix("profile ").map(str::trim) {
                Some("default") => {
                    if !default_has_profile_prefix {
                        set.profiles.remove("default");
                        default_has_profile_prefix = true;
                    }
                    "default".to_string()
                }
                Some(name) => name.to_string(),
                None => {
                    tracing::warn!(profile = %other, "profile ignored: in config files, profiles MUST start with `profile `");
                    continue;
                }
            },
        };
        set.profiles.entry(name).or_default().extend(properties);
    }
    Ok(())
}

fn parse_file(file: &File) -> Result<Vec<(String, Properties)>, ProfileParseError> {
    let error = |line_number: usize, message: &str| ProfileParseError {
        location: file.path.clone(),
        line_number,
        message: message.to_string(),
    };
    let mut sections: Vec<(String, Properties)> = vec![];
    let mut last_key: Option<String> = None;
    for (idx, raw_line) in file.contents.lines().enumerate() {
        let line_number = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            let end = line
                .find(']')
                .ok_or_else(|| error(line_number, "section definition must end with `]`"))?;
            let trailing = line[end + 1..].trim();
            if !trailing.is_empty() && !trailing.starts_with('#') && !trailing.starts_with(';') {
                return Err(error(line_number, "unexpected text after section definition"));
            }
            let name = line[1..end].trim();
            if name.is_empty() {
                return Err(error(line_number, "section name must not be empty"));
            }
            sections.push((name.to_string(), Properties::new()));
            last_key = None;
            continue;
        }
        let (_, properties) = sections
            .last_mut()
            .ok_or_else(|| error(line_number, "expected a section definition"))?;
        let indented = raw_line.starts_with(char::is_whitespace);
        if let (true, Some(key)) = (indented, last_key.as_deref()) {
            // continuation of the previous property
            if let Some(value) = properties.get_mut(key) {
                if !value.is_empty() {
                    value.push('\n');
                }
                value.push_str(line);
            }
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| error(line_number, "expected a property definition (`key = value`)"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(error(line_number, "property must have a name"));
        }
        properties.insert(key.to_string(), strip_comment(value.trim()).to_string());
        last_key = Some(key.to_string());
    }
    Ok(sections)
}

/// Strip an inline comment, which must be preceded by whitespace
fn strip_comment(value: &str) -> &str {
    let mut prev_whitespace = false;
    for (idx, ch) in value.char_indices() {
        if prev_whitespace && (ch == '#' || ch == ';') {
            return value[..idx].trim_end();
        }
        prev_whitespace = ch.is_whitespace();
    }
    value
}

#[cfg(test)]
mod test {
    use super::super::source::{File, FileKind, Source};
    use super::{parse_profiles, strip_comment};
    use std::borrow::Cow;
    use tracing_test::traced_test;

    fn source(config: &str, credentials: &str) -> Source {
        Source {
            config_file: File {
                kind: FileKind::Config,
                path: "~/.aws/config".into(),
                contents: config.into(),
            },
            credentials_file: File {
                kind: FileKind::Credentials,
                path: "~/.aws/credentials".into(),
                contents: credentials.into(),
            },
            profile: Cow::Borrowed("default"),
        }
    }

    #[test]
    fn credentials_file_wins_over_config_file() {
        let profiles = parse_profiles(&source(
            "[profile msk]\naws_access_key_id = from-config\nregion = us-east-1\n",
            "[msk]\naws_access_key_id = from-credentials\n",
        ))
        .expect("valid files");
        let msk = profiles.get("msk").expect("profile exists");
        assert_eq!(msk["aws_access_key_id"], "from-credentials");
        assert_eq!(msk["region"], "us-east-1");
    }

    #[test]
    fn profile_default_takes_priority_over_default() {
        let profiles = parse_profiles(&source(
            "[default]\nregion = us-west-2\n[profile default]\nregion = eu-west-1\n",
            "",
        ))
        .expect("valid files");
        assert_eq!(profiles.get("default").unwrap()["region"], "eu-west-1");
    }

    #[test]
    #[traced_test]
    fn config_sections_without_prefix_are_ignored() {
        let profiles = parse_profiles(&source("[msk]\nregion = us-east-1\n", "")).unwrap();
        assert!(profiles.get("msk").is_none());
        assert!(logs_contain("profiles MUST start with `profile `"));
    }

    #[test]
    fn comments_and_continuations() {
        let profiles = parse_profiles(&source(
            "",
            "# leading comment\n[default] ; trailing comment\naws_access_key_id = AKID # inline\ns3 =\n  max_concurrent_requests = 10\n",
        ))
        .unwrap();
        let default = profiles.get("default").unwrap();
        assert_eq!(default["aws_access_key_id"], "AKID");
        assert_eq!(default["s3"], "max_concurrent_requests = 10");
    }

    #[test]
    fn property_outside_section_is_an_error() {
        let err = parse_profiles(&source("", "aws_access_key_id = AKID\n"))
            .expect_err("no section");
        assert_eq!(
            err.to_string(),
            "error parsing ~/.aws/credentials on line 1: expected a section definition"
        );
    }

    #[test]
    fn unterminated_section_is_an_error() {
        let err = parse_profiles(&source("[profile msk\n", "")).expect_err("bad section");
        assert!(err.to_string().contains("must end with `]`"));
    }

    #[test]
    fn inline_comments_need_whitespace() {
        assert_eq!(strip_comment("abc#def"), "abc#def");
        assert_eq!(strip_comment("abc #def"), "abc");
        assert_eq!(strip_comment("abc\t; def"), "abc");
    }
}
