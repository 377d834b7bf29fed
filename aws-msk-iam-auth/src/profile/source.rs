/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use aws_msk_iam_types::os_shim_internal::{Env, Fs};
use std::borrow::Cow;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// In-memory source of profile data
pub(super) struct Source {
    /// Contents and path of ~/.aws/config
    pub(super) config_file: File,

    /// Contents and path of ~/.aws/credentials
    pub(super) credentials_file: File,

    /// Profile to use
    ///
    /// Overridden via `$AWS_PROFILE`, defaults to `default`
    pub(super) profile: Cow<'static, str>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(super) enum FileKind {
    Config,
    Credentials,
}

/// In-memory configuration file
pub(super) struct File {
    pub(super) kind: FileKind,
    pub(super) path: String,
    pub(super) contents: String,
}

/// Load a [Source](Source) from a given environment and filesystem.
pub(super) fn load(proc_env: &Env, fs: &Fs) -> Source {
    let config = tracing::debug_span!("load_config_file").in_scope(|| {
        read(
            fs,
            proc_env,
            FileKind::Config,
            "~/.aws/config",
            "AWS_CONFIG_FILE",
        )
    });
    let credentials = tracing::debug_span!("load_credentials_file").in_scope(|| {
        read(
            fs,
            proc_env,
            FileKind::Credentials,
            "~/.aws/credentials",
            "AWS_SHARED_CREDENTIALS_FILE",
        )
    });
    Source {
        config_file: config,
        credentials_file: credentials,
        profile: proc_env
            .get("AWS_PROFILE")
            .ok()
            .filter(|profile| !profile.trim().is_empty())
            .map(Cow::Owned)
            .unwrap_or(Cow::Borrowed("default")),
    }
}

/// Read a file given a potential path override & Home directory expansion
///
/// Arguments:
/// * `fs`: Filesystem abstraction
/// * `environment`: Process environment abstraction
/// * `default_path`: Fallback path if the environment variable specified by `overridden_by_env_var` is unset
/// * `overridden_by_env_var`: name of an environment variable whose contents can override `default_path`
fn read(
    fs: &Fs,
    environment: &Env,
    kind: FileKind,
    default_path: &str,
    overridden_by_env_var: &str,
) -> File {
    let path = environment
        .get(overridden_by_env_var)
        .map(Cow::Owned)
        .ok()
        .unwrap_or_else(|| default_path.into());
    let expanded = expand_home(path.as_ref(), environment, Os::real());
    tracing::debug!(before = ?path, after = ?expanded, "home directory expanded");
    let data = match fs.read_to_end(&expanded) {
        Ok(data) => data,
        Err(e) => {
            match e.kind() {
                ErrorKind::NotFound if path == default_path => {
                    tracing::debug!(path = %path, "config file not found")
                }
                ErrorKind::NotFound if path != default_path => {
                    tracing::warn!(path = %path, env = %overridden_by_env_var, "config file overridden via environment variable not found")
                }
                _other => tracing::warn!(path = %path, error = %e, "failed to read config file"),
            };
            Default::default()
        }
    };
    let data = match String::from_utf8(data) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "config file did not contain utf-8 encoded data");
            Default::default()
        }
    };
    tracing::debug!(path = %path, size = ?data.len(), "config file loaded");
    File {
        kind,
        // lossy is OK here, the name of this file is just for debugging purposes
        path: expanded.to_string_lossy().into(),
        contents: data,
    }
}

fn expand_home(path: impl AsRef<Path>, env_var: &Env, os: Os) -> PathBuf {
    let path = path.as_ref();
    let mut components = path.components();
    let start = components.next();
    match start {
        None => path.into(), // empty path,
        Some(Component::Normal(s)) if s == "~" => {
            // do homedir replacement
            let mut path = match home_dir(env_var, os) {
                Some(dir) => {
                    tracing::debug!(home = ?dir, "performing home directory substitution");
                    dir
                }
                None => {
                    tracing::warn!(
                        "could not determine home directory but home expansion was requested"
                    );
                    Default::default()
                }
            };
            // rewrite the path using system-specific path separators
            for component in components {
                path.push(component);
            }
            path
        }
        // Paths that don't begin with `~` come from an environment variable on the target
        // platform and already use the right separators.
        _other => path.into(),
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Os {
    Windows,
    NotWindows,
}

impl Os {
    fn real() -> Self {
        match std::env::consts::OS {
            "windows" => Os::Windows,
            _ => Os::NotWindows,
        }
    }
}

/// Resolve a home directory given a set of environment variables
fn home_dir(env_var: &Env, os: Os) -> Option<PathBuf> {
    if let Ok(home) = env_var.get("HOME") {
        tracing::debug!(src = "HOME", "loaded home directory");
        return Some(PathBuf::from(home));
    }

    if os == Os::Windows {
        if let Ok(home) = env_var.get("USERPROFILE") {
            tracing::debug!(src = "USERPROFILE", "loaded home directory");
            return Some(PathBuf::from(home));
        }

        let home_drive = env_var.get("HOMEDRIVE");
        let home_path = env_var.get("HOMEPATH");
        tracing::debug!(src = "HOMEDRIVE/HOMEPATH", "loaded home directory");
        if let (Ok(mut drive), Ok(path)) = (home_drive, home_path) {
            drive.push_str(&path);
            return Some(drive.into());
        }
    }
    None
}
