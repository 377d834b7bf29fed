/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Abstractions for testing code that interacts with the operating system:
//! - Reading environment variables
//! - Reading from the file system
//! - Reading process-wide system properties

use std::collections::HashMap;
use std::env::VarError;
use std::ffi::OsString;
use std::fmt::{self, Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// File system abstraction
///
/// Simple abstraction enabling in-memory mocking of the file system
///
/// # Example
/// Construct a file system which delegates to `std::fs`:
/// ```rust
/// let fs = aws_msk_iam_types::os_shim_internal::Fs::real();
/// ```
///
/// Construct an in-memory file system for testing:
/// ```rust
/// use std::collections::HashMap;
/// let fs = aws_msk_iam_types::os_shim_internal::Fs::from_map({
///     let mut map = HashMap::new();
///     map.insert("/home/.aws/credentials".to_string(), "[default]\naws_access_key_id = AKID".into());
///     map
/// });
/// ```
#[derive(Clone)]
pub struct Fs(Arc<fs::Inner>);

impl Default for Fs {
    fn default() -> Self {
        Fs::real()
    }
}

impl Fs {
    pub fn real() -> Self {
        Fs(Arc::new(fs::Inner::Real))
    }

    pub fn from_raw_map(fs: HashMap<OsString, Vec<u8>>) -> Self {
        Fs(Arc::new(fs::Inner::Fake { fs }))
    }

    pub fn from_map(data: HashMap<String, Vec<u8>>) -> Self {
        let fs = data.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Fs(Arc::new(fs::Inner::Fake { fs }))
    }

    /// Create an in-memory file system from a slice of `(path, contents)` tuples
    pub fn from_slice<'a>(files: &[(&'a str, &'a str)]) -> Self {
        let fs = files
            .iter()
            .map(|(k, v)| (OsString::from(k), v.as_bytes().to_vec()))
            .collect();
        Fs(Arc::new(fs::Inner::Fake { fs }))
    }

    /// Create a test filesystem rooted in real files
    ///
    /// Creates a test filesystem from the contents of `test_directory` rooted into `namespaced_to`.
    ///
    /// ```rust,no_run
    /// use aws_msk_iam_types::os_shim_internal::Fs;
    /// let fs = Fs::from_test_dir("test-data/static-keys", "/Users/me/.aws");
    /// let _ = fs.read_to_end("/Users/me/.aws/credentials");
    /// ```
    pub fn from_test_dir(
        test_directory: impl Into<PathBuf>,
        namespaced_to: impl Into<PathBuf>,
    ) -> Self {
        Self(Arc::new(fs::Inner::Namespaced {
            real_path: test_directory.into(),
            namespaced_to: namespaced_to.into(),
        }))
    }

    pub fn read_to_end(&self, path: impl AsRef<Path>) -> std::io::Result<Vec<u8>> {
        use fs::Inner;
        let path = path.as_ref();
        match &self.0.as_ref() {
            Inner::Real => std::fs::read(path),
            Inner::Fake { fs } => fs
                .get(path.as_os_str())
                .cloned()
                .ok_or_else(|| std::io::ErrorKind::NotFound.into()),
            Inner::Namespaced {
                real_path,
                namespaced_to,
            } => {
                let actual_path = path
                    .strip_prefix(namespaced_to)
                    .map_err(|_| std::io::Error::from(std::io::ErrorKind::NotFound))?;
                std::fs::read(real_path.join(actual_path))
            }
        }
    }
}

impl Debug for Fs {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0.as_ref() {
            fs::Inner::Real => f.write_str("Fs::Real"),
            fs::Inner::Fake { .. } => f.write_str("Fs::Fake"),
            fs::Inner::Namespaced { real_path, .. } => {
                write!(f, "Fs::Namespaced({})", real_path.display())
            }
        }
    }
}

mod fs {
    use std::collections::HashMap;
    use std::ffi::OsString;
    use std::path::PathBuf;

    pub enum Inner {
        Real,
        Fake {
            fs: HashMap<OsString, Vec<u8>>,
        },
        Namespaced {
            real_path: PathBuf,
            namespaced_to: PathBuf,
        },
    }
}

/// Environment variable abstraction
///
/// Environment variables are global to a process, and, as such, are difficult to test with a multi-
/// threaded test runner like Rust's. This enables loading environment variables either from the
/// actual process environment ([`std::env::var`](std::env::var)) or from a hash map.
///
/// Process environments are cheap to clone:
/// - Faked process environments are wrapped in an internal Arc
/// - Real process environments are pointer-sized
#[derive(Clone)]
pub struct Env(Arc<env::Inner>);

impl Default for Env {
    fn default() -> Self {
        Self::real()
    }
}

impl Env {
    pub fn get(&self, k: &str) -> Result<String, VarError> {
        use env::Inner;
        match &self.0.as_ref() {
            Inner::Real => std::env::var(k),
            Inner::Fake(map) => map.get(k).cloned().ok_or(VarError::NotPresent),
        }
    }

    /// Create a fake process environment from a slice of tuples.
    ///
    /// # Example
    /// ```rust
    /// use aws_msk_iam_types::os_shim_internal::Env;
    /// let mock_env = Env::from_slice(&[
    ///     ("HOME", "/home/myname"),
    ///     ("AWS_PROFILE", "msk")
    /// ]);
    /// assert_eq!(mock_env.get("HOME").unwrap(), "/home/myname");
    /// ```
    pub fn from_slice<'a>(vars: &[(&'a str, &'a str)]) -> Self {
        use env::Inner;
        Self(Arc::new(Inner::Fake(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )))
    }

    /// Create a process environment that uses the real process environment
    ///
    /// Calls will be delegated to [`std::env::var`](std::env::var).
    pub fn real() -> Self {
        Self(Arc::new(env::Inner::Real))
    }
}

impl From<HashMap<String, String>> for Env {
    fn from(hash_map: HashMap<String, String>) -> Self {
        Self(Arc::new(env::Inner::Fake(hash_map)))
    }
}

// Values are never printed: the environment routinely holds secrets.
impl Debug for Env {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0.as_ref() {
            env::Inner::Real => f.write_str("Env::Real"),
            env::Inner::Fake(_) => f.write_str("Env::Fake"),
        }
    }
}

mod env {
    use std::collections::HashMap;

    pub enum Inner {
        Real,
        Fake(HashMap<String, String>),
    }
}

lazy_static::lazy_static! {
    static ref SYSTEM_PROPERTIES: RwLock<HashMap<String, String>> = RwLock::new(HashMap::new());
}

/// System property abstraction
///
/// System properties are a process-wide key-value registry (for example `aws.accessKeyId`) that an
/// application populates at startup, typically from its own command line or configuration.
/// [`Properties::real`] reads the registry maintained through [`Properties::set_system_property`];
/// [`Properties::from_slice`] creates an isolated set for tests.
#[derive(Clone)]
pub struct Properties(Arc<properties::Inner>);

impl Default for Properties {
    fn default() -> Self {
        Self::real()
    }
}

impl Properties {
    pub fn real() -> Self {
        Self(Arc::new(properties::Inner::Real))
    }

    pub fn from_slice<'a>(props: &[(&'a str, &'a str)]) -> Self {
        Self(Arc::new(properties::Inner::Fake(
            props
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )))
    }

    pub fn get(&self, k: &str) -> Option<String> {
        use properties::Inner;
        match &self.0.as_ref() {
            Inner::Real => SYSTEM_PROPERTIES
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(k)
                .cloned(),
            Inner::Fake(map) => map.get(k).cloned(),
        }
    }

    /// Set a property in the process-wide registry read by [`Properties::real`]
    pub fn set_system_property(k: impl Into<String>, v: impl Into<String>) {
        SYSTEM_PROPERTIES
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(k.into(), v.into());
    }

    /// Remove a property from the process-wide registry, returning its previous value
    pub fn clear_system_property(k: &str) -> Option<String> {
        SYSTEM_PROPERTIES
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(k)
    }
}

impl From<HashMap<String, String>> for Properties {
    fn from(hash_map: HashMap<String, String>) -> Self {
        Self(Arc::new(properties::Inner::Fake(hash_map)))
    }
}

impl Debug for Properties {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0.as_ref() {
            properties::Inner::Real => f.write_str("Properties::Real"),
            properties::Inner::Fake(_) => f.write_str("Properties::Fake"),
        }
    }
}

mod properties {
    use std::collections::HashMap;

    pub enum Inner {
        Real,
        Fake(HashMap<String, String>),
    }
}
