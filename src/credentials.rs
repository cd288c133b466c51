//! Username/password table supplied by the caller.

use crate::error::CredentialError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use zeroize::Zeroizing;

/// Prefix of environment variables holding user passwords.
///
/// `SCRAMGEN_PASSWORD_APP_READWRITE=...` yields user `app_readwrite`.
pub const DEFAULT_ENV_PREFIX: &str = "SCRAMGEN_PASSWORD_";

/// Accepted layouts of a credentials file.
///
/// ```json
/// {"app_readwrite": "secret", "app_readonly": "other"}
/// ```
/// or, when order matters,
/// ```json
/// [{"username": "app_readwrite", "password": "secret"}]
/// ```
#[derive(Deserialize)]
#[serde(untagged)]
enum CredentialsFile {
    Map(BTreeMap<String, String>),
    List(Vec<CredentialSpec>),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CredentialSpec {
    username: String,
    password: String,
}

/// Ordered set of users and their plaintext passwords.
///
/// Passwords are wiped from memory when the table is dropped.
#[derive(Default)]
pub struct Credentials {
    users: Vec<(String, Zeroizing<String>)>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.users.iter().map(|(u, _)| (u, "<redacted>")))
            .finish()
    }
}

/// Usernames must be non-empty and fit on one userlist line.
pub(crate) fn validate_username(username: &str) -> Result<(), CredentialError> {
    if username.is_empty() || username.contains(['\0', '\r', '\n']) {
        return Err(CredentialError::InvalidUsername(username.to_string()));
    }
    Ok(())
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user. Usernames must be unique and printable on one line.
    pub fn insert(&mut self, username: &str, password: &str) -> Result<(), CredentialError> {
        validate_username(username)?;
        if self.get(username).is_some() {
            return Err(CredentialError::UserAlreadyExists(username.to_string()));
        }

        self.users
            .push((username.to_string(), Zeroizing::new(password.to_string())));
        Ok(())
    }

    pub fn get(&self, username: &str) -> Option<&str> {
        self.users
            .iter()
            .find(|(u, _)| u == username)
            .map(|(_, p)| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Iterates `(username, password)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.users.iter().map(|(u, p)| (u.as_str(), p.as_str()))
    }

    /// Loads credentials from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not one of the
    /// accepted layouts, or repeats a username.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = Zeroizing::new(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read credentials file {}", path.display()))?,
        );
        Self::from_json_str(&data)
            .with_context(|| format!("invalid credentials file {}", path.display()))
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        let file: CredentialsFile = serde_json::from_str(data)
            .context("expected an object of username -> password or a list of {username, password}")?;

        let mut creds = Self::new();
        match file {
            CredentialsFile::Map(map) => {
                for (username, password) in map {
                    let password = Zeroizing::new(password);
                    creds.insert(&username, &password)?;
                }
            }
            CredentialsFile::List(list) => {
                for spec in list {
                    let password = Zeroizing::new(spec.password);
                    creds.insert(&spec.username, &password)?;
                }
            }
        }
        Ok(creds)
    }

    /// Collects credentials from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env(prefix: &str) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(e).context("failed to load .env file");
            }
        }

        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        Self::from_vars(prefix, vars)
    }

    /// Builds credentials from `(name, value)` pairs, keeping names that
    /// start with `prefix`. Users are sorted by name.
    pub fn from_vars<I>(prefix: &str, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut found: Vec<(String, Zeroizing<String>)> = vars
            .into_iter()
            .filter_map(|(name, value)| {
                let user = name.strip_prefix(prefix)?.to_lowercase();
                Some((user, Zeroizing::new(value)))
            })
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));

        let mut creds = Self::new();
        for (username, password) in &found {
            creds
                .insert(username, password)
                .with_context(|| format!("environment variable for user '{username}'"))?;
        }
        Ok(creds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn insert_and_get() {
        let mut creds = Credentials::new();
        creds.insert("app_readwrite", "pw").unwrap();

        assert_eq!(creds.get("app_readwrite"), Some("pw"));
        assert_eq!(creds.get("missing"), None);
        assert_eq!(creds.len(), 1);
    }

    #[test]
    fn duplicate_user_fails() {
        let mut creds = Credentials::new();
        creds.insert("a", "1").unwrap();

        assert_eq!(
            creds.insert("a", "2"),
            Err(CredentialError::UserAlreadyExists("a".into()))
        );
    }

    #[test]
    fn invalid_usernames_fail() {
        let mut creds = Credentials::new();
        for bad in ["", "a\nb", "a\rb", "a\0b"] {
            assert!(matches!(
                creds.insert(bad, "pw"),
                Err(CredentialError::InvalidUsername(_))
            ));
        }
        assert!(creds.is_empty());
    }

    #[test]
    fn debug_redacts_passwords() {
        let mut creds = Credentials::new();
        creds.insert("app_readwrite", "hunter2").unwrap();

        let out = format!("{creds:?}");
        assert!(out.contains("app_readwrite"));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn empty_password_is_allowed() {
        let mut creds = Credentials::new();
        creds.insert("a", "").unwrap();
        assert_eq!(creds.get("a"), Some(""));
    }

    #[test]
    fn iter_keeps_insertion_order() {
        let mut creds = Credentials::new();
        creds.insert("zeta", "1").unwrap();
        creds.insert("alpha", "2").unwrap();

        let users: Vec<_> = creds.iter().map(|(u, _)| u).collect();
        assert_eq!(users, ["zeta", "alpha"]);
    }

    #[test]
    fn json_object_layout() {
        let creds = Credentials::from_json_str(r#"{"b": "2", "a": "1"}"#).unwrap();

        let pairs: Vec<_> = creds.iter().collect();
        assert_eq!(pairs, [("a", "1"), ("b", "2")]);
    }

    #[test]
    fn json_list_layout_keeps_order() {
        let creds = Credentials::from_json_str(
            r#"[{"username": "b", "password": "2"}, {"username": "a", "password": "1"}]"#,
        )
        .unwrap();

        let pairs: Vec<_> = creds.iter().collect();
        assert_eq!(pairs, [("b", "2"), ("a", "1")]);
    }

    #[test]
    fn json_list_duplicate_fails() {
        let err = Credentials::from_json_str(
            r#"[{"username": "a", "password": "1"}, {"username": "a", "password": "2"}]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn json_non_string_password_fails() {
        assert!(Credentials::from_json_str(r#"{"a": 1}"#).is_err());
        assert!(Credentials::from_json_str(r#""a""#).is_err());
    }

    #[test]
    fn json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(br#"{"app_readonly": "ro"}"#).unwrap();

        let creds = Credentials::from_json_file(&path).unwrap();
        assert_eq!(creds.get("app_readonly"), Some("ro"));
    }

    #[test]
    fn missing_json_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Credentials::from_json_file(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read credentials file"));
    }

    #[test]
    fn vars_filtered_by_prefix() {
        let vars = vec![
            ("SCRAMGEN_PASSWORD_APP_READWRITE".to_string(), "rw".to_string()),
            ("HOME".to_string(), "/root".to_string()),
            ("SCRAMGEN_PASSWORD_APP_READONLY".to_string(), "ro".to_string()),
        ];

        let creds = Credentials::from_vars(DEFAULT_ENV_PREFIX, vars).unwrap();

        let pairs: Vec<_> = creds.iter().collect();
        assert_eq!(pairs, [("app_readonly", "ro"), ("app_readwrite", "rw")]);
    }

    #[test]
    fn bare_prefix_var_fails() {
        let vars = vec![("SCRAMGEN_PASSWORD_".to_string(), "x".to_string())];
        assert!(Credentials::from_vars(DEFAULT_ENV_PREFIX, vars).is_err());
    }

    #[test]
    fn case_colliding_vars_fail() {
        let vars = vec![
            ("P_ADMIN".to_string(), "1".to_string()),
            ("P_admin".to_string(), "2".to_string()),
        ];
        let err = Credentials::from_vars("P_", vars).unwrap_err();
        assert!(format!("{err:#}").contains("already exists"));
    }
}
