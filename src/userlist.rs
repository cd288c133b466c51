//! Connection pooler authentication file (`userlist.txt`).
//!
//! One user per line, both fields double-quoted:
//! ```text
//! "username" "SCRAM-SHA-256$4096:<salt>$<stored key>:<server key>"
//! ```
//! A literal `"` inside a field is written as `""`. Lines that do not start
//! with a quote are ignored by the consumer, which is what makes `#` comment
//! headers safe.

use std::fmt;

use crate::credentials::validate_username;
use crate::error::CredentialError;
use crate::{CredentialRecord, Credentials, ScramParams, derive};
use anyhow::{Context, Result, bail};

const HEADER: &[&str] = &[
    "# PgBouncer user authentication file",
    "# SCRAM-SHA-256 secrets, one user per line",
    "# Format: \"username\" \"SCRAM-SHA-256$iterations:salt$storedkey:serverkey\"",
];

const FOOTER: &[&str] = &[
    "# SECURITY NOTES:",
    "# 1. Keep this file at mode 600 (readable only by its owner)",
    "# 2. Rotate passwords regularly and re-generate this file",
    "# 3. Supply passwords through the environment or a secrets file, never in source",
    "# 4. Watch the pooler's authentication log for failed logins",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserlistEntry {
    username: String,
    secret: String,
}

impl UserlistEntry {
    pub fn new(username: &str, secret: &str) -> Self {
        Self {
            username: username.to_string(),
            secret: secret.to_string(),
        }
    }

    pub fn from_record(username: &str, record: &CredentialRecord) -> Self {
        Self::new(username, &record.to_string())
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the stored secret exactly as written in the file.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Parses the secret as a SCRAM credential record.
    pub fn record(&self) -> Result<CredentialRecord> {
        self.secret
            .parse()
            .with_context(|| format!("user '{}' has no valid SCRAM-SHA-256 secret", self.username))
    }
}

impl fmt::Display for UserlistEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", quote(&self.username), quote(&self.secret))
    }
}

#[derive(Debug, Default)]
pub struct Userlist {
    entries: Vec<UserlistEntry>,
}

impl Userlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives one entry per user, each with its own random salt.
    pub fn from_credentials(credentials: &Credentials, params: ScramParams) -> Result<Self> {
        let mut list = Self::new();

        for (username, password) in credentials.iter() {
            let record = derive(password.as_bytes(), None, params)
                .with_context(|| format!("failed to hash password for user '{username}'"))?;
            tracing::debug!(user = username, iterations = params.iterations(), "derived credential");
            list.push(UserlistEntry::from_record(username, &record))?;
        }

        Ok(list)
    }

    /// Adds an entry. Usernames follow the same rules as `Credentials`.
    pub fn push(&mut self, entry: UserlistEntry) -> Result<(), CredentialError> {
        validate_username(entry.username())?;
        if self.find(entry.username()).is_some() {
            return Err(CredentialError::UserAlreadyExists(entry.username));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn find(&self, username: &str) -> Option<&UserlistEntry> {
        self.entries.iter().find(|e| e.username == username)
    }

    pub fn entries(&self) -> &[UserlistEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders only the user lines, newline terminated.
    pub fn render_entries(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out
    }

    /// Renders a complete file: header comment, user lines, security notes.
    pub fn render_document(&self, generated_at: &str) -> String {
        let mut out = String::new();
        for line in HEADER {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&format!("# Generated: {generated_at}\n\n"));
        out.push_str(&self.render_entries());
        out.push('\n');
        for line in FOOTER {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Parses an existing userlist file.
    ///
    /// # Errors
    ///
    /// Returns an error with the line number for unterminated quotes,
    /// missing secrets, or repeated usernames.
    pub fn parse(data: &str) -> Result<Self> {
        let mut list = Self::new();

        for (idx, line) in data.lines().enumerate() {
            let lineno = idx + 1;
            let line = line.trim_start();
            if !line.starts_with('"') {
                continue;
            }

            let (username, rest) =
                unquote(line).with_context(|| format!("line {lineno}: bad username"))?;
            let rest = rest.trim_start();
            if !rest.starts_with('"') {
                bail!("line {lineno}: missing secret for user '{username}'");
            }
            let (secret, _) = unquote(rest).with_context(|| format!("line {lineno}: bad secret"))?;

            list.push(UserlistEntry { username, secret })
                .with_context(|| format!("line {lineno}"))?;
        }

        Ok(list)
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Reads one quoted field from the start of `s`, returning it and the rest.
fn unquote(s: &str) -> Result<(String, &str)> {
    let Some(body) = s.strip_prefix('"') else {
        bail!("expected opening quote");
    };

    let mut out = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '"' {
            out.push(c);
            continue;
        }
        if let Some((_, '"')) = chars.peek() {
            chars.next();
            out.push('"');
            continue;
        }
        return Ok((out, &body[i + 1..]));
    }

    bail!("unterminated quote")
}
