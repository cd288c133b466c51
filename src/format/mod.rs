//! Stored credential format.
//!
//! Provides the `CredentialRecord` value and scheme-aware parsing and
//! serialization of its string form.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use subtle::ConstantTimeEq;

use crate::crypto::{self, KEY_LEN, SALT_LEN, ScramKeys, ScramParams};

pub mod scram_sha256;

/// Separates the scheme/iteration block from the salt/key block.
pub const BLOCK_SEP: char = '$';
/// Separates iteration count from salt, and stored key from server key.
pub const FIELD_SEP: char = ':';

/// A derived SCRAM-SHA-256 credential as held by an authentication store.
///
/// Only the stored key and server key are kept. The plaintext password
/// and the client key cannot be recovered from a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    params: ScramParams,
    salt: [u8; SALT_LEN],
    keys: ScramKeys,
}

impl CredentialRecord {
    /// Creates a record from already derived parts.
    pub fn new(params: ScramParams, salt: [u8; SALT_LEN], keys: ScramKeys) -> Self {
        Self { params, salt, keys }
    }

    /// Returns the parameters the record was derived with.
    pub fn params(&self) -> ScramParams {
        self.params
    }

    /// Returns the PBKDF2 iteration count.
    pub fn iterations(&self) -> u32 {
        self.params.iterations()
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn stored_key(&self) -> &[u8; KEY_LEN] {
        &self.keys.stored_key
    }

    pub fn server_key(&self) -> &[u8; KEY_LEN] {
        &self.keys.server_key
    }

    /// Checks a candidate password against this record.
    ///
    /// Re-derives with the record's own salt and iteration count and
    /// compares both keys in constant time.
    ///
    /// # Errors
    ///
    /// Returns an error only if the derivation itself fails.
    pub fn verify(&self, password: &[u8]) -> Result<bool> {
        let candidate = crypto::derive_keys(password, &self.salt, self.params)?;

        let stored = candidate.stored_key[..].ct_eq(&self.keys.stored_key[..]);
        let server = candidate.server_key[..].ct_eq(&self.keys.server_key[..]);

        Ok((stored & server).into())
    }

    /// Returns `true` if the record is weaker than `target` and should be
    /// re-derived.
    pub fn needs_rehash(&self, target: &ScramParams) -> bool {
        self.params.iterations() < target.iterations()
    }
}

impl fmt::Display for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&scram_sha256::serialize(self))
    }
}

impl FromStr for CredentialRecord {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

/// Parses a stored secret and returns a CredentialRecord.
///
/// Dispatches on the scheme name in front of the first `$`.
///
/// # Errors
///
/// Returns an error if:
/// - The secret has no scheme prefix (e.g. plain or md5 secrets)
/// - The scheme is unsupported
/// - Any field is malformed
pub fn parse(s: &str) -> Result<CredentialRecord> {
    let Some((scheme, _)) = s.split_once(BLOCK_SEP) else {
        bail!("not a SCRAM secret");
    };

    match scheme {
        scram_sha256::SCHEME => scram_sha256::parse(s),
        _ => bail!("unsupported scheme '{scheme}'"),
    }
}
