mod credentials;
mod crypto;
mod error;
mod format;
mod storage;
mod userlist;

pub use crate::credentials::{Credentials, DEFAULT_ENV_PREFIX};
pub use crate::crypto::{DEFAULT_ITERATIONS, KEY_LEN, SALT_LEN, ScramParams};
pub use crate::error::CredentialError;
pub use crate::format::CredentialRecord;
pub use crate::storage::Storage;
pub use crate::userlist::{Userlist, UserlistEntry};
use anyhow::{Context, Result};

/// Derive a SCRAM-SHA-256 credential record from a password.
///
/// When `salt` is `None` a fresh 16-byte salt is drawn from the OS random
/// generator, so every call yields a distinct record. With a fixed salt the
/// output is fully deterministic.
///
/// Any password is accepted, including the empty one; password policy is up
/// to the caller.
///
/// # Errors
///
/// Fails only if the random generator or the hash primitives are
/// unavailable, or if `params` is invalid.
pub fn derive(
    password: &[u8],
    salt: Option<[u8; SALT_LEN]>,
    params: ScramParams,
) -> Result<CredentialRecord> {
    let salt = match salt {
        Some(salt) => salt,
        None => crypto::generate_salt().context("failed to generate salt")?,
    };

    let keys = crypto::derive_keys(password, &salt, params)
        .context("failed to derive SCRAM-SHA-256 keys")?;

    Ok(CredentialRecord::new(params, salt, keys))
}
