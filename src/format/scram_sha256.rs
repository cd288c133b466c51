//! `SCRAM-SHA-256` secret encoding.
//!
//! ```text
//! SCRAM-SHA-256$<iterations>:<salt>$<stored key>:<server key>
//! ```
//!
//! All binary fields use the standard base64 alphabet with padding.

use super::{BLOCK_SEP, CredentialRecord, FIELD_SEP};
use crate::crypto::{KEY_LEN, SALT_LEN, ScramKeys, ScramParams};
use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};

/// Scheme name written in front of every record.
pub const SCHEME: &str = "SCRAM-SHA-256";

/// Serializes a CredentialRecord to its stored string form.
pub fn serialize(record: &CredentialRecord) -> String {
    format!(
        "{SCHEME}{BLOCK_SEP}{}{FIELD_SEP}{}{BLOCK_SEP}{}{FIELD_SEP}{}",
        record.iterations(),
        B64.encode(record.salt()),
        B64.encode(record.stored_key()),
        B64.encode(record.server_key()),
    )
}

/// Parses a `SCRAM-SHA-256` secret.
///
/// # Errors
///
/// Returns an error naming the first malformed field.
pub fn parse(s: &str) -> Result<CredentialRecord> {
    let Some(rest) = s
        .strip_prefix(SCHEME)
        .and_then(|r| r.strip_prefix(BLOCK_SEP))
    else {
        bail!("missing {SCHEME} prefix");
    };

    let (params_block, keys_block) = rest
        .split_once(BLOCK_SEP)
        .context("missing key block")?;

    let (iterations, salt) = params_block
        .split_once(FIELD_SEP)
        .context("missing salt")?;
    let (stored_key, server_key) = keys_block
        .split_once(FIELD_SEP)
        .context("missing server key")?;

    if iterations.is_empty() || !iterations.bytes().all(|b| b.is_ascii_digit()) {
        bail!("invalid iteration count '{iterations}'");
    }
    let iterations: u32 = iterations
        .parse()
        .with_context(|| format!("iteration count out of range '{iterations}'"))?;
    let params = ScramParams::from_stored(iterations)?;

    let salt = decode_fixed::<SALT_LEN>(salt, "salt")?;
    let keys = ScramKeys {
        stored_key: decode_fixed::<KEY_LEN>(stored_key, "stored key")?,
        server_key: decode_fixed::<KEY_LEN>(server_key, "server key")?,
    };

    Ok(CredentialRecord::new(params, salt, keys))
}

fn decode_fixed<const N: usize>(field: &str, name: &str) -> Result<[u8; N]> {
    let bytes = B64
        .decode(field)
        .with_context(|| format!("invalid base64 in {name}"))?;
    let len = bytes.len();

    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("{name} must be {N} bytes, got {len}"))
}
