use anyhow::{Result, anyhow};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::{KEY_LEN, SALT_LEN, ScramParams, salted_password};

type HmacSha256 = Hmac<Sha256>;

const CLIENT_KEY: &[u8] = b"Client Key";
const SERVER_KEY: &[u8] = b"Server Key";

/// The two keys a server keeps for a SCRAM-SHA-256 user.
///
/// The client key is only an intermediate; just its digest survives here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScramKeys {
    pub stored_key: [u8; KEY_LEN],
    pub server_key: [u8; KEY_LEN],
}

/// Run the full SCRAM-SHA-256 key schedule for one password.
pub fn derive_keys(
    password: &[u8],
    salt: &[u8; SALT_LEN],
    params: ScramParams,
) -> Result<ScramKeys> {
    let salted = salted_password(password, salt, params)?;

    let client_key = hmac_sha256(&salted[..], CLIENT_KEY)?;
    let server_key = hmac_sha256(&salted[..], SERVER_KEY)?;

    let mut stored_key = [0u8; KEY_LEN];
    stored_key.copy_from_slice(&Sha256::digest(&client_key[..]));

    Ok(ScramKeys {
        stored_key,
        server_key: *server_key,
    })
}

fn hmac_sha256(key: &[u8], msg: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| anyhow!("HMAC-SHA-256 unavailable: {e}"))?;
    mac.update(msg);

    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::STANDARD as B64};

    #[test]
    fn rfc7677_keys() {
        let salt: [u8; SALT_LEN] = B64
            .decode("W22ZaJ0SNY7soEsUEjb6gQ==")
            .unwrap()
            .try_into()
            .unwrap();

        let keys = derive_keys(b"pencil", &salt, ScramParams::default()).unwrap();

        assert_eq!(
            B64.encode(keys.stored_key),
            "WG5d8oPm3OtcPnkdi4Uo7BkeZkBFzpcXkuLmtbsT4qY="
        );
        assert_eq!(
            B64.encode(keys.server_key),
            "wfPLwcE6nTWhTAmQ7tl2KeoiWGPlZqQxSrmfPwDl2dU="
        );
    }

    #[test]
    fn stored_and_server_keys_differ() {
        let keys = derive_keys(b"pw", &[1u8; SALT_LEN], ScramParams::new(1).unwrap()).unwrap();
        assert_ne!(keys.stored_key, keys.server_key);
    }

    #[test]
    fn hmac_accepts_empty_key() {
        let out = hmac_sha256(b"", b"Client Key").unwrap();
        assert_eq!(out.len(), KEY_LEN);
    }
}
