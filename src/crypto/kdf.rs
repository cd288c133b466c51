use anyhow::{Context, Result};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{DEFAULT_ITERATIONS, KEY_LEN, SALT_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScramParams {
    iterations: u32,
}

impl Default for ScramParams {
    fn default() -> Self {
        Self {
            // PBKDF2 rounds
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl ScramParams {
    pub fn new(iterations: u32) -> anyhow::Result<Self> {
        let params = Self { iterations };
        params.validate()?;
        if iterations < DEFAULT_ITERATIONS {
            tracing::warn!(
                iterations,
                "iteration count is below the SCRAM-SHA-256 minimum of {DEFAULT_ITERATIONS}"
            );
        }
        Ok(params)
    }

    /// Parameters read back from an existing record: validated, not judged.
    pub(crate) fn from_stored(iterations: u32) -> anyhow::Result<Self> {
        let params = Self { iterations };
        params.validate()?;
        Ok(params)
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.iterations < 1 {
            anyhow::bail!("iteration count must be >= 1");
        }
        Ok(())
    }
}

/// Stretch the password with PBKDF2-HMAC-SHA-256.
pub fn salted_password(
    password: &[u8],
    salt: &[u8; SALT_LEN],
    params: ScramParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    params.validate().context("invalid SCRAM parameters")?;

    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password, salt, params.iterations, &mut out[..]);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretch_is_deterministic() {
        let salt = [42u8; SALT_LEN];
        let params = ScramParams::default();

        let k1 = salted_password(b"password", &salt, params).unwrap();
        let k2 = salted_password(b"password", &salt, params).unwrap();

        assert_eq!(*k1, *k2);
    }

    #[test]
    fn iterations_affect_output() {
        let salt = [7u8; SALT_LEN];

        let k1 = salted_password(b"pw", &salt, ScramParams::new(4096).unwrap()).unwrap();
        let k2 = salted_password(b"pw", &salt, ScramParams::new(4097).unwrap()).unwrap();

        assert_ne!(*k1, *k2);
    }

    #[test]
    fn rfc7677_salted_password() {
        // RFC 7677 section 3: password "pencil", s=W22ZaJ0SNY7soEsUEjb6gQ==, i=4096
        let salt: [u8; SALT_LEN] = [
            0x5b, 0x6d, 0x99, 0x68, 0x9d, 0x12, 0x35, 0x8e, 0xec, 0xa0, 0x4b, 0x14, 0x12, 0x36,
            0xfa, 0x81,
        ];
        let expected: [u8; KEY_LEN] = [
            0xc4, 0xa4, 0x95, 0x10, 0x32, 0x3a, 0xb4, 0xf9, 0x52, 0xca, 0xc1, 0xfa, 0x99, 0x44,
            0x19, 0x39, 0xe7, 0x8e, 0xa7, 0x4d, 0x6b, 0xe8, 0x1d, 0xdf, 0x70, 0x96, 0xe8, 0x75,
            0x13, 0xdc, 0x61, 0x5d,
        ];
        let k = salted_password(b"pencil", &salt, ScramParams::default()).unwrap();
        assert_eq!(*k, expected);
    }

    #[test]
    fn zero_iterations_fail_gracefully() {
        assert!(ScramParams::new(0).is_err());
        let params = ScramParams { iterations: 0 };
        assert!(salted_password(b"pw", &[0u8; SALT_LEN], params).is_err());
    }

    #[test]
    fn stored_params_validate() {
        assert_eq!(ScramParams::from_stored(1).unwrap().iterations(), 1);
        assert!(ScramParams::from_stored(0).is_err());
    }

    #[test]
    fn default_is_4096() {
        assert_eq!(ScramParams::default().iterations(), 4096);
    }
}
