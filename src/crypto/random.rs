use super::SALT_LEN;
use anyhow::{Result, anyhow};
use getrandom::fill;

/// Fill buffer with cryptographically secure random bytes
pub(crate) fn secure_random(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|e| anyhow!("OS random generator unavailable: {e}"))
}

/// Generate a fresh salt
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    secure_random(&mut salt)?;
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salts_are_unique() {
        let a = generate_salt().unwrap();
        let b = generate_salt().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn secure_random_fills_whole_buffer() {
        // 64 zero bytes surviving a fill is practically impossible
        let mut buf = [0u8; 64];
        secure_random(&mut buf).unwrap();
        assert!(buf.iter().any(|b| *b != 0));
    }
}
