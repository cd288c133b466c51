//! Cryptographic primitives for SCRAM-SHA-256 credentials.
//!
//! Provides secure randomness, the PBKDF2 stretch and the HMAC/SHA-256
//! key derivations that make up a stored credential.

pub mod kdf;
pub mod keys;
pub mod random;

pub use kdf::{ScramParams, salted_password};
pub use keys::{ScramKeys, derive_keys};
pub use random::generate_salt;

/// Length of the salt (16 bytes).
pub const SALT_LEN: usize = 16;
/// Length of a SHA-256 output (32 bytes), used for every derived key.
pub const KEY_LEN: usize = 32;
/// Default PBKDF2 iteration count, the conventional SCRAM-SHA-256 minimum.
pub const DEFAULT_ITERATIONS: u32 = 4096;
