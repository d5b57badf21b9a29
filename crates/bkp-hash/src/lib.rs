pub mod hasher;
pub mod hex;

pub use hasher::{hash_bytes, hash_file, hash_reader, Sha256Hasher};
pub use hex::hex_to_string;

/// Length of a SHA-256 digest rendered as lowercase hex.
pub const HEX_DIGEST_LEN: usize = 64;
