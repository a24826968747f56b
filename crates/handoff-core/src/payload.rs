use bytes::Bytes;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Fresh random payload of `size` bytes.
///
/// Random rather than repeated filler so compressible content can't skew a
/// transport or filesystem that happens to compress.
pub fn random_payload(size: usize) -> Bytes {
    let mut buf = vec![0u8; size];
    rand::rng().fill_bytes(&mut buf);
    Bytes::from(buf)
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
