//! Hash computation utilities.
//!
//! MD5 is used only to derive short, stable identifiers for storage paths.
//! It is not used for integrity or security.

use md5::{Digest, Md5};

/// Compute the MD5 hash of a byte slice.
///
/// # Arguments
/// * `data` - Bytes to hash
///
/// # Returns
/// 32-character lowercase hex string (128 bits).
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher: Md5Hasher = Md5Hasher::new();
    hasher.update(data);
    hasher.finish_hex()
}

/// Hash an ordered list of fields by concatenating them without a separator.
///
/// # Arguments
/// * `fields` - Fields to hash, in order
///
/// # Returns
/// 32-character lowercase hex string.
pub fn hash_fields<S: AsRef<str>>(fields: &[S]) -> String {
    let mut hasher: Md5Hasher = Md5Hasher::new();
    for field in fields {
        hasher.update(field.as_ref().as_bytes());
    }
    hasher.finish_hex()
}

/// Streaming hasher for incremental MD5 hashing.
pub struct Md5Hasher {
    inner: Md5,
}

impl Md5Hasher {
    /// Create a new streaming hasher.
    pub fn new() -> Self {
        Self { inner: Md5::new() }
    }

    /// Update the hasher with additional data.
    ///
    /// # Arguments
    /// * `data` - Bytes to add to the hash computation
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the hash as a 32-char hex string.
    pub fn finish_hex(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

impl Default for Md5Hasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_hex_empty() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_md5_hex_known_value() {
        assert_eq!(md5_hex(b"hello world"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_hash_fields_concatenates_without_separator() {
        let joined: String = hash_fields(&["hello", " ", "world"]);
        assert_eq!(joined, md5_hex(b"hello world"));
    }

    #[test]
    fn test_hash_fields_single_field() {
        assert_eq!(hash_fields(&["2024-03-01"]), md5_hex(b"2024-03-01"));
    }

    #[test]
    fn test_hasher_incremental() {
        let mut hasher: Md5Hasher = Md5Hasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finish_hex(), md5_hex(b"hello world"));
    }

    #[test]
    fn test_different_inputs_differ() {
        assert_ne!(md5_hex(b"2024-03-01"), md5_hex(b"2024-03-02"));
    }
}
