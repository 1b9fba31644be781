use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Compute SHA-256 of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode a raw 32-byte hash as a lowercase hex string (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Derive the content-addressed path for a persisted record.
/// Layout: `<base>/<first_2_hex_chars>/<full_hex>.json`
pub fn record_path(records_dir: &Path, hash_hex: &str) -> PathBuf {
    records_dir
        .join(&hash_hex[..2])
        .join(format!("{hash_hex}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_bytes_known_vector() {
        // SHA-256 of empty bytes is a known constant.
        let hex = to_hex(&sha256_bytes(b""));
        assert_eq!(
            hex,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_bytes_deterministic() {
        assert_eq!(sha256_bytes(b"receipt"), sha256_bytes(b"receipt"));
        assert_ne!(sha256_bytes(b"receipt"), sha256_bytes(b"invoice"));
    }

    #[test]
    fn record_path_layout() {
        let base = PathBuf::from("/data/records");
        let hash = "ab12cd34";
        assert_eq!(
            record_path(&base, hash),
            PathBuf::from("/data/records/ab/ab12cd34.json")
        );
    }
}
