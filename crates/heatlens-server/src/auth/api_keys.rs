use rand::Rng;
use sha2::{Digest, Sha256};

const KEY_PREFIX: &str = "hl_live_";
const DISPLAY_PREFIX_LEN: usize = 16;

/// Generate a new API key.
///
/// Returns (raw_key, hash, prefix).
/// Raw key format: `hl_live_` + 32 random hex chars.
/// Prefix: first 16 chars of the raw key, kept for display.
pub fn generate_api_key() -> (String, String, String) {
    use rand::RngCore;
    let mut buf = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut buf);

    let raw_key = format!("{KEY_PREFIX}{}", hex::encode(buf));
    let hash = hash_api_key(&raw_key);
    let prefix = raw_key.chars().take(DISPLAY_PREFIX_LEN).collect();

    (raw_key, hash, prefix)
}

/// Generate a key ID: "key_" + 10 random lowercase alphanumeric chars.
pub fn generate_key_id() -> String {
    let mut rng = rand::thread_rng();
    let chars: String = (0..10)
        .map(|_| {
            let idx = rng.gen_range(0..36u8);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect();
    format!("key_{chars}")
}

/// Hash an API key with SHA-256.
pub fn hash_api_key(raw_key: &str) -> String {
    hex::encode(Sha256::digest(raw_key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_hashes_to_its_hash() {
        let (raw, hash, prefix) = generate_api_key();
        assert!(raw.starts_with(KEY_PREFIX));
        assert_eq!(raw.len(), KEY_PREFIX.len() + 32);
        assert_eq!(hash, hash_api_key(&raw));
        assert!(raw.starts_with(&prefix));
    }

    #[test]
    fn key_ids_are_prefixed() {
        let id = generate_key_id();
        assert!(id.starts_with("key_"));
        assert_eq!(id.len(), 14);
    }
}
