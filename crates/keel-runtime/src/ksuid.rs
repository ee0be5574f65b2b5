//! A from-scratch KSUID generator - `spec.md` §3 requires every model's
//! implicit `id` field to be "a sortable, k-sortable unique identifier", and
//! list pagination (`keel_db::Page`) assumes lexicographic `id` ordering
//! tracks insertion order. No crate in this workspace's dependency corpus
//! vendors KSUID, so this follows the public `segmentio/ksuid` layout
//! directly (4-byte big-endian seconds-since-epoch payload, 16 random
//! bytes, base62-encoded to 27 characters) using `rand`, already the
//! teacher's dependency for randomness elsewhere.

use rand::RngCore;

const KSUID_EPOCH: i64 = 1_400_000_000; // 2014-05-13T16:53:20Z, the segmentio/ksuid epoch.
const BASE62_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const ENCODED_LEN: usize = 27;

/// Generates a new KSUID for the current instant.
pub fn generate() -> String {
    let now = chrono::Utc::now().timestamp();
    generate_at(now, &mut rand::thread_rng())
}

fn generate_at(unix_seconds: i64, rng: &mut impl RngCore) -> String {
    let mut payload = [0u8; 20];
    let timestamp = (unix_seconds - KSUID_EPOCH).max(0) as u32;
    payload[0..4].copy_from_slice(&timestamp.to_be_bytes());
    rng.fill_bytes(&mut payload[4..]);
    base62_encode(&payload)
}

/// Base62-encodes a 160-bit big-endian payload to a fixed 27-character
/// string, left-padding with the alphabet's zero digit so lexicographic
/// string order matches numeric order (and therefore insertion order).
fn base62_encode(payload: &[u8; 20]) -> String {
    let mut digits = [0u8; ENCODED_LEN];
    let mut number = payload.to_vec();

    for slot in digits.iter_mut().rev() {
        let mut remainder: u32 = 0;
        for byte in number.iter_mut() {
            let value = (remainder << 8) | *byte as u32;
            *byte = (value / 62) as u8;
            remainder = value % 62;
        }
        *slot = BASE62_ALPHABET[remainder as usize];
    }

    String::from_utf8(digits.to_vec()).expect("base62 alphabet is ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn generated_id_has_fixed_length() {
        let id = generate();
        assert_eq!(id.len(), ENCODED_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn later_timestamp_sorts_after_earlier_one() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let earlier = generate_at(KSUID_EPOCH + 1_000, &mut rng);
        let later = generate_at(KSUID_EPOCH + 2_000, &mut rng);
        assert!(later > earlier);
    }

    #[test]
    fn two_ids_at_the_same_instant_are_still_distinct() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let a = generate_at(KSUID_EPOCH, &mut rng);
        let b = generate_at(KSUID_EPOCH, &mut rng);
        assert_ne!(a, b);
    }
}
