//! Deterministic record names for challenges.
//!
//! A name is the challenge's domain (trailing root label and leading wildcard removed) followed
//! by a short suffix derived from a 32-bit FNV-1 hash of the challenge key. The suffix is the
//! decimal hash value with each digit mapped onto a consonant/digit alphabet, which keeps names
//! readable and valid as store object names.
//!
//! Two keys for the same domain collide with probability ~2^-32. A collision makes one
//! challenge's record overwrite another's. The scheme is kept as is so existing records keep
//! their names.

const FNV32_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV32_PRIME: u32 = 16_777_619;

// Vowels and easily confused characters are excluded.
const ALPHANUMS: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";

/// Return the record name for a challenge on `domain_name` presenting `key`.
#[must_use]
pub fn generate_name(domain_name: &str, key: &str) -> String {
    let domain = domain_name.strip_suffix('.').unwrap_or(domain_name);
    let domain = domain.strip_prefix("*.").unwrap_or(domain);
    format!("{domain}-{}", safe_encode(&fnv1_32(key.as_bytes()).to_string()))
}

fn fnv1_32(data: &[u8]) -> u32 {
    data.iter().fold(FNV32_OFFSET_BASIS, |hash, b| {
        hash.wrapping_mul(FNV32_PRIME) ^ u32::from(*b)
    })
}

fn safe_encode(s: &str) -> String {
    s.chars()
        .map(|c| ALPHANUMS[c as usize % ALPHANUMS.len()] as char)
        .collect()
}
