use hmac::{Hmac, Mac};
use sha2::Sha256;

// Provably-fair HMAC construction, one digest per derivation round:
// HMAC-SHA256(key = server_seed, msg = "client_seed:nonce:round") -> 64 hex chars
// -> 8-hex-char segments -> u32 -> fraction in [0,1]

pub type HmacSha256 = Hmac<Sha256>;

/// Width of one digest segment in hex characters (one big-endian u32).
pub const SEGMENT_HEX_LEN: usize = 8;

pub fn derive_hash_hex(input: &[u8]) -> String {
    use sha2::Digest;
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

pub fn hmac_hex(key: &[u8], message: &[u8]) -> String {
    // HMAC takes keys of any length, including empty ones.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

pub fn round_message(client_seed: &str, nonce: i64, round: u32) -> String {
    format!("{}:{}:{}", client_seed, nonce, round)
}

/// Parses a hex digest into consecutive u32 segments, left to right.
///
/// A trailing piece shorter than [`SEGMENT_HEX_LEN`] is dropped, never padded.
/// Scanning stops at the first segment that is not valid hex.
pub fn segment_values(digest_hex: &str) -> impl Iterator<Item = u32> + '_ {
    digest_hex
        .as_bytes()
        .chunks_exact(SEGMENT_HEX_LEN)
        .map_while(|chunk| {
            std::str::from_utf8(chunk)
                .ok()
                .and_then(|s| u32::from_str_radix(s, 16).ok())
        })
}

/// Maps a segment onto [0, 1]. Both ends are reachable: 1.0 only at `u32::MAX`.
pub fn segment_fraction(n: u32) -> f64 {
    n as f64 / u32::MAX as f64
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvablyFairRng {
    pub server_seed: String, // secret until revealed
    pub client_seed: String,
    pub nonce: i64,
}

impl ProvablyFairRng {
    pub fn new(server_seed: impl Into<String>, client_seed: impl Into<String>, nonce: i64) -> Self {
        Self {
            server_seed: server_seed.into(),
            client_seed: client_seed.into(),
            nonce,
        }
    }

    pub fn server_seed_hash_hex(&self) -> String {
        derive_hash_hex(self.server_seed.as_bytes())
    }

    pub fn round_digest_hex(&self, round: u32) -> String {
        let msg = round_message(&self.client_seed, self.nonce, round);
        hmac_hex(self.server_seed.as_bytes(), msg.as_bytes())
    }
}
