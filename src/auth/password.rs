//! Salted password digests in a self-describing `$`-delimited format.
//!
//! Stored hashes look like `$argon2id$v=19$m=65536,t=3,p=4$<salt>$<digest>`.
//! The digest itself is PBKDF2-HMAC-SHA256 with `t * 1000` iterations; the
//! `argon2id` tag and the `m`/`p` parameters are kept for compatibility with
//! records already provisioned in the store.

use base64ct::{Base64Unpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

pub const ALGORITHM_ID: &str = "argon2id";
pub const VERSION_TAG: &str = "v=19";
pub const DEFAULT_COST: u32 = 3;
pub const MAX_COST: u32 = 1_000;
pub const SALT_LEN: usize = 32;
pub const DIGEST_LEN: usize = 32;

const ITERATIONS_PER_COST: u32 = 1_000;
const MEMORY_PARAM: &str = "m=65536";
const LANES_PARAM: &str = "p=4";
const FIELD_COUNT: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashError {
    #[error("expected 6 fields, found {0}")]
    FieldCount(usize),
    #[error("unsupported algorithm: {0}")]
    Algorithm(String),
    #[error("malformed parameter: {0}")]
    Parameter(String),
    #[error("missing cost parameter")]
    MissingCost,
    #[error("cost {0} out of range")]
    CostRange(u32),
    #[error("invalid base64 in {0}")]
    Base64(&'static str),
    #[error("failed to generate salt")]
    Salt,
}

/// Checks a plaintext password against a stored hash string.
///
/// Implementations return `false` for any malformed input instead of failing.
pub trait PasswordVerifier: Send + Sync {
    fn verify(&self, password: &str, stored_hash: &str) -> bool;
}

#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordHasher {
    /// Create a hasher that writes new hashes with the given cost factor.
    ///
    /// # Errors
    /// Returns an error if `cost` is zero or above [`MAX_COST`].
    pub fn new(cost: u32) -> Result<Self, HashError> {
        if cost == 0 || cost > MAX_COST {
            return Err(HashError::CostRange(cost));
        }
        Ok(Self { cost })
    }

    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password with a fresh random salt.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails.
    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.try_fill_bytes(&mut salt).map_err(|_| HashError::Salt)?;
        Ok(self.hash_with_salt(password, &salt))
    }

    /// Hash a password with a caller-supplied salt. Same inputs, same output.
    #[must_use]
    pub fn hash_with_salt(&self, password: &str, salt: &[u8]) -> String {
        let digest = derive(password, salt, self.cost);
        format!(
            "${ALGORITHM_ID}${VERSION_TAG}${MEMORY_PARAM},t={},{LANES_PARAM}${}${}",
            self.cost,
            Base64Unpadded::encode_string(salt),
            Base64Unpadded::encode_string(&digest),
        )
    }

    /// Verify a password, keeping the reason for a malformed hash.
    ///
    /// `Ok(false)` means the hash parsed but the password does not match.
    ///
    /// # Errors
    /// Returns an error describing why `stored_hash` could not be parsed.
    pub fn try_verify(&self, password: &str, stored_hash: &str) -> Result<bool, HashError> {
        let parsed = ParsedHash::parse(stored_hash)?;
        let computed = derive(password, &parsed.salt, parsed.cost);
        Ok(constant_time_eq(&computed, &parsed.digest))
    }
}

impl PasswordVerifier for PasswordHasher {
    fn verify(&self, password: &str, stored_hash: &str) -> bool {
        match self.try_verify(password, stored_hash) {
            Ok(matched) => matched,
            Err(err) => {
                debug!("Rejecting malformed password hash: {err}");
                false
            }
        }
    }
}

struct ParsedHash {
    cost: u32,
    salt: Vec<u8>,
    digest: Vec<u8>,
}

impl ParsedHash {
    fn parse(stored: &str) -> Result<Self, HashError> {
        let fields: Vec<&str> = stored.split('$').collect();
        if fields.len() != FIELD_COUNT {
            return Err(HashError::FieldCount(fields.len()));
        }
        if fields[1] != ALGORITHM_ID {
            return Err(HashError::Algorithm(fields[1].to_string()));
        }

        let cost = parse_cost(fields[3])?;
        let salt = decode_field(fields[4], "salt")?;
        let digest = decode_field(fields[5], "digest")?;

        Ok(Self { cost, salt, digest })
    }
}

fn parse_cost(params: &str) -> Result<u32, HashError> {
    let mut cost = None;
    for pair in params.split(',') {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| HashError::Parameter(pair.to_string()))?;
        if key.trim() == "t" {
            let parsed = value
                .trim()
                .parse::<u32>()
                .map_err(|_| HashError::Parameter(pair.to_string()))?;
            cost = Some(parsed);
        }
    }

    let cost = cost.ok_or(HashError::MissingCost)?;
    if cost == 0 || cost > MAX_COST {
        return Err(HashError::CostRange(cost));
    }
    Ok(cost)
}

fn decode_field(value: &str, field: &'static str) -> Result<Vec<u8>, HashError> {
    // Records written by older tooling may still carry padding.
    let value = value.trim_end_matches('=');
    if value.is_empty() {
        return Err(HashError::Base64(field));
    }
    Base64Unpadded::decode_vec(value).map_err(|_| HashError::Base64(field))
}

fn derive(password: &str, salt: &[u8], cost: u32) -> [u8; DIGEST_LEN] {
    let mut digest = [0u8; DIGEST_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt,
        cost.saturating_mul(ITERATIONS_PER_COST),
        &mut digest,
    );
    digest
}

/// Length mismatch is a mismatch; equal lengths are compared without early exit.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SALT: [u8; SALT_LEN] = [9u8; SALT_LEN];

    #[test]
    fn hash_with_fixed_salt_is_stable() {
        let hasher = PasswordHasher::default();
        let first = hasher.hash_with_salt("password123", &SALT);
        let second = hasher.hash_with_salt("password123", &SALT);
        assert_eq!(first, second);
    }

    #[test]
    fn hash_has_six_fields_and_tag() {
        let hash = PasswordHasher::default().hash_with_salt("password123", &SALT);
        let fields: Vec<&str> = hash.split('$').collect();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[0], "");
        assert_eq!(fields[1], "argon2id");
        assert_eq!(fields[2], "v=19");
        assert_eq!(fields[3], "m=65536,t=3,p=4");
        assert!(!fields[4].ends_with('='));
        assert!(!fields[5].ends_with('='));
    }

    #[test]
    fn verify_round_trip() {
        let hasher = PasswordHasher::default();
        let hash = hasher.hash_with_salt("password123", &SALT);
        assert!(hasher.verify("password123", &hash));
        assert!(!hasher.verify("password124", &hash));
        assert!(!hasher.verify("", &hash));
    }

    #[test]
    fn random_salts_differ_but_both_verify() {
        let hasher = PasswordHasher::default();
        let first = hasher.hash("secret-pass").unwrap();
        let second = hasher.hash("secret-pass").unwrap();
        assert_ne!(first, second);
        assert!(hasher.verify("secret-pass", &first));
        assert!(hasher.verify("secret-pass", &second));
    }

    #[test]
    fn verify_uses_cost_from_stored_hash() {
        let stored = PasswordHasher::new(2).unwrap().hash_with_salt("pw-123456", &SALT);
        // A hasher configured with another cost still honours the stored one.
        assert!(PasswordHasher::new(5).unwrap().verify("pw-123456", &stored));
    }

    #[test]
    fn matches_known_answer() {
        // Record produced by hashlib.pbkdf2_hmac("sha256", b"password123", b"\x09" * 32, 3000).
        const KNOWN: &str = "$argon2id$v=19$m=65536,t=3,p=4$CQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQk$/xZmV9bLhsGk2iFSbX/0u9WMiDu2gQCHgHZlpMrczD4";
        let hasher = PasswordHasher::default();
        assert_eq!(hasher.hash_with_salt("password123", &SALT), KNOWN);
        assert!(hasher.verify("password123", KNOWN));
    }

    #[test]
    fn malformed_hashes_fail_closed() {
        let hasher = PasswordHasher::default();
        let good = hasher.hash_with_salt("password123", &SALT);
        let fields: Vec<&str> = good.split('$').collect();

        let cases = [
            "not-a-valid-hash".to_string(),
            String::new(),
            "$argon2id$v=19$m=65536,t=3,p=4$onlyfive".to_string(),
            good.replace("argon2id", "argon2i"),
            format!("${}${}$m=65536,p=4${}${}", fields[1], fields[2], fields[4], fields[5]),
            format!("${}${}$m=65536,t=x,p=4${}${}", fields[1], fields[2], fields[4], fields[5]),
            format!("${}${}$m=65536,t=0,p=4${}${}", fields[1], fields[2], fields[4], fields[5]),
            format!("${}${}$garbage${}${}", fields[1], fields[2], fields[4], fields[5]),
            format!("${}${}${}$!!!${}", fields[1], fields[2], fields[3], fields[5]),
            format!("${}${}${}${}$", fields[1], fields[2], fields[3], fields[4]),
            format!("{good}$extra"),
        ];

        for case in &cases {
            assert!(!hasher.verify("password123", case), "accepted: {case}");
        }
    }

    #[test]
    fn try_verify_reports_cause() {
        let hasher = PasswordHasher::default();
        assert_eq!(
            hasher.try_verify("x", "not-a-valid-hash"),
            Err(HashError::FieldCount(1))
        );
        assert_eq!(
            hasher.try_verify("x", "$bcrypt$v=19$t=3$AAAA$AAAA"),
            Err(HashError::Algorithm("bcrypt".to_string()))
        );
        assert_eq!(
            hasher.try_verify("x", "$argon2id$v=19$m=1,p=4$AAAA$AAAA"),
            Err(HashError::MissingCost)
        );
    }

    #[test]
    fn truncated_digest_is_rejected() {
        let hasher = PasswordHasher::default();
        let hash = hasher.hash_with_salt("password123", &SALT);
        let (prefix, digest_b64) = hash.rsplit_once('$').unwrap();
        let digest = Base64Unpadded::decode_vec(digest_b64).unwrap();
        let short = format!("{prefix}${}", Base64Unpadded::encode_string(&digest[..16]));
        assert_eq!(hasher.try_verify("password123", &short), Ok(false));
    }

    #[test]
    fn padded_fields_are_accepted() {
        let hasher = PasswordHasher::default();
        let salt = [1u8; 16];
        let hash = hasher.hash_with_salt("password123", &salt);
        let (prefix, digest) = hash.rsplit_once('$').unwrap();
        let (head, salt_b64) = prefix.rsplit_once('$').unwrap();
        let padded = format!("{head}${salt_b64}==${digest}=");
        assert!(hasher.verify("password123", &padded));
    }

    #[test]
    fn new_rejects_out_of_range_cost() {
        assert_eq!(PasswordHasher::new(0).err(), Some(HashError::CostRange(0)));
        assert!(PasswordHasher::new(MAX_COST + 1).is_err());
        assert_eq!(PasswordHasher::new(4).map(|h| h.cost()), Ok(4));
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
