//! API credential codec
//!
//! Issued secrets look like `<namespace_tag><32 lowercase hex chars>`, e.g.
//! `nb_live_3fa94c...`. Only the SHA-256 digest and a short display prefix are
//! ever stored; the secret itself leaves this module exactly once, inside
//! [`IssuedCredential`].

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Random bytes behind every secret (128 bits of entropy)
pub const SECRET_RANDOM_BYTES: usize = 16;

/// Hex characters of the random part that are kept in the display prefix
pub const PREFIX_RANDOM_CHARS: usize = 4;

/// Length of a hex-encoded SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

/// Plaintext API key. `Debug` and `Display` never print it.
#[derive(Clone, PartialEq, Eq)]
pub struct PlainSecret(String);

impl PlainSecret {
    /// The only way to read the secret
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for PlainSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PlainSecret(<redacted>)")
    }
}

/// Hex SHA-256 digest of a full secret
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyDigest(String);

impl KeyDigest {
    /// Wrap a digest loaded from storage
    pub fn from_stored(hex: String) -> Self {
        KeyDigest(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Everything produced by a single issuance
#[derive(Debug)]
pub struct IssuedCredential {
    pub secret: PlainSecret,
    pub digest: KeyDigest,
    pub prefix: String,
}

/// Generates secrets and checks the shape of presented ones
#[derive(Debug, Clone)]
pub struct CredentialCodec {
    namespace_tag: String,
}

impl CredentialCodec {
    pub fn new(namespace_tag: impl Into<String>) -> Self {
        Self {
            namespace_tag: namespace_tag.into(),
        }
    }

    pub fn namespace_tag(&self) -> &str {
        &self.namespace_tag
    }

    /// Total length of every secret this codec issues
    pub fn secret_len(&self) -> usize {
        self.namespace_tag.len() + SECRET_RANDOM_BYTES * 2
    }

    /// Length of the display prefix
    pub fn prefix_len(&self) -> usize {
        self.namespace_tag.len() + PREFIX_RANDOM_CHARS
    }

    /// Generate a fresh secret with its digest and display prefix
    pub fn issue(&self) -> IssuedCredential {
        let mut random = [0u8; SECRET_RANDOM_BYTES];
        rand::thread_rng().fill_bytes(&mut random);

        let secret = format!("{}{}", self.namespace_tag, hex::encode(random));
        let digest = Self::digest_of(&secret);
        let prefix = secret[..self.prefix_len()].to_string();

        IssuedCredential {
            secret: PlainSecret(secret),
            digest,
            prefix,
        }
    }

    /// Cheap structural check run before any hashing or lookup
    pub fn verify_shape(&self, candidate: &str) -> bool {
        if candidate.len() != self.secret_len() {
            return false;
        }

        match candidate.strip_prefix(self.namespace_tag.as_str()) {
            Some(random) => random
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)),
            None => false,
        }
    }

    /// One-way digest used for storage and lookup
    pub fn digest_of(candidate: &str) -> KeyDigest {
        let mut hasher = Sha256::new();
        hasher.update(candidate.as_bytes());
        KeyDigest(hex::encode(hasher.finalize()))
    }
}
