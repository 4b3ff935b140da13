//! Deterministic store identifiers for feed events.
//!
//! The id of a mirrored entry is the hex SHA-256 of the event's feed UID, so
//! the same UID always lands on the same entry and is updated in place.

use sha2::{Digest, Sha256};

use crate::error::ConfigError;

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Google Calendar accepts event ids of up to 1024 characters.
pub const DEFAULT_MAX_ID_LEN: usize = 1024;

/// Hex SHA-256 of a feed UID.
pub fn entry_id(source_uid: &str) -> String {
    hex::encode(Sha256::digest(source_uid.as_bytes()))
}

/// Maps feed UIDs to store ids under the store's id length ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityMapper {
    max_len: usize,
}

impl Default for IdentityMapper {
    fn default() -> Self {
        IdentityMapper {
            max_len: DEFAULT_MAX_ID_LEN,
        }
    }
}

impl IdentityMapper {
    /// Ceilings shorter than a full digest are rejected; ids are never truncated.
    pub fn new(max_len: usize) -> Result<Self, ConfigError> {
        if max_len < DIGEST_HEX_LEN {
            return Err(ConfigError::Invalid {
                key: "max_id_len".into(),
                reason: format!(
                    "must be at least {} to hold a full SHA-256 id, got {}",
                    DIGEST_HEX_LEN, max_len
                ),
            });
        }
        Ok(IdentityMapper { max_len })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn map(&self, source_uid: &str) -> String {
        let id = entry_id(source_uid);
        debug_assert!(id.len() <= self.max_len);
        id
    }
}
