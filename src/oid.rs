//! LFS Object ID (OID) - SHA256 content digest.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Content digest identifying one LFS object.
///
/// The batch protocol exchanges OIDs as lowercase hex strings; this type
/// keeps the raw 32 bytes and converts at the wire boundary.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    bytes: [u8; 32],
}

impl Oid {
    /// Create an OID from raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Oid { bytes }
    }

    /// Parse an OID from a hex string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim();
        if hex.len() != 64 {
            return Err(Error::InvalidOid(format!(
                "expected 64 hex chars, got {}",
                hex.len()
            )));
        }

        let decoded = hex::decode(hex).map_err(|e| Error::InvalidOid(e.to_string()))?;

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Oid { bytes })
    }

    /// Compute the OID of in-memory content.
    pub fn from_content(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Oid { bytes }
    }

    /// Get the OID as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Get the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.to_hex())
    }
}

impl std::str::FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Oid::from_hex(s)
    }
}
