//! Stable ID newtypes for federation entities.
//!
//! [`RepoId`] and [`PatchId`] are opaque wrappers providing type safety.
//! [`NodeId`] is a 32-byte blake3 digest of a node's identity tuple
//! `(repo_id, file_path, name, kind)` -- the same tuple always yields the
//! same id across re-ingestions, which is what keeps patch-proposal
//! targeting stable when a repository snapshot is replaced. Ids are
//! serialized as 64-character lowercase hex strings on the wire.

use std::fmt;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::CoreError;

/// Unique identifier for an ingested repository.
///
/// The inner `i64` aligns with SQLite's `INTEGER PRIMARY KEY`; a repository
/// gains its id at first import and keeps it across re-ingestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoId(pub i64);

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a patch proposal.
///
/// Server-assigned v4 UUID; clients never mint patch ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchId(pub Uuid);

impl PatchId {
    /// Mints a fresh patch id.
    pub fn new() -> Self {
        PatchId(Uuid::new_v4())
    }

    /// Parses a patch id from its string form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Uuid::parse_str(s)
            .map(PatchId)
            .map_err(|_| CoreError::InvalidPatchId {
                value: s.to_string(),
            })
    }
}

impl Default for PatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic, content-derived identifier for a symbol node.
///
/// A blake3 digest of the node's identity tuple. Ordering is byte-wise,
/// which gives the lock manager and hash composition a stable total order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    /// Wraps raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        NodeId(bytes)
    }

    /// Renders the id as 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in &self.0 {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }

    /// Parses a 64-character hex string back into an id.
    pub fn parse_hex(s: &str) -> Result<Self, CoreError> {
        if !s.is_ascii() || s.len() != 64 {
            return Err(CoreError::InvalidNodeId {
                value: s.to_string(),
            });
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| CoreError::InvalidNodeId {
                value: s.to_string(),
            })?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| CoreError::InvalidNodeId {
                value: s.to_string(),
            })?;
        }
        Ok(NodeId(bytes))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.to_hex())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        NodeId::parse_hex(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_hex_roundtrip() {
        let id = NodeId::from_bytes([0xab; 32]);
        let hex = id.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(NodeId::parse_hex(&hex).unwrap(), id);
    }

    #[test]
    fn node_id_rejects_bad_input() {
        assert!(NodeId::parse_hex("abc").is_err());
        assert!(NodeId::parse_hex(&"zz".repeat(32)).is_err());
        assert!(NodeId::parse_hex(&"é".repeat(64)).is_err());
    }

    #[test]
    fn node_id_serde_uses_hex_string() {
        let id = NodeId::from_bytes([0x01; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn patch_id_parse_roundtrip() {
        let id = PatchId::new();
        assert_eq!(PatchId::parse(&id.to_string()).unwrap(), id);
        assert!(PatchId::parse("not-a-uuid").is_err());
    }
}
