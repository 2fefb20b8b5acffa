//! Remote dictionary store capability.
//!
//! The sync monitor and the dictionary only see [`RemoteDictStore`]. Concrete
//! backends: [`MemoryStore`] and [`FileStore`] (local fixtures and
//! single-host deployments) and [`HttpStore`] (read-only object endpoints with
//! credential refresh).

mod credential;
mod endpoint;
mod file;
mod http;
mod memory;

pub use credential::{
    Credential, CredentialError, CredentialProvider, RamRoleCredentials, StaticCredentials,
    EXPIRY_SAFETY_WINDOW,
};
pub use endpoint::Endpoint;
pub use file::FileStore;
pub use http::{HttpStore, HttpTimeouts};
pub use memory::MemoryStore;

use std::collections::BTreeMap;
use std::io;

use crate::unicode::strip_bom;

/// Result of a read that may legitimately find nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch<T> {
    Found(T),
    NotFound,
}

impl<T> Fetch<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Fetch::Found(v) => Some(v),
            Fetch::NotFound => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Fetch::NotFound)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetch<U> {
        match self {
            Fetch::Found(v) => Fetch::Found(f(v)),
            Fetch::NotFound => Fetch::NotFound,
        }
    }
}

/// Change token plus the per-node acknowledgement map of a remote object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Opaque version token (ETag or Last-Modified).
    pub etag: String,
    /// Lower-cased node id → change token that node has adopted.
    pub acks: BTreeMap<String, String>,
}

impl ObjectMetadata {
    pub fn ack_for(&self, node_id: &str) -> Option<&str> {
        self.acks.get(&node_id.to_lowercase()).map(String::as_str)
    }
}

/// One node's acknowledgement of a change token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAck {
    pub node_id: String,
    pub etag: String,
    /// Other live nodes whose entries must be kept. Empty keeps every entry.
    pub peers: Vec<String>,
}

impl NodeAck {
    /// Apply this ack to an existing map: keep live peers, drop departed
    /// nodes, set the local entry. Keys are lower-cased.
    pub fn apply(&self, acks: &mut BTreeMap<String, String>) {
        if !self.peers.is_empty() {
            let peers: Vec<String> = self.peers.iter().map(|p| p.to_lowercase()).collect();
            acks.retain(|node, _| peers.iter().any(|p| p == node));
        }
        acks.insert(self.node_id.to_lowercase(), self.etag.clone());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    #[error("remote timed out: {0}")]
    Timeout(String),

    #[error("malformed remote content: {0}")]
    Malformed(String),

    #[error("credential unavailable: {0}")]
    Credential(#[from] CredentialError),

    #[error("operation not supported by {0}")]
    Unsupported(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Transport failures that the next scheduled poll may recover from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_)
                | StoreError::Timeout(_)
                | StoreError::Credential(_)
                | StoreError::Io(_)
        )
    }
}

/// Abstract remote object store holding one dictionary per endpoint.
///
/// Calls are blocking and bounded by the backend's timeouts.
pub trait RemoteDictStore: Send + Sync {
    /// Current change token and acknowledgement map.
    fn metadata(&self, endpoint: &str) -> Result<Fetch<ObjectMetadata>, StoreError>;

    /// Dictionary lines, comment lines already removed.
    fn content(&self, endpoint: &str) -> Result<Fetch<Vec<String>>, StoreError>;

    /// Record `ack` in the object's metadata, preserving other live nodes.
    fn set_node_ack(&self, endpoint: &str, ack: &NodeAck) -> Result<(), StoreError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Split raw content into lines, dropping `#` comments and a leading BOM.
pub fn content_lines(text: &str) -> Vec<String> {
    text.lines()
        .enumerate()
        .map(|(i, line)| if i == 0 { strip_bom(line) } else { line })
        .filter(|line| !line.trim().starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Decode raw bytes as UTF-8 content lines.
pub fn decode_content(bytes: Vec<u8>) -> Result<Vec<String>, StoreError> {
    let text = String::from_utf8(bytes)
        .map_err(|e| StoreError::Malformed(format!("content is not UTF-8: {e}")))?;
    Ok(content_lines(&text))
}

/// Change tokens compare case-insensitively.
pub fn same_etag(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Content-derived change token used by the local backends.
pub(crate) fn content_etag(bytes: &[u8]) -> String {
    format!("\"{:08X}-{}\"", crc32fast::hash(bytes), bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_lines_are_dropped() {
        let lines = content_lines("\u{FEFF}北京\n  # comment\n大学\n\n#x\n");
        assert_eq!(lines, vec!["北京", "大学", ""]);
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let err = decode_content(vec![0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn etag_comparison_ignores_case() {
        assert!(same_etag("\"ABC\"", "\"abc\""));
        assert!(!same_etag("v1", "v2"));
    }

    #[test]
    fn ack_keeps_live_peers_only() {
        let mut acks = BTreeMap::new();
        acks.insert("beta".to_string(), "v1".to_string());
        acks.insert("gone".to_string(), "v0".to_string());
        let ack = NodeAck {
            node_id: "Alpha".into(),
            etag: "v2".into(),
            peers: vec!["BETA".into()],
        };
        ack.apply(&mut acks);
        assert_eq!(acks.len(), 2);
        assert_eq!(acks["alpha"], "v2");
        assert_eq!(acks["beta"], "v1");
    }

    #[test]
    fn ack_without_membership_keeps_everything() {
        let mut acks = BTreeMap::new();
        acks.insert("gone".to_string(), "v0".to_string());
        NodeAck {
            node_id: "alpha".into(),
            etag: "v2".into(),
            peers: Vec::new(),
        }
        .apply(&mut acks);
        assert_eq!(acks.len(), 2);
    }

    #[test]
    fn content_etag_tracks_bytes() {
        assert_eq!(content_etag(b"abc"), content_etag(b"abc"));
        assert_ne!(content_etag(b"abc"), content_etag(b"abd"));
    }
}
