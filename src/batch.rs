//! LFS Batch API types.
//!
//! The Batch API is the negotiation step: the client declares the objects,
//! the operation and the transfer modes it supports, and the server answers
//! with per-object action descriptors for the mode it picked.
//! See: https://github.com/git-lfs/git-lfs/blob/main/docs/api/batch.md

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Media type for batch requests and responses.
pub const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";

/// Operation type for batch requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Download objects from the server.
    Download,
    /// Upload objects to the server.
    Upload,
}

/// A batch request to the LFS server. Immutable once sent.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRequest {
    /// The operation to perform.
    pub operation: Operation,
    /// Transfer modes the client supports, in preference order. When absent,
    /// the client fills in its configured default list before sending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfers: Option<Vec<String>>,
    /// Reference information (branch, etc).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<RefInfo>,
    /// The objects to operate on. Must be non-empty.
    pub objects: Vec<ObjectDescriptor>,
}

/// Reference information for a batch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefInfo {
    /// The reference name (e.g., "refs/heads/master").
    pub name: String,
}

/// Identifies one transferable object: content digest plus exact byte size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    /// Hex content digest of the object bytes (SHA256).
    pub oid: String,
    /// The size of the object in bytes.
    pub size: u64,
}

/// A batch response from the LFS server.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResponse {
    /// The transfer mode chosen by the server, one of those the client
    /// offered.
    #[serde(default = "default_transfer")]
    pub transfer: String,
    /// The objects with their actions.
    pub objects: Vec<ObjectSpec>,
}

fn default_transfer() -> String {
    "basic".to_string()
}

/// Per-object answer in a batch response.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectSpec {
    /// Hex content digest of the object bytes.
    pub oid: String,
    /// The size of the object in bytes.
    pub size: u64,
    /// Whether the action hrefs are pre-authenticated.
    #[serde(default)]
    pub authenticated: Option<bool>,
    /// Actions to perform. Absent when the object needs no transfer (already
    /// present server-side) - that is not an error.
    #[serde(default)]
    pub actions: Option<ObjectActions>,
    /// Error information if the server rejected this object.
    #[serde(default)]
    pub error: Option<ObjectError>,
}

/// The action descriptors issued for one object.
///
/// The protocol defines a closed set of action names, so this is a typed
/// struct rather than an open map: basic transfers use `upload`/`download`
/// and `verify`, multipart-basic adds `init`, `commit` and the ordered
/// `parts` list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectActions {
    #[serde(default)]
    pub upload: Option<Action>,
    #[serde(default)]
    pub download: Option<Action>,
    #[serde(default)]
    pub verify: Option<Action>,
    #[serde(default)]
    pub init: Option<Action>,
    #[serde(default)]
    pub commit: Option<Action>,
    /// Ordered part descriptors; the order defines both upload sequence and
    /// byte-range derivation.
    #[serde(default)]
    pub parts: Option<Vec<PartAction>>,
}

/// A server-issued descriptor authorizing one HTTP call.
#[derive(Debug, Clone, Deserialize)]
pub struct Action {
    /// The URL for the action.
    pub href: String,
    /// HTTP headers to include in the request.
    #[serde(default)]
    pub header: HashMap<String, String>,
    /// HTTP verb override (init/commit default to POST, upload to PUT).
    #[serde(default)]
    pub method: Option<String>,
    /// Literal request body, for init/commit actions that require one.
    #[serde(default)]
    pub body: Option<String>,
    /// Seconds until the action expires.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Absolute expiration time (ISO 8601).
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// One part of a multipart-basic upload.
#[derive(Debug, Clone, Deserialize)]
pub struct PartAction {
    /// The URL to send this part to.
    pub href: String,
    /// HTTP verb (default PUT).
    #[serde(default)]
    pub method: Option<String>,
    /// HTTP headers to include in the request.
    #[serde(default)]
    pub header: HashMap<String, String>,
    /// Byte offset of this part in the file (default 0).
    #[serde(default)]
    pub pos: Option<u64>,
    /// Byte length of this part (default: remaining bytes from `pos`).
    #[serde(default)]
    pub size: Option<u64>,
    /// Digest algorithms the server accepts for this part, RFC 3230 style.
    #[serde(default)]
    pub want_digest: Option<String>,
}

/// Error information for a batch object.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectError {
    /// HTTP status code.
    pub code: u16,
    /// Error message.
    pub message: String,
}

impl BatchRequest {
    /// Create a new batch request for downloading objects.
    pub fn download(objects: Vec<ObjectDescriptor>) -> Self {
        BatchRequest {
            operation: Operation::Download,
            transfers: None,
            r#ref: None,
            objects,
        }
    }

    /// Create a new batch request for uploading objects.
    pub fn upload(objects: Vec<ObjectDescriptor>) -> Self {
        BatchRequest {
            operation: Operation::Upload,
            transfers: None,
            r#ref: None,
            objects,
        }
    }

    /// Set the reference for this request.
    pub fn with_ref(mut self, name: &str) -> Self {
        self.r#ref = Some(RefInfo {
            name: name.to_string(),
        });
        self
    }

    /// Override the offered transfer modes for this request.
    pub fn with_transfers(mut self, transfers: Vec<String>) -> Self {
        self.transfers = Some(transfers);
        self
    }
}

impl ObjectDescriptor {
    /// Create a new object descriptor.
    pub fn new(oid: &str, size: u64) -> Self {
        ObjectDescriptor {
            oid: oid.to_string(),
            size,
        }
    }
}
