//! Transfer adapters.
//!
//! After batch negotiation the server names one transfer mode; the matching
//! adapter then drives the actual HTTP calls. The protocol defines a closed
//! set of modes, so dispatch is an enum, and an unknown mode is an explicit
//! error rather than a silent no-op.

use std::collections::HashMap;
use std::fmt;

use crate::batch::{Action, LFS_MEDIA_TYPE};
use crate::error::Stage;
use crate::source::FileSource;
use crate::transport::{HttpRequest, HttpTransport};
use crate::{Error, Result};

mod basic;
mod multipart;

pub use basic::BasicTransfer;
pub use multipart::MultipartTransfer;

/// A transfer mode this client can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Chunked upload with init/part/commit/verify steps.
    MultipartBasic,
    /// Single-PUT upload with optional verify.
    Basic,
}

impl TransferMode {
    /// Parse a server-negotiated mode identifier.
    pub fn from_server(name: &str) -> Option<TransferMode> {
        match name {
            "basic" => Some(TransferMode::Basic),
            "multipart-basic" => Some(TransferMode::MultipartBasic),
            _ => None,
        }
    }

    /// The identifier sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            TransferMode::Basic => "basic",
            TransferMode::MultipartBasic => "multipart-basic",
        }
    }

    /// Modes offered by default, in preference order.
    pub fn defaults() -> Vec<TransferMode> {
        vec![TransferMode::MultipartBasic, TransferMode::Basic]
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merge server-issued headers over defaults; action headers win, matching
/// case-insensitively on the name.
pub(crate) fn merge_headers(
    defaults: &[(&str, &str)],
    overrides: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = defaults
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    for (name, value) in overrides {
        match merged.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = value.clone(),
            None => merged.push((name.clone(), value.clone())),
        }
    }
    merged
}

/// Send the verify action: POST `{oid, size}` with the digest recomputed
/// from the file, so verification covers what is actually on disk rather
/// than what negotiation assumed.
pub(crate) fn verify_object(
    transport: &dyn HttpTransport,
    action: &Action,
    file: &dyn FileSource,
) -> Result<()> {
    let oid = file.digest(None)?;
    let body = serde_json::to_vec(&serde_json::json!({
        "oid": oid.to_hex(),
        "size": file.size(),
    }))?;

    let headers = merge_headers(
        &[("Accept", LFS_MEDIA_TYPE), ("Content-Type", LFS_MEDIA_TYPE)],
        &action.header,
    );

    let response = transport.execute(HttpRequest {
        method: "POST",
        url: &action.href,
        headers,
        body: Some(&body),
        progress: None,
    })?;

    if response.status != 200 {
        return Err(Error::Transfer {
            stage: Stage::Verify,
            status: response.status,
            message: response.message(),
        });
    }
    Ok(())
}
