//! # lfs-transfer
//!
//! Client implementation of the Git LFS (Large File Storage) transfer
//! protocol.
//!
//! This crate provides:
//! - Batch API negotiation: declare objects and supported transfer modes,
//!   receive per-object action descriptors
//! - The "basic" transfer adapter (single PUT + optional verify)
//! - The "multipart-basic" transfer adapter (init, ordered part uploads with
//!   aggregate progress, commit, verify)
//! - Pluggable HTTP transport and file abstractions for testing and reuse
//!
//! ## Example
//!
//! ```no_run
//! use lfs_transfer::{LfsClient, LocalFile, Progress};
//!
//! let client = LfsClient::new("https://lfs.example.com")
//!     .unwrap()
//!     .with_token("my-access-token");
//!
//! let file = LocalFile::open("data/measurements.csv").unwrap();
//! let mut on_progress = |p: Progress| println!("{}/{} bytes", p.loaded, p.total);
//!
//! // false means the server already had the object
//! let transferred = client
//!     .upload(&file, "myorg", "my-dataset", Some(&mut on_progress))
//!     .unwrap();
//! println!("transferred: {transferred}");
//! ```

mod batch;
mod client;
mod error;
mod oid;
mod progress;
mod source;
mod transfer;
mod transport;

pub use batch::{
    Action, BatchRequest, BatchResponse, ObjectActions, ObjectDescriptor, ObjectError,
    ObjectSpec, Operation, PartAction, RefInfo, LFS_MEDIA_TYPE,
};
pub use client::LfsClient;
pub use error::{Error, Result, Stage};
pub use oid::Oid;
pub use progress::{Progress, ProgressSink};
pub use source::{FileSource, LocalFile};
pub use transfer::{BasicTransfer, MultipartTransfer, TransferMode};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, UreqTransport};
