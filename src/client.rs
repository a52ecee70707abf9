//! LFS client: batch negotiation and transfer orchestration.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::debug;
use url::Url;

use crate::batch::{BatchRequest, BatchResponse, ObjectDescriptor, LFS_MEDIA_TYPE};
use crate::error::Stage;
use crate::progress::ProgressSink;
use crate::source::FileSource;
use crate::transfer::{merge_headers, BasicTransfer, MultipartTransfer, TransferMode};
use crate::transport::{HttpRequest, HttpTransport, UreqTransport};
use crate::{Error, Oid, Result};

const USER_AGENT: &str = concat!("lfs-transfer/", env!("CARGO_PKG_VERSION"));

/// Ref sent with upload negotiations unless the caller configures another.
const DEFAULT_REF: &str = "refs/heads/master";

/// Authentication method for LFS requests.
#[derive(Clone)]
enum Auth {
    /// Bearer token (OAuth/PAT)
    Bearer(String),
    /// Basic auth (username, password)
    Basic(String, String),
}

impl Auth {
    fn header_value(&self) -> String {
        match self {
            Auth::Bearer(token) => format!("Bearer {token}"),
            Auth::Basic(username, password) => {
                let credentials = format!("{username}:{password}");
                format!("Basic {}", BASE64.encode(credentials.as_bytes()))
            }
        }
    }
}

/// Client for an LFS server, generic over the HTTP transport.
///
/// Negotiates per-object actions with the server's batch endpoint and drives
/// the negotiated transfer adapter. Holds no per-transfer state, so one
/// client can serve independent transfers from separate calls.
#[derive(Clone)]
pub struct LfsClient<T = UreqTransport> {
    base_url: Url,
    auth: Option<Auth>,
    transfers: Vec<TransferMode>,
    default_ref: String,
    transport: T,
}

impl LfsClient<UreqTransport> {
    /// Create a client for an LFS server URL, using the default transport.
    pub fn new(lfs_server: &str) -> Result<Self> {
        Self::with_transport(lfs_server, UreqTransport::new())
    }
}

impl<T: HttpTransport> LfsClient<T> {
    /// Create a client with a caller-supplied transport.
    pub fn with_transport(lfs_server: &str, transport: T) -> Result<Self> {
        let base_url = Url::parse(lfs_server.trim().trim_end_matches('/'))?;
        Ok(LfsClient {
            base_url,
            auth: None,
            transfers: TransferMode::defaults(),
            default_ref: DEFAULT_REF.to_string(),
            transport,
        })
    }

    /// Authenticate with a bearer token (OAuth/PAT).
    pub fn with_token(mut self, token: &str) -> Self {
        self.auth = Some(Auth::Bearer(token.to_string()));
        self
    }

    /// Authenticate with basic credentials.
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.auth = Some(Auth::Basic(username.to_string(), password.to_string()));
        self
    }

    /// Set the ref name sent with upload negotiations (e.g. "refs/heads/main").
    pub fn with_default_ref(mut self, ref_name: &str) -> Self {
        self.default_ref = ref_name.to_string();
        self
    }

    /// Set the transfer modes offered to servers, in preference order.
    pub fn with_transfer_modes(mut self, modes: Vec<TransferMode>) -> Self {
        self.transfers = modes;
        self
    }

    /// The LFS server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn batch_endpoint(&self, prefix: &str) -> String {
        format!(
            "{}/{}/objects/batch",
            self.base_url.as_str().trim_end_matches('/'),
            prefix
        )
    }

    /// Negotiate transfer actions with the server's batch endpoint.
    ///
    /// `prefix` scopes the endpoint to a repository or dataset, e.g.
    /// `myorg/mydataset`. When the request carries no `transfers` list, the
    /// client's configured preference order is sent. Exactly one network
    /// round trip; any non-200 status is a fatal [`Error::Protocol`] and is
    /// never retried here.
    pub fn batch(&self, prefix: &str, request: &BatchRequest) -> Result<BatchResponse> {
        let url = self.batch_endpoint(prefix);
        debug!(%url, operation = ?request.operation, objects = request.objects.len(), "negotiating batch");

        let mut request = request.clone();
        if request.transfers.is_none() {
            request.transfers = Some(
                self.transfers
                    .iter()
                    .map(|mode| mode.as_str().to_string())
                    .collect(),
            );
        }
        let body = serde_json::to_vec(&request)?;

        let mut headers = vec![
            ("Content-Type".to_string(), LFS_MEDIA_TYPE.to_string()),
            ("Accept".to_string(), LFS_MEDIA_TYPE.to_string()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ];
        if let Some(auth) = &self.auth {
            headers.push(("Authorization".to_string(), auth.header_value()));
        }

        let response = self.transport.execute(HttpRequest {
            method: "POST",
            url: &url,
            headers,
            body: Some(&body),
            progress: None,
        })?;

        if response.status != 200 {
            return Err(Error::Protocol {
                status: response.status,
                message: response
                    .message()
                    .unwrap_or_else(|| "unexpected response from batch endpoint".to_string()),
            });
        }

        Ok(response.json()?)
    }

    /// Upload one file to the dataset at `{organization_id}/{dataset_id}`.
    ///
    /// Returns `Ok(false)` when the server already holds the object and no
    /// transfer was performed; `Ok(true)` after a completed transfer.
    pub fn upload(
        &self,
        file: &dyn FileSource,
        organization_id: &str,
        dataset_id: &str,
        mut progress: Option<&mut dyn ProgressSink>,
    ) -> Result<bool> {
        let oid = hash_file(file)?;
        let size = file.size();
        debug!(oid = %oid, size, "negotiating upload");

        let prefix = format!("{organization_id}/{dataset_id}");
        let request = BatchRequest::upload(vec![ObjectDescriptor::new(&oid.to_hex(), size)])
            .with_ref(&self.default_ref);

        let BatchResponse { transfer, objects } = self.batch(&prefix, &request)?;
        let object = objects.into_iter().next().ok_or_else(|| Error::Protocol {
            status: 200,
            message: "batch response contained no objects".to_string(),
        })?;

        if let Some(error) = object.error {
            return Err(Error::Protocol {
                status: error.code,
                message: error.message,
            });
        }

        let Some(actions) = object.actions else {
            debug!(oid = %oid, "object already present on server, nothing to transfer");
            return Ok(false);
        };

        let mode = TransferMode::from_server(&transfer)
            .ok_or_else(|| Error::UnsupportedTransfer(transfer.clone()))?;
        debug!(mode = %mode, "negotiated transfer mode");

        match mode {
            TransferMode::Basic => {
                BasicTransfer::new(&self.transport, &actions, file, progress.take()).upload()?
            }
            TransferMode::MultipartBasic => {
                MultipartTransfer::new(&self.transport, &actions, file, progress.take()).upload()?
            }
        }
        Ok(true)
    }

    /// Download one object's content from the dataset at `prefix`.
    ///
    /// The downloaded bytes are re-hashed and must match the requested OID.
    pub fn download(&self, prefix: &str, oid: &Oid, size: u64) -> Result<Vec<u8>> {
        let request = BatchRequest::download(vec![ObjectDescriptor::new(&oid.to_hex(), size)]);
        let BatchResponse { transfer, objects } = self.batch(prefix, &request)?;

        let object = objects
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(oid.to_hex()))?;

        if let Some(error) = object.error {
            return Err(Error::Protocol {
                status: error.code,
                message: error.message,
            });
        }

        TransferMode::from_server(&transfer)
            .ok_or_else(|| Error::UnsupportedTransfer(transfer.clone()))?;

        let action = object
            .actions
            .as_ref()
            .and_then(|actions| actions.download.as_ref())
            .ok_or_else(|| Error::NotFound(oid.to_hex()))?;

        let headers = merge_headers(&[], &action.header);
        let method = action.method.as_deref().unwrap_or("GET");
        let response = self.transport.execute(HttpRequest {
            method,
            url: &action.href,
            headers,
            body: None,
            progress: None,
        })?;

        if !response.is_success() {
            return Err(Error::Transfer {
                stage: Stage::Download,
                status: response.status,
                message: response.message(),
            });
        }

        let content = response.body;
        let actual = Oid::from_content(&content);
        if actual != *oid {
            return Err(Error::DigestMismatch {
                expected: oid.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(content)
    }
}

/// Hash a file, logging progress at quarter steps.
fn hash_file(file: &dyn FileSource) -> Result<Oid> {
    let mut last_logged = 0u8;
    let oid = file.digest(Some(&mut |percent| {
        if percent % 25 == 0 && percent != last_logged {
            last_logged = percent;
            debug!(percent, "hashing content");
        }
    }))?;
    Ok(oid)
}
