//! The "multipart-basic" transfer adapter.
//!
//! Chunked upload: optional init, the negotiated parts strictly in order,
//! optional commit, optional verify. Progress is reported as one aggregate
//! stream over the whole object, whatever the part layout.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::batch::{Action, ObjectActions, PartAction};
use crate::error::Stage;
use crate::progress::{Progress, ProgressSink};
use crate::source::FileSource;
use crate::transport::{HttpRequest, HttpTransport};
use crate::{Error, Result};

use super::verify_object;

/// Drives a chunked upload as negotiated by the server.
pub struct MultipartTransfer<'a, 'p> {
    transport: &'a dyn HttpTransport,
    actions: &'a ObjectActions,
    file: &'a dyn FileSource,
    sink: Option<&'p mut dyn ProgressSink>,
    bytes_total: u64,
    bytes_uploaded: u64,
}

impl<'a, 'p> MultipartTransfer<'a, 'p> {
    pub fn new(
        transport: &'a dyn HttpTransport,
        actions: &'a ObjectActions,
        file: &'a dyn FileSource,
        sink: Option<&'p mut dyn ProgressSink>,
    ) -> Self {
        MultipartTransfer {
            transport,
            actions,
            file,
            sink,
            bytes_total: 0,
            bytes_uploaded: 0,
        }
    }

    /// Run the transfer to completion: init, every part in order, commit,
    /// verify. The first failing step aborts the whole transfer; parts after
    /// a failed one are never requested.
    pub fn upload(mut self) -> Result<()> {
        let actions = self.actions;

        if let Some(action) = &actions.init {
            self.plain_action(action, Stage::Init)?;
        }

        let parts: &[PartAction] = actions.parts.as_deref().unwrap_or(&[]);
        // The progress baseline treats every listed part as still pending:
        // a server resuming a partial upload lists only the missing parts,
        // and the bytes it already holds count as uploaded from the start.
        self.bytes_total = self.file.size();
        self.bytes_uploaded = self
            .bytes_total
            .saturating_sub(parts.iter().map(|p| self.effective_size(p)).sum());

        for (index, part) in parts.iter().enumerate() {
            debug!(part = index + 1, parts = parts.len(), "uploading part");
            self.upload_part(part, index)?;
            self.bytes_uploaded += self.effective_size(part);
        }

        if let Some(action) = &actions.commit {
            self.plain_action(action, Stage::Commit)?;
        }

        if let Some(action) = &actions.verify {
            verify_object(self.transport, action, self.file)?;
        }

        Ok(())
    }

    /// Bytes a part will carry. The fallback chain is order-sensitive:
    /// explicit `size`, then the remainder past a non-zero `pos`, then the
    /// whole file.
    fn effective_size(&self, part: &PartAction) -> u64 {
        match (part.size, part.pos) {
            (Some(size), _) => size,
            (None, Some(pos)) if pos > 0 => self.file.size().saturating_sub(pos),
            _ => self.file.size(),
        }
    }

    fn upload_part(&mut self, part: &PartAction, index: usize) -> Result<()> {
        let start = part.pos.unwrap_or(0);
        let end = part.size.map(|size| start + size);
        let chunk = self.file.read_range(start, end)?;

        let mut headers = super::merge_headers(&[], &part.header);
        if let Some(want) = &part.want_digest {
            match content_digest_header(want, &chunk) {
                Some(header) => headers.push(header),
                None => debug!(want_digest = %want, "unsupported digest algorithm, omitting header"),
            }
        }

        let method = part.method.as_deref().unwrap_or("PUT");
        let (base, total) = (self.bytes_uploaded, self.bytes_total);
        let sink = &mut self.sink;
        let mut hook = |sent: u64| {
            if let Some(sink) = sink.as_deref_mut() {
                sink.report(Progress {
                    loaded: base + sent,
                    total,
                });
            }
        };

        let response = self.transport.execute(HttpRequest {
            method,
            url: &part.href,
            headers,
            body: Some(&chunk),
            progress: Some(&mut hook),
        })?;

        if !response.is_success() {
            return Err(Error::Transfer {
                stage: Stage::Part(index),
                status: response.status,
                message: response.message(),
            });
        }
        Ok(())
    }

    fn plain_action(&self, action: &Action, stage: Stage) -> Result<()> {
        let method = action.method.as_deref().unwrap_or("POST");
        let headers = super::merge_headers(&[], &action.header);

        let response = self.transport.execute(HttpRequest {
            method,
            url: &action.href,
            headers,
            body: action.body.as_deref().map(str::as_bytes),
            progress: None,
        })?;

        if !response.is_success() {
            return Err(Error::Transfer {
                stage,
                status: response.status,
                message: response.message(),
            });
        }
        Ok(())
    }
}

/// Build an RFC 3230 `Digest` header when the server's `want_digest` list
/// names an algorithm we can serve. `sha-256` is the one we implement;
/// anything else degrades to no header.
fn content_digest_header(want_digest: &str, chunk: &[u8]) -> Option<(String, String)> {
    let supported = want_digest
        .split(',')
        .filter_map(|token| token.split(';').next())
        .any(|name| name.trim().eq_ignore_ascii_case("sha-256"));
    if !supported {
        return None;
    }

    let digest = Sha256::digest(chunk);
    Some(("Digest".to_string(), format!("sha-256={}", BASE64.encode(digest))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchResponse;
    use crate::transport::testing::MockTransport;
    use crate::Oid;

    fn actions_from(json: &str) -> ObjectActions {
        let response: BatchResponse = serde_json::from_str(json).unwrap();
        response.objects[0].actions.clone().unwrap()
    }

    fn adapter<'a>(
        transport: &'a MockTransport,
        actions: &'a ObjectActions,
        file: &'a [u8],
    ) -> MultipartTransfer<'a> {
        MultipartTransfer::new(transport, actions, file, None)
    }

    #[test]
    fn test_effective_size_fallback_chain() {
        let file = [0u8; 300];
        let transport = MockTransport::replying_ok();
        let actions = ObjectActions::default();
        let transfer = adapter(&transport, &actions, &file);

        let part = |pos: Option<u64>, size: Option<u64>| PartAction {
            href: "https://storage.example.com/p".to_string(),
            method: None,
            header: Default::default(),
            pos,
            size,
            want_digest: None,
        };

        assert_eq!(transfer.effective_size(&part(None, Some(100))), 100);
        assert_eq!(transfer.effective_size(&part(Some(50), None)), 250);
        assert_eq!(transfer.effective_size(&part(None, None)), 300);
        // explicit size wins over pos
        assert_eq!(transfer.effective_size(&part(Some(50), Some(100))), 100);
        // pos of zero falls through to the whole file
        assert_eq!(transfer.effective_size(&part(Some(0), None)), 300);
    }

    fn full_multipart_actions() -> ObjectActions {
        actions_from(
            r#"{
                "transfer": "multipart-basic",
                "objects": [{
                    "oid": "x", "size": 701,
                    "actions": {
                        "init": {"href": "https://storage.example.com/init"},
                        "parts": [
                            {"href": "https://storage.example.com/part/0", "pos": 0}
                        ],
                        "commit": {"href": "https://storage.example.com/commit"},
                        "verify": {"href": "https://lfs.example.com/verify"}
                    }
                }]
            }"#,
        )
    }

    #[test]
    fn test_full_sequence_in_order() {
        let content = vec![42u8; 701];
        let transport = MockTransport::replying_ok();
        let actions = full_multipart_actions();

        let mut events: Vec<Progress> = Vec::new();
        let mut sink = |p: Progress| events.push(p);

        MultipartTransfer::new(&transport, &actions, &content[..], Some(&mut sink))
            .upload()
            .unwrap();

        let requests = transport.requests.borrow();
        let calls: Vec<(&str, &str)> = requests
            .iter()
            .map(|r| (r.method.as_str(), r.url.as_str()))
            .collect();
        assert_eq!(
            calls,
            vec![
                ("POST", "https://storage.example.com/init"),
                ("PUT", "https://storage.example.com/part/0"),
                ("POST", "https://storage.example.com/commit"),
                ("POST", "https://lfs.example.com/verify"),
            ]
        );

        // The one part carries the whole file
        assert_eq!(requests[1].body.as_deref(), Some(&content[..]));

        // Verify body hashes the same content that was uploaded
        let verify: serde_json::Value =
            serde_json::from_slice(requests[3].body.as_deref().unwrap()).unwrap();
        assert_eq!(verify["oid"], Oid::from_content(&content).to_hex());
        assert_eq!(verify["size"], 701);

        // Aggregate progress reaches loaded == total == 701, monotonically
        assert_eq!(
            events.last(),
            Some(&Progress {
                loaded: 701,
                total: 701
            })
        );
        assert!(events.windows(2).all(|w| w[0].loaded <= w[1].loaded));
        assert!(events.iter().all(|p| p.loaded <= p.total));
    }

    #[test]
    fn test_parts_only_no_optional_steps() {
        let content = vec![7u8; 64];
        let actions = actions_from(
            r#"{
                "objects": [{
                    "oid": "x", "size": 64,
                    "actions": {
                        "parts": [
                            {"href": "https://storage.example.com/part/0", "size": 32},
                            {"href": "https://storage.example.com/part/1", "pos": 32}
                        ]
                    }
                }]
            }"#,
        );
        let transport = MockTransport::replying_ok();

        adapter(&transport, &actions, &content).upload().unwrap();

        let requests = transport.requests.borrow();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body.as_deref(), Some(&content[..32]));
        assert_eq!(requests[1].body.as_deref(), Some(&content[32..]));
    }

    #[test]
    fn test_part_failure_aborts_loop() {
        let content = vec![1u8; 300];
        let actions = actions_from(
            r#"{
                "objects": [{
                    "oid": "x", "size": 300,
                    "actions": {
                        "parts": [
                            {"href": "https://storage.example.com/part/0", "pos": 0, "size": 100},
                            {"href": "https://storage.example.com/part/1", "pos": 100, "size": 100},
                            {"href": "https://storage.example.com/part/2", "pos": 200, "size": 100}
                        ],
                        "commit": {"href": "https://storage.example.com/commit"}
                    }
                }]
            }"#,
        );
        let transport = MockTransport::new(vec![
            MockTransport::response(200, ""),
            MockTransport::response(500, ""),
        ]);

        let err = adapter(&transport, &actions, &content).upload().unwrap_err();

        match err {
            Error::Transfer {
                stage: Stage::Part(1),
                status: 500,
                message: None,
            } => {}
            other => panic!("unexpected error: {other:?}"),
        }
        // part 3 and commit were never requested
        assert_eq!(transport.request_count(), 2);
    }

    #[test]
    fn test_init_failure_stops_everything() {
        let content = vec![1u8; 10];
        let actions = full_multipart_actions();
        let transport = MockTransport::new(vec![MockTransport::response(503, "")]);

        let err = adapter(&transport, &actions, &content).upload().unwrap_err();

        match err {
            Error::Transfer {
                stage: Stage::Init,
                status: 503,
                ..
            } => {}
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn test_resumed_upload_progress_baseline() {
        // 300-byte file, server already holds the first 100 bytes and lists
        // only the missing tail as a part.
        let content = vec![5u8; 300];
        let actions = actions_from(
            r#"{
                "objects": [{
                    "oid": "x", "size": 300,
                    "actions": {
                        "parts": [
                            {"href": "https://storage.example.com/part/tail", "pos": 100}
                        ]
                    }
                }]
            }"#,
        );
        let transport = MockTransport::replying_ok();

        let mut events: Vec<Progress> = Vec::new();
        let mut sink = |p: Progress| events.push(p);
        MultipartTransfer::new(&transport, &actions, &content[..], Some(&mut sink))
            .upload()
            .unwrap();

        assert!(events.iter().all(|p| p.loaded >= 100));
        assert_eq!(
            events.last(),
            Some(&Progress {
                loaded: 300,
                total: 300
            })
        );
    }

    #[test]
    fn test_want_digest_sha256_header() {
        let content = vec![9u8; 50];
        let actions = actions_from(
            r#"{
                "objects": [{
                    "oid": "x", "size": 50,
                    "actions": {
                        "parts": [
                            {"href": "https://storage.example.com/part/0", "want_digest": "sha-256"}
                        ]
                    }
                }]
            }"#,
        );
        let transport = MockTransport::replying_ok();

        adapter(&transport, &actions, &content).upload().unwrap();

        let requests = transport.requests.borrow();
        let expected = format!("sha-256={}", BASE64.encode(Sha256::digest(&content)));
        assert_eq!(requests[0].header("Digest"), Some(expected.as_str()));
    }

    #[test]
    fn test_unsupported_want_digest_is_soft() {
        let content = vec![9u8; 50];
        let actions = actions_from(
            r#"{
                "objects": [{
                    "oid": "x", "size": 50,
                    "actions": {
                        "parts": [
                            {"href": "https://storage.example.com/part/0", "want_digest": "contentMD5"}
                        ]
                    }
                }]
            }"#,
        );
        let transport = MockTransport::replying_ok();

        adapter(&transport, &actions, &content).upload().unwrap();

        let requests = transport.requests.borrow();
        assert_eq!(requests[0].header("Digest"), None);
    }

    #[test]
    fn test_want_digest_with_quality_list() {
        let header = content_digest_header("contentMD5;q=0.3, sha-256;q=1.0", b"abc").unwrap();
        assert_eq!(header.0, "Digest");
        assert!(header.1.starts_with("sha-256="));

        assert!(content_digest_header("contentMD5", b"abc").is_none());
        assert!(content_digest_header("sha-512", b"abc").is_none());
    }

    #[test]
    fn test_init_and_part_method_overrides() {
        let content = vec![2u8; 8];
        let actions = actions_from(
            r#"{
                "objects": [{
                    "oid": "x", "size": 8,
                    "actions": {
                        "init": {
                            "href": "https://storage.example.com/init",
                            "method": "PUT",
                            "body": "{\"uploadId\":\"42\"}"
                        },
                        "parts": [
                            {"href": "https://storage.example.com/part/0", "method": "POST"}
                        ]
                    }
                }]
            }"#,
        );
        let transport = MockTransport::replying_ok();

        adapter(&transport, &actions, &content).upload().unwrap();

        let requests = transport.requests.borrow();
        assert_eq!(requests[0].method, "PUT");
        assert_eq!(requests[0].body.as_deref(), Some(&b"{\"uploadId\":\"42\"}"[..]));
        assert_eq!(requests[1].method, "POST");
    }
}
