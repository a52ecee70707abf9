//! HTTP transport seam.
//!
//! The batch client and transfer adapters never talk to `ureq` directly;
//! they issue [`HttpRequest`]s through the [`HttpTransport`] trait. The
//! production implementation is [`UreqTransport`]; tests substitute a
//! recording mock behind the same trait.
//!
//! A transport returns the response for every status code it receives -
//! callers apply their own success policy (transfer stages accept any 2xx,
//! verify requires exactly 200). Only failures without a status code, such
//! as connection errors, surface as [`Error::Http`].

use std::io::{self, Read};

use crate::{Error, Result};

/// One HTTP call, fully described by server-issued action descriptors.
pub struct HttpRequest<'a> {
    /// HTTP verb, e.g. `PUT`.
    pub method: &'a str,
    pub url: &'a str,
    /// Header name/value pairs, already merged in override order.
    pub headers: Vec<(String, String)>,
    pub body: Option<&'a [u8]>,
    /// Invoked with the cumulative number of body bytes handed to the wire.
    pub progress: Option<&'a mut dyn FnMut(u64)>,
}

/// Status and body of a completed HTTP call.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is in the [200, 300) success range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The server-supplied `message` field, when the body is JSON carrying one.
    pub fn message(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(&self.body).ok()?;
        value.get("message")?.as_str().map(str::to_string)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Performs HTTP requests on behalf of the client and adapters.
pub trait HttpTransport {
    fn execute(&self, request: HttpRequest<'_>) -> Result<HttpResponse>;
}

/// Production transport backed by a shared `ureq` agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        UreqTransport {
            agent: ureq::Agent::new(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for UreqTransport {
    fn execute(&self, request: HttpRequest<'_>) -> Result<HttpResponse> {
        let mut req = self.agent.request(request.method, request.url);
        for (name, value) in &request.headers {
            req = req.set(name, value);
        }

        let result = match request.body {
            Some(body) => {
                req = req.set("Content-Length", &body.len().to_string());
                match request.progress {
                    Some(callback) => req.send(ProgressReader::new(body, callback)),
                    None => req.send_bytes(body),
                }
            }
            None => req.call(),
        };

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(other) => return Err(Error::Http(other.to_string())),
        };

        let status = response.status();
        let mut body = Vec::new();
        response.into_reader().read_to_end(&mut body)?;
        Ok(HttpResponse { status, body })
    }
}

/// Reports cumulative bytes consumed by the HTTP stack while it streams the
/// request body.
struct ProgressReader<'a> {
    body: &'a [u8],
    sent: u64,
    callback: &'a mut dyn FnMut(u64),
}

impl<'a> ProgressReader<'a> {
    fn new(body: &'a [u8], callback: &'a mut dyn FnMut(u64)) -> Self {
        ProgressReader {
            body,
            sent: 0,
            callback,
        }
    }
}

impl Read for ProgressReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.body.read(buf)?;
        if n > 0 {
            self.sent += n as u64;
            (self.callback)(self.sent);
        }
        Ok(n)
    }
}
