//! The "basic" transfer adapter: one PUT, then an optional verify.

use crate::batch::{Action, ObjectActions};
use crate::error::Stage;
use crate::progress::{Progress, ProgressSink};
use crate::source::FileSource;
use crate::transport::{HttpRequest, HttpTransport};
use crate::{Error, Result};

use super::{merge_headers, verify_object};

/// Drives a single-PUT upload as negotiated by the server.
///
/// Either action may be absent: a missing `upload` means nothing to send, a
/// missing `verify` means the server does not want a confirmation call.
/// Neither is an error.
pub struct BasicTransfer<'a, 'p> {
    transport: &'a dyn HttpTransport,
    actions: &'a ObjectActions,
    file: &'a dyn FileSource,
    sink: Option<&'p mut dyn ProgressSink>,
}

impl<'a, 'p> BasicTransfer<'a, 'p> {
    pub fn new(
        transport: &'a dyn HttpTransport,
        actions: &'a ObjectActions,
        file: &'a dyn FileSource,
        sink: Option<&'p mut dyn ProgressSink>,
    ) -> Self {
        BasicTransfer {
            transport,
            actions,
            file,
            sink,
        }
    }

    /// Run the transfer to completion.
    pub fn upload(mut self) -> Result<()> {
        let actions = self.actions;

        if let Some(action) = &actions.upload {
            self.put_object(action)?;
        }

        if let Some(action) = &actions.verify {
            verify_object(self.transport, action, self.file)?;
        }

        Ok(())
    }

    fn put_object(&mut self, action: &Action) -> Result<()> {
        let body = self.file.read_range(0, None)?;
        let content_type = self
            .file
            .content_type()
            .unwrap_or("application/octet-stream");
        let headers = merge_headers(&[("Content-Type", content_type)], &action.header);
        let method = action.method.as_deref().unwrap_or("PUT");

        let total = self.file.size();
        let sink = &mut self.sink;
        let mut hook = |sent: u64| {
            if let Some(sink) = sink.as_deref_mut() {
                sink.report(Progress {
                    loaded: sent,
                    total,
                });
            }
        };

        let response = self.transport.execute(HttpRequest {
            method,
            url: &action.href,
            headers,
            body: Some(&body),
            progress: Some(&mut hook),
        })?;

        if !response.is_success() {
            return Err(Error::Transfer {
                stage: Stage::Upload,
                status: response.status,
                message: response.message(),
            });
        }
        Ok(())
    }
}
