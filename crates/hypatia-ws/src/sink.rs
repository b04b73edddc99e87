//! In-memory HTTP output sink.

use bytes::{Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

/// The HTTP output for one request.
///
/// Collects the status, headers and body written by a response writer and
/// records whether anything has been sent. Once the status or any body bytes
/// have been written the response is committed: [`data_sent`](Self::data_sent)
/// returns `true` and writers must not write again.
#[derive(Debug, Default)]
pub struct HttpResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    data_sent: bool,
}

impl HttpResponseWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the status or body has been written.
    #[must_use]
    pub const fn data_sent(&self) -> bool {
        self.data_sent
    }

    /// Returns the written status, if any.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Returns the headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the body written so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Adds a header, replacing any existing value with the same name.
    ///
    /// Returns `false` and leaves the headers unchanged if the name or value
    /// is not a valid HTTP header.
    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
                true
            }
            _ => false,
        }
    }

    /// Writes the status line. Only the first status written is kept.
    pub fn write_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
        self.data_sent = true;
    }

    /// Appends to the body, committing a `200 OK` status if none was written.
    pub fn write(&mut self, data: &[u8]) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(data);
        self.data_sent = true;
    }

    /// Converts the written output into an `http` response.
    #[must_use]
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}
