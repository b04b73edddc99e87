//! The framework's view of an incoming request.

use bytes::Bytes;
use hypatia_core::{ClientIdentity, WsFrameworkError, WsParams};
use http::{HeaderMap, Method, Uri};

/// The method, URI and headers of a request.
#[derive(Debug, Clone, Default)]
pub struct RequestHead {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl RequestHead {
    /// Creates a request head.
    #[must_use]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the URI path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns the request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// An incoming web service request.
///
/// Application logic sees the request through this type rather than the raw
/// HTTP request. `B` is the type the request body is unmarshalled into; the
/// body is `None` unless the logic supplied an unmarshal target.
#[derive(Debug)]
pub struct WsRequest<B> {
    head: RequestHead,
    raw_body: Bytes,
    body: Option<B>,
    path_params: WsParams,
    query_params: WsParams,
    identity: ClientIdentity,
    framework_errors: Vec<WsFrameworkError>,
}

impl<B> WsRequest<B> {
    /// Creates a request with no body target and an anonymous identity.
    #[must_use]
    pub fn new(head: RequestHead, raw_body: Bytes) -> Self {
        Self {
            head,
            raw_body,
            body: None,
            path_params: WsParams::default(),
            query_params: WsParams::default(),
            identity: ClientIdentity::default(),
            framework_errors: Vec::new(),
        }
    }

    /// Returns the method, URI and headers.
    #[must_use]
    pub const fn head(&self) -> &RequestHead {
        &self.head
    }

    /// Returns the unparsed request body.
    #[must_use]
    pub const fn raw_body(&self) -> &Bytes {
        &self.raw_body
    }

    /// Returns the unmarshalled body.
    #[must_use]
    pub const fn body(&self) -> Option<&B> {
        self.body.as_ref()
    }

    /// Returns the unmarshalled body mutably.
    pub fn body_mut(&mut self) -> Option<&mut B> {
        self.body.as_mut()
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: B) {
        self.body = Some(body);
    }

    /// Removes and returns the body.
    pub fn take_body(&mut self) -> Option<B> {
        self.body.take()
    }

    /// Returns the values captured from the request path.
    #[must_use]
    pub const fn path_params(&self) -> &WsParams {
        &self.path_params
    }

    /// Sets the values captured from the request path.
    pub fn set_path_params(&mut self, params: WsParams) {
        self.path_params = params;
    }

    /// Returns the query parameters.
    #[must_use]
    pub const fn query_params(&self) -> &WsParams {
        &self.query_params
    }

    /// Sets the query parameters.
    pub fn set_query_params(&mut self, params: WsParams) {
        self.query_params = params;
    }

    /// Returns the caller's identity.
    #[must_use]
    pub const fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Sets the caller's identity.
    pub fn set_identity(&mut self, identity: ClientIdentity) {
        self.identity = identity;
    }

    /// Returns the framework errors recorded so far.
    #[must_use]
    pub fn framework_errors(&self) -> &[WsFrameworkError] {
        &self.framework_errors
    }

    /// Returns `true` if any framework error has been recorded.
    #[must_use]
    pub fn has_framework_errors(&self) -> bool {
        !self.framework_errors.is_empty()
    }

    /// Records a framework error.
    pub fn add_framework_error(&mut self, error: WsFrameworkError) {
        self.framework_errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_has_no_body() {
        let head = RequestHead::new(
            Method::GET,
            Uri::from_static("/albums/7?format=full"),
            HeaderMap::new(),
        );
        let request: WsRequest<String> = WsRequest::new(head, Bytes::new());

        assert_eq!(request.head().path(), "/albums/7");
        assert!(request.body().is_none());
        assert!(!request.has_framework_errors());
        assert!(!request.identity().is_authenticated());
    }

    #[test]
    fn test_body_accessors() {
        let mut request: WsRequest<Vec<u8>> =
            WsRequest::new(RequestHead::default(), Bytes::from_static(b"[1]"));
        request.set_body(vec![1]);
        request.body_mut().unwrap().push(2);
        assert_eq!(request.take_body(), Some(vec![1, 2]));
        assert!(request.body().is_none());
        assert_eq!(request.raw_body().as_ref(), b"[1]");
    }
}
