//! Caller identification and access control.

use crate::request::RequestHead;
use hypatia_core::{ClientIdentity, RequestContext};

/// Identifies the caller of a web service.
///
/// Runs before any other phase.
pub trait Identifier: Send + Sync {
    /// Returns the caller's identity, anonymous if the caller is unknown.
    fn identify(&self, ctx: &RequestContext, request: &RequestHead) -> ClientIdentity;
}

/// Decides whether an identified caller may use a web service.
///
/// Runs after identification. A denied request is answered with HTTP 403.
pub trait AccessChecker: Send + Sync {
    /// Returns `true` if `identity` may make `request`.
    fn allowed(&self, ctx: &RequestContext, request: &RequestHead, identity: &ClientIdentity) -> bool;
}
