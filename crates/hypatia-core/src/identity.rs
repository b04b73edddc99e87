//! Caller identity.
//!
//! A [`ClientIdentity`] describes who is calling a web service. Hypatia does
//! not authenticate callers itself; an application-supplied identifier builds
//! the identity and the request pipeline consults its flags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const ANONYMOUS_LOG_ID: &str = "-";

/// Information about the caller of a web service.
///
/// `authenticated` and `anonymous` are tracked independently: an identity may
/// be neither (credentials were presented but not yet verified).
///
/// # Example
///
/// ```
/// use hypatia_core::ClientIdentity;
///
/// let identity = ClientIdentity::authenticated("user-42");
/// assert!(identity.is_authenticated());
/// assert!(!identity.is_anonymous());
/// assert_eq!(identity.loggable_user_id(), "user-42");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientIdentity {
    authenticated: bool,
    anonymous: bool,
    loggable_user_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, serde_json::Value>,
}

impl ClientIdentity {
    /// Creates an authenticated, non-anonymous identity.
    #[must_use]
    pub fn authenticated(loggable_user_id: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            anonymous: false,
            loggable_user_id: loggable_user_id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Creates an anonymous, unauthenticated identity.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            anonymous: true,
            loggable_user_id: ANONYMOUS_LOG_ID.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    /// Returns `true` if the caller's credentials were verified.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Sets the authenticated flag.
    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    /// Returns `true` if the caller did not identify themselves.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// Sets the anonymous flag.
    pub fn set_anonymous(&mut self, anonymous: bool) {
        self.anonymous = anonymous;
    }

    /// Returns an identifier that is safe to write to logs.
    #[must_use]
    pub fn loggable_user_id(&self) -> &str {
        &self.loggable_user_id
    }

    /// Sets the loggable identifier.
    pub fn set_loggable_user_id(&mut self, id: impl Into<String>) {
        self.loggable_user_id = id.into();
    }

    /// Returns an application-defined attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// Stores an application-defined attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
    }

    /// Returns a copy of this identity with the attribute set.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.set_attribute(key, value);
        self
    }
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticated_identity() {
        let identity = ClientIdentity::authenticated("u1");
        assert!(identity.is_authenticated());
        assert!(!identity.is_anonymous());
        assert_eq!(identity.loggable_user_id(), "u1");
    }

    #[test]
    fn test_anonymous_identity() {
        let identity = ClientIdentity::anonymous();
        assert!(identity.is_anonymous());
        assert!(!identity.is_authenticated());
        assert_eq!(identity.loggable_user_id(), "-");
    }

    #[test]
    fn test_anonymous_flag_is_independent_of_authenticated_flag() {
        let mut identity = ClientIdentity::anonymous();
        identity.set_authenticated(true);
        assert!(identity.is_anonymous());

        identity.set_anonymous(false);
        identity.set_authenticated(false);
        assert!(!identity.is_anonymous());
        assert!(!identity.is_authenticated());
    }

    #[test]
    fn test_attributes() {
        let identity = ClientIdentity::authenticated("u1")
            .with_attribute("roles", serde_json::json!(["admin"]));
        assert_eq!(identity.attribute("roles"), Some(&serde_json::json!(["admin"])));
        assert!(identity.attribute("missing").is_none());
    }

    #[test]
    fn test_default_is_anonymous() {
        assert_eq!(ClientIdentity::default(), ClientIdentity::anonymous());
    }
}
