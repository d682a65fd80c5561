//! Transport target addressing.
//!
//! The server expects the participant's identity as a query parameter on the
//! WebSocket path: `scheme://host/ws?username=<percent-encoded identity>`.

use crate::connection::Identity;

/// A chat server endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    secure: bool,
}

impl Endpoint {
    /// Create an endpoint for `host` (e.g. `"chat.example.com"` or
    /// `"127.0.0.1:8080"`). `secure` selects `wss` over `ws`, matching how
    /// the hosting page was loaded.
    pub fn new(host: impl Into<String>, secure: bool) -> Self {
        Self { host: host.into(), secure }
    }

    /// Host this endpoint points at.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether the secure scheme is used.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Build the transport URL for one connection attempt.
    pub fn url_for(&self, identity: &Identity) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}/ws?username={}", self.host, percent_encode(identity.as_str()))
    }
}

/// Percent-encode a query parameter value.
///
/// Unreserved characters (RFC 3986 §2.3) pass through; everything else is
/// encoded byte-wise, UTF-8 included.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(byte));
            },
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_embeds_identity_as_query_parameter() {
        let endpoint = Endpoint::new("chat.example.com", false);
        let identity = Identity::new("alice").unwrap();
        assert_eq!(endpoint.url_for(&identity), "ws://chat.example.com/ws?username=alice");
    }

    #[test]
    fn secure_endpoint_uses_wss() {
        let endpoint = Endpoint::new("chat.example.com", true);
        let identity = Identity::new("alice").unwrap();
        assert!(endpoint.url_for(&identity).starts_with("wss://"));
    }

    #[test]
    fn identity_is_percent_encoded() {
        let endpoint = Endpoint::new("localhost:8080", false);
        let identity = Identity::new("bob smith & co").unwrap();
        assert_eq!(
            endpoint.url_for(&identity),
            "ws://localhost:8080/ws?username=bob%20smith%20%26%20co"
        );
    }

    #[test]
    fn multibyte_identity_encodes_per_byte() {
        let endpoint = Endpoint::new("localhost:8080", false);
        let identity = Identity::new("böb").unwrap();
        assert_eq!(endpoint.url_for(&identity), "ws://localhost:8080/ws?username=b%C3%B6b");
    }
}
