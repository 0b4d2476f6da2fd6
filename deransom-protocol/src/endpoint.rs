//! Push Endpoint Derivation
//!
//! The dashboard derives its push endpoint from the page it was served from:
//! secure pages upgrade to `wss`, plain pages to `ws`, host and port carry
//! over, and the feed lives at a fixed `/ws` path. This module provides the
//! same mapping for arbitrary base URLs.

use crate::{Result, SocketError};

/// Path of the server-push endpoint
pub const PUSH_PATH: &str = "/ws";

/// Derive the WebSocket endpoint from an HTTP(S) base URL
///
/// # Examples
///
/// ```
/// use deransom_protocol::websocket_url;
///
/// let url = websocket_url("https://deransom.example.com").unwrap();
/// assert_eq!(url, "wss://deransom.example.com/ws");
/// ```
///
/// # Errors
///
/// Returns [`SocketError::InvalidEndpoint`] for non-HTTP schemes or an empty
/// host.
pub fn websocket_url(base: &str) -> Result<String> {
    let trimmed = base.trim().trim_end_matches('/');

    let (scheme, rest) = if let Some(rest) = trimmed.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        ("ws", rest)
    } else {
        return Err(SocketError::InvalidEndpoint(format!(
            "expected an http:// or https:// base URL, got {:?}",
            base
        )));
    };

    if rest.is_empty() {
        return Err(SocketError::InvalidEndpoint(format!(
            "base URL {:?} has no host",
            base
        )));
    }

    Ok(format!("{}://{}{}", scheme, rest, PUSH_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_scheme_maps_to_ws() {
        assert_eq!(
            websocket_url("http://localhost:5000").unwrap(),
            "ws://localhost:5000/ws"
        );
    }

    #[test]
    fn test_secure_scheme_maps_to_wss() {
        assert_eq!(
            websocket_url("https://deransom.example.com").unwrap(),
            "wss://deransom.example.com/ws"
        );
    }

    #[test]
    fn test_port_is_preserved() {
        assert_eq!(
            websocket_url("https://10.0.0.7:8443").unwrap(),
            "wss://10.0.0.7:8443/ws"
        );
    }

    #[test]
    fn test_trailing_slash_is_tolerated() {
        assert_eq!(
            websocket_url("http://localhost:5000/").unwrap(),
            "ws://localhost:5000/ws"
        );
    }

    #[test]
    fn test_non_http_scheme_is_rejected() {
        assert!(matches!(
            websocket_url("ftp://example.com"),
            Err(SocketError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            websocket_url("example.com"),
            Err(SocketError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_empty_host_is_rejected() {
        assert!(matches!(
            websocket_url("http://"),
            Err(SocketError::InvalidEndpoint(_))
        ));
    }
}
