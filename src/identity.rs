use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;

// Fingerprint a caller from network origin + client signature.
// Deterministic by design - the ledger needs the same key on every request.
// Not a security boundary: users behind one NAT with the same browser collide.
pub fn identify(origin: &str, client_signature: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(origin.as_bytes());
    hasher.update(b":");
    hasher.update(client_signature.as_bytes());
    format!("{:x}", hasher.finalize())
}

// Pull origin + signature out of the request.
// Prefer x-forwarded-for (first hop) so the fingerprint survives a reverse proxy.
pub fn from_request(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let origin = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    let signature = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    identify(&origin, signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn identify_is_deterministic() {
        let a = identify("203.0.113.9", "Mozilla/5.0");
        let b = identify("203.0.113.9", "Mozilla/5.0");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn signature_changes_identity() {
        let a = identify("203.0.113.9", "Mozilla/5.0");
        let b = identify("203.0.113.9", "curl/8.0");
        assert_ne!(a, b);
    }

    #[test]
    fn forwarded_for_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.7, 10.0.0.1"));
        headers.insert("user-agent", HeaderValue::from_static("Mozilla/5.0"));
        let peer = Some("127.0.0.1:9999".parse().unwrap());

        let id = from_request(&headers, peer);
        assert_eq!(id, identify("198.51.100.7", "Mozilla/5.0"));
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        let peer = Some("127.0.0.1:9999".parse().unwrap());
        assert_eq!(from_request(&headers, peer), identify("127.0.0.1", ""));
        assert_eq!(from_request(&headers, None), identify("unknown", ""));
    }
}
