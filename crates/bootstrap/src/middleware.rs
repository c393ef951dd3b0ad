//! `Host` header allowlist.
//!
//! Patterns are matched case-insensitively against the host part of the
//! header (port stripped). `*` accepts everything; a leading dot, as in
//! `.example.com`, accepts the domain and all of its subdomains.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::HOST,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;

/// Compiled allowlist.
#[derive(Debug, Clone)]
pub struct AllowedHosts {
    any: bool,
    patterns: Vec<String>,
}

impl AllowedHosts {
    /// Build from lowercase patterns; an empty list accepts nothing.
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            any: patterns.iter().any(|p| p == "*"),
            patterns,
        }
    }

    /// Whether a request with this `Host` header value may be served.
    pub fn permits(&self, host_header: Option<&str>) -> bool {
        if self.any {
            return true;
        }
        let Some(host) = host_header.map(split_host) else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        self.patterns.iter().any(|pattern| match pattern.strip_prefix('.') {
            Some(domain) => host == domain || host.ends_with(pattern.as_str()),
            None => host == *pattern,
        })
    }
}

/// Host part of a `Host` header value, without the port.
fn split_host(value: &str) -> &str {
    let value = value.trim();
    if value.starts_with('[') {
        // [::1]:9000
        return value.find(']').map_or(value, |end| &value[..=end]);
    }
    value.split(':').next().unwrap_or(value)
}

/// Reject requests whose `Host` is not in the allowlist with `400`.
pub async fn enforce_allowed_hosts(
    State(allowed): State<Arc<AllowedHosts>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok());

    if !allowed.permits(host) {
        tracing::warn!(host = host.unwrap_or("<missing>"), "Rejected request with disallowed Host");
        return Err(AppError::BadRequest(format!(
            "Invalid Host header: {}",
            host.unwrap_or("<missing>")
        )));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(patterns: &[&str]) -> AllowedHosts {
        AllowedHosts::new(patterns.iter().map(|p| p.to_string()).collect())
    }

    #[test]
    fn test_wildcard_accepts_anything() {
        let allowed = hosts(&["*"]);
        assert!(allowed.permits(Some("anything.test")));
        assert!(allowed.permits(None));
    }

    #[test]
    fn test_exact_match_ignores_port_and_case() {
        let allowed = hosts(&["api.example.com", "localhost"]);
        assert!(allowed.permits(Some("API.example.com:9000")));
        assert!(allowed.permits(Some("localhost")));
        assert!(!allowed.permits(Some("evil.com")));
        assert!(!allowed.permits(None));
    }

    #[test]
    fn test_subdomain_pattern() {
        let allowed = hosts(&[".example.com"]);
        assert!(allowed.permits(Some("example.com")));
        assert!(allowed.permits(Some("www.example.com")));
        assert!(!allowed.permits(Some("badexample.com")));
    }

    #[test]
    fn test_ipv6_literal() {
        let allowed = hosts(&["[::1]"]);
        assert!(allowed.permits(Some("[::1]:9000")));
    }

    #[test]
    fn test_empty_list_rejects_everything() {
        let allowed = hosts(&[]);
        assert!(!allowed.permits(Some("localhost")));
    }
}
