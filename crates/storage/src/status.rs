//! HTTP status classification.
//!
//! Both the provider and the object store report failures as HTTP status
//! codes. `classify_status` maps a code onto a closed set of kinds so callers
//! can match on them instead of comparing integers.

use std::fmt;

/// Classified failure status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// 400
    BadRequest,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 500
    InternalError,
    /// 502
    BadGateway,
    /// 503
    ServiceUnavailable,
    /// Any other status.
    Unhandled(u16),
}

/// Classify a status code.
///
/// # Arguments
/// * `code` - HTTP status code
pub fn classify_status(code: u16) -> StatusKind {
    match code {
        400 => StatusKind::BadRequest,
        403 => StatusKind::Forbidden,
        404 => StatusKind::NotFound,
        500 => StatusKind::InternalError,
        502 => StatusKind::BadGateway,
        503 => StatusKind::ServiceUnavailable,
        other => StatusKind::Unhandled(other),
    }
}

impl StatusKind {
    /// Operator hint for a provider response with this status.
    pub fn provider_hint(&self) -> &'static str {
        match self {
            StatusKind::BadRequest => "Bad request. Check if file urls are correct",
            StatusKind::NotFound => "Requested file not found",
            StatusKind::Forbidden => "Authorization error. Check if the file url expired",
            StatusKind::InternalError => "Internal error on the provider api",
            StatusKind::BadGateway => "Bad gateway",
            StatusKind::ServiceUnavailable => {
                "Service unavailable. Check if the provider api is correct and active"
            }
            StatusKind::Unhandled(_) => {
                "Status not 200. Unhandled error. Refer to the status code to debug"
            }
        }
    }

    /// Operator hint for an object store existence check that failed with this status.
    pub fn store_hint(&self) -> &'static str {
        match self {
            StatusKind::Forbidden => "Possible S3 authorization failure. Check permissions",
            StatusKind::BadRequest => {
                "Possible bad request or S3 params failure. Check if multipart uploads or transfer acceleration is enabled"
            }
            _ => "Possible internal server error. Refer to the status code",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::BadRequest => f.write_str("bad request"),
            StatusKind::Forbidden => f.write_str("forbidden"),
            StatusKind::NotFound => f.write_str("not found"),
            StatusKind::InternalError => f.write_str("internal error"),
            StatusKind::BadGateway => f.write_str("bad gateway"),
            StatusKind::ServiceUnavailable => f.write_str("service unavailable"),
            StatusKind::Unhandled(code) => write!(f, "unhandled status {}", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_codes() {
        assert_eq!(classify_status(400), StatusKind::BadRequest);
        assert_eq!(classify_status(403), StatusKind::Forbidden);
        assert_eq!(classify_status(404), StatusKind::NotFound);
        assert_eq!(classify_status(500), StatusKind::InternalError);
        assert_eq!(classify_status(502), StatusKind::BadGateway);
        assert_eq!(classify_status(503), StatusKind::ServiceUnavailable);
    }

    #[test]
    fn test_classify_default_arm() {
        assert_eq!(classify_status(401), StatusKind::Unhandled(401));
        assert_eq!(classify_status(504), StatusKind::Unhandled(504));
        // Only exactly 200 counts as success upstream; other 2xx fall through here.
        assert_eq!(classify_status(204), StatusKind::Unhandled(204));
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusKind::Forbidden.to_string(), "forbidden");
        assert_eq!(StatusKind::Unhandled(418).to_string(), "unhandled status 418");
    }

    #[test]
    fn test_hints_are_distinct_for_provider_kinds() {
        let kinds: [StatusKind; 6] = [
            StatusKind::BadRequest,
            StatusKind::Forbidden,
            StatusKind::NotFound,
            StatusKind::InternalError,
            StatusKind::BadGateway,
            StatusKind::ServiceUnavailable,
        ];
        let hints: std::collections::HashSet<&str> =
            kinds.iter().map(|k| k.provider_hint()).collect();
        assert_eq!(hints.len(), kinds.len());
    }
}
