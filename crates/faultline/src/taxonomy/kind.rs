//! The nine canonical fault kinds.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Canonical fault kind.
///
/// Every captured failure is tagged with exactly one kind, either because it
/// was raised as a typed [`AppFault`](super::AppFault) or because the
/// classifier assigned one. Each kind has a fixed HTTP status and a fixed
/// machine code used in rules, stats, and wire payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// Malformed or rejected input (400).
    #[serde(rename = "ValidationError")]
    Validation,
    /// Missing or invalid credentials (401).
    #[serde(rename = "AuthenticationError")]
    Authentication,
    /// Authenticated but not permitted (403).
    #[serde(rename = "AuthorizationError")]
    Authorization,
    /// Requested resource does not exist (404).
    #[serde(rename = "NotFoundError")]
    NotFound,
    /// State conflict, e.g. duplicate creation (409).
    #[serde(rename = "ConflictError")]
    Conflict,
    /// Caller exceeded a rate limit (429).
    #[serde(rename = "RateLimitError")]
    RateLimit,
    /// Database failure (500).
    #[serde(rename = "DatabaseError")]
    Database,
    /// Upstream/external service failure (502).
    #[serde(rename = "ExternalServiceError")]
    ExternalService,
    /// Anything else (500).
    #[serde(rename = "InternalError")]
    Internal,
}

impl FaultKind {
    /// All nine kinds, in precedence order.
    pub const ALL: [Self; 9] = [
        Self::Validation,
        Self::Authentication,
        Self::Authorization,
        Self::NotFound,
        Self::Conflict,
        Self::RateLimit,
        Self::Database,
        Self::ExternalService,
        Self::Internal,
    ];

    /// The business subset: kinds that application layers may raise, i.e.
    /// everything except the infrastructure kinds.
    pub const BUSINESS: [Self; 6] = [
        Self::Validation,
        Self::Authentication,
        Self::Authorization,
        Self::NotFound,
        Self::Conflict,
        Self::RateLimit,
    ];

    /// HTTP status fixed per kind.
    #[must_use]
    pub const fn http_status(self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            Self::Database | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ExternalService => StatusCode::BAD_GATEWAY,
        }
    }

    /// Machine code for this kind, used in rules, stats, and payloads.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::Authentication => "AuthenticationError",
            Self::Authorization => "AuthorizationError",
            Self::NotFound => "NotFoundError",
            Self::Conflict => "ConflictError",
            Self::RateLimit => "RateLimitError",
            Self::Database => "DatabaseError",
            Self::ExternalService => "ExternalServiceError",
            Self::Internal => "InternalError",
        }
    }

    /// Whether this kind signals an infrastructure failure.
    ///
    /// Infrastructure kinds are recorded at critical severity and feed the
    /// critical alert threshold.
    #[must_use]
    pub const fn is_infrastructure(self) -> bool {
        matches!(self, Self::Database | Self::ExternalService | Self::Internal)
    }

    /// Parse a machine code back into a kind.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_fixed() {
        assert_eq!(FaultKind::Validation.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            FaultKind::Authentication.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(FaultKind::Authorization.http_status(), StatusCode::FORBIDDEN);
        assert_eq!(FaultKind::NotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(FaultKind::Conflict.http_status(), StatusCode::CONFLICT);
        assert_eq!(
            FaultKind::RateLimit.http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            FaultKind::Database.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            FaultKind::ExternalService.http_status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            FaultKind::Internal.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn code_roundtrip() {
        for kind in FaultKind::ALL {
            assert_eq!(FaultKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(FaultKind::from_code("NoSuchError"), None);
    }

    #[test]
    fn infrastructure_set() {
        assert!(FaultKind::Database.is_infrastructure());
        assert!(FaultKind::ExternalService.is_infrastructure());
        assert!(FaultKind::Internal.is_infrastructure());
        for kind in FaultKind::BUSINESS {
            assert!(!kind.is_infrastructure());
        }
    }

    #[test]
    fn serde_uses_machine_codes() {
        let json = serde_json::to_string(&FaultKind::ExternalService).unwrap();
        assert_eq!(json, "\"ExternalServiceError\"");
        let kind: FaultKind = serde_json::from_str("\"RateLimitError\"").unwrap();
        assert_eq!(kind, FaultKind::RateLimit);
    }
}
