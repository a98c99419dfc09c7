use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - credentials rejected")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Closed set of outcomes that authentication callers are allowed to see.
///
/// The token validator and the login flow reduce every `ApiError` to one of
/// these before handing it upward; the session machine and route guard never
/// look at transport errors directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// The server answered and refused the token or credentials.
    CredentialRejected,
    /// No verdict from the server: connection failure, timeout, DNS, 5xx.
    NetworkUnavailable,
    /// The server answered with something we could not interpret.
    MalformedResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", cut, body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            400..=499 => ApiError::BadRequest(format!("Status {}: {}", status, truncated)),
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Whether the server explicitly refused the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::AccessDenied(_))
    }

    pub fn classify(&self) -> AuthFailure {
        match self {
            ApiError::Unauthorized
            | ApiError::AccessDenied(_)
            | ApiError::NotFound(_)
            | ApiError::BadRequest(_) => AuthFailure::CredentialRejected,
            ApiError::NetworkError(e) if e.is_decode() => {
                AuthFailure::MalformedResponse(e.to_string())
            }
            ApiError::NetworkError(_) | ApiError::ServerError(_) | ApiError::RateLimited => {
                AuthFailure::NetworkUnavailable
            }
            ApiError::InvalidResponse(msg) => AuthFailure::MalformedResponse(msg.clone()),
        }
    }

    /// `classify` for the token endpoint. A 404 there means the base URL is
    /// wrong, not that the password was.
    pub fn classify_login(&self) -> AuthFailure {
        match self {
            ApiError::NotFound(_) => AuthFailure::MalformedResponse(
                "login endpoint not found, check the API base URL".to_string(),
            ),
            other => other.classify(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_maps_auth_codes() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, "nope"),
            ApiError::AccessDenied(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, ""),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, ""),
            ApiError::BadRequest(_)
        ));
    }

    #[test]
    fn test_classify_rejection_vs_unavailable() {
        assert_eq!(ApiError::Unauthorized.classify(), AuthFailure::CredentialRejected);
        assert_eq!(
            ApiError::AccessDenied(String::new()).classify(),
            AuthFailure::CredentialRejected
        );
        assert_eq!(
            ApiError::ServerError(String::new()).classify(),
            AuthFailure::NetworkUnavailable
        );
        assert_eq!(ApiError::RateLimited.classify(), AuthFailure::NetworkUnavailable);
        assert_eq!(
            ApiError::InvalidResponse("missing token".into()).classify(),
            AuthFailure::MalformedResponse("missing token".into())
        );
    }

    #[test]
    fn test_classify_login_keeps_not_found_apart() {
        assert_eq!(
            ApiError::NotFound(String::new()).classify(),
            AuthFailure::CredentialRejected
        );
        assert!(matches!(
            ApiError::NotFound(String::new()).classify_login(),
            AuthFailure::MalformedResponse(_)
        ));
        assert_eq!(
            ApiError::Unauthorized.classify_login(),
            AuthFailure::CredentialRejected
        );
        assert_eq!(
            ApiError::BadRequest(String::new()).classify_login(),
            AuthFailure::CredentialRejected
        );
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated"));
        assert_eq!(ApiError::truncate_body("short"), "short");
    }
}
