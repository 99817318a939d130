use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Jira,
    Tempo,
    Unit4,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Jira => write!(f, "Jira"),
            Service::Tempo => write!(f, "Tempo"),
            Service::Unit4 => write!(f, "Unit4"),
        }
    }
}

/// REST failures, each worded so the operator knows what to fix.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}: Authentication failed. Check your API token!")]
    Unauthorized(Service),

    #[error("{0}: Access denied. Check your permissions or API token!")]
    Forbidden(Service),

    #[error("{0}: Resource not found. Check the URL in config.json!")]
    NotFound(Service),

    #[error("{0}: Too many requests. Wait a moment and try again.")]
    RateLimited(Service),

    #[error("{service}: Server error (HTTP {status}). The service may be temporarily unavailable.")]
    Server { service: Service, status: u16 },

    #[error("{service}: Cannot connect to {url}. Check your network or VPN!")]
    Connect { service: Service, url: String },

    #[error("{0}: Connection timed out. The server may be slow.")]
    Timeout(Service),

    #[error("{service}: HTTP {status} - {reason}")]
    Status {
        service: Service,
        status: u16,
        reason: String,
    },

    #[error("{service}: Unexpected response: {message}")]
    Decode { service: Service, message: String },
}

impl ApiError {
    /// Classify a non-success status.
    pub fn from_status(service: Service, status: StatusCode) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized(service),
            403 => ApiError::Forbidden(service),
            404 => ApiError::NotFound(service),
            429 => ApiError::RateLimited(service),
            code if status.is_server_error() => ApiError::Server {
                service,
                status: code,
            },
            code => ApiError::Status {
                service,
                status: code,
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            },
        }
    }

    /// Classify a transport failure from reqwest.
    pub fn from_transport(service: Service, url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(service)
        } else if err.is_connect() {
            ApiError::Connect {
                service,
                url: url.to_string(),
            }
        } else if err.is_decode() {
            ApiError::Decode {
                service,
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            ApiError::from_status(service, status)
        } else {
            ApiError::Connect {
                service,
                url: url.to_string(),
            }
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Forbidden(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::RateLimited(_) => Some(429),
            ApiError::Server { status, .. } | ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn service(&self) -> Service {
        match self {
            ApiError::Unauthorized(s)
            | ApiError::Forbidden(s)
            | ApiError::NotFound(s)
            | ApiError::RateLimited(s)
            | ApiError::Timeout(s) => *s,
            ApiError::Server { service, .. }
            | ApiError::Connect { service, .. }
            | ApiError::Status { service, .. }
            | ApiError::Decode { service, .. } => *service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ApiError::from_status(Service::Jira, StatusCode::UNAUTHORIZED),
            ApiError::Unauthorized(Service::Jira)
        ));
        assert!(matches!(
            ApiError::from_status(Service::Tempo, StatusCode::TOO_MANY_REQUESTS),
            ApiError::RateLimited(Service::Tempo)
        ));
        assert!(matches!(
            ApiError::from_status(Service::Tempo, StatusCode::BAD_GATEWAY),
            ApiError::Server { status: 502, .. }
        ));
        let other = ApiError::from_status(Service::Jira, StatusCode::IM_A_TEAPOT);
        assert_eq!(other.status_code(), Some(418));
        assert_eq!(other.to_string(), "Jira: HTTP 418 - I'm a teapot");
    }

    #[test]
    fn test_messages_name_the_service() {
        let err = ApiError::from_status(Service::Tempo, StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Tempo: Authentication failed. Check your API token!");
        assert_eq!(err.service(), Service::Tempo);
    }
}
