use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// 401/403 from the backend, or no session token at all
    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} is not supported by this source")]
    Unsupported(&'static str),
}

impl SourceError {
    pub fn decode(endpoint: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SourceError::Decode {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, SourceError::Unauthorized(_))
    }

    /// Failures worth retrying at the next sync trigger
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Network(_) => true,
            SourceError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            let endpoint = e.url().map(|u| u.path().to_string()).unwrap_or_default();
            SourceError::decode(endpoint, e)
        } else {
            SourceError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(SourceError::Unauthorized("expired".into()).is_auth());
        assert!(SourceError::Network("connection refused".into()).is_transient());
        let throttled = SourceError::Status {
            endpoint: "/movie/popular".into(),
            status: 429,
            body: String::new(),
        };
        assert!(throttled.is_transient());
        let missing = SourceError::Status {
            endpoint: "/movie/1".into(),
            status: 404,
            body: String::new(),
        };
        assert!(!missing.is_transient());
        assert!(!missing.is_auth());
    }
}
