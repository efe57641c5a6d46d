use stock_core::{ErrorCode, StockError};
use thiserror::Error;

/// Errors surfaced to the user by the client façade.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("the API URL is not configured")]
    NotConfigured,

    #[error("Request failed: {message}")]
    RequestFailed { message: String },

    #[error("network error: {status} - {body}")]
    Http { status: u16, body: String },

    #[error("Parse error: {message}")]
    Decode { message: String },

    #[error("backend error: {message}")]
    Backend {
        code: Option<ErrorCode>,
        message: String,
    },

    #[error("could not encode request: {0}")]
    Encode(String),
}

impl ClientError {
    /// Whether the store was busy and the user may retry by hand.
    pub fn is_contention(&self) -> bool {
        match self {
            ClientError::Backend { code, .. } => *code == Some(ErrorCode::Timeout),
            ClientError::Http { status, .. } => *status == 503,
            _ => false,
        }
    }
}

impl From<StockError> for ClientError {
    fn from(e: StockError) -> Self {
        ClientError::Encode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contention_detection() {
        assert!(ClientError::Backend {
            code: Some(ErrorCode::Timeout),
            message: "busy".into()
        }
        .is_contention());
        assert!(ClientError::Http {
            status: 503,
            body: String::new()
        }
        .is_contention());
        assert!(!ClientError::Backend {
            code: Some(ErrorCode::Lookup),
            message: "not found".into()
        }
        .is_contention());
    }

    #[test]
    fn http_error_message() {
        let err = ClientError::Http {
            status: 500,
            body: "Internal Server Error".into(),
        };
        assert_eq!(err.to_string(), "network error: 500 - Internal Server Error");
    }
}
