use std::io::Error as IoError;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use skyprobe::ProbeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error("Invalid setting {name}: {reason}")]
    Setting { name: &'static str, reason: String },
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Probe(ProbeError::Configuration(_) | ProbeError::Unsupported { .. }) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Probe(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_probe_errors_map_to_statuses() {
        let invalid = AppError::from(ProbeError::config("no target specified"));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let timeout = AppError::from(ProbeError::Timeout(Duration::from_secs(3)));
        assert_eq!(timeout.status_code(), StatusCode::BAD_GATEWAY);
    }
}
