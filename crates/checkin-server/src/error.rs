use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::error;

use checkin_core::models::{scan::scan_timestamp, Participant};
use checkin_core::ScanError;

/// JSON body of every failed scan.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureBody {
    pub success: bool,
    pub message: String,
    pub scan_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<Participant>,
}

/// HTTP rendering of a `ScanError`.
#[derive(Debug)]
pub struct ScanFailure(pub ScanError);

impl From<ScanError> for ScanFailure {
    fn from(err: ScanError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ScanFailure {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            let cause = std::error::Error::source(&err)
                .map(|source| source.to_string())
                .unwrap_or_default();
            error!(error = %err, cause = %cause, "Scan failed");
        }

        let body = FailureBody {
            success: false,
            message: err.to_string(),
            scan_time: scan_timestamp(Utc::now()),
            participant: err.participant().cloned(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkin_core::StoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ScanError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ScanError::MissingQrCode, StatusCode::BAD_REQUEST),
            (ScanError::ParticipantNotFound, StatusCode::NOT_FOUND),
            (
                ScanError::Update(StoreError::Unavailable("down".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ScanFailure(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_generic_message_for_server_errors() {
        let err = ScanError::Lookup(StoreError::Unavailable("connection refused".to_string()));
        assert_eq!(err.to_string(), "Failed to look up participant");
    }
}
