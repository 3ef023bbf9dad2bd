use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use tracing::debug;

use checkin_core::models::{Participant, ScanRequest, ScanResult, ScanStats};
use checkin_core::Identity;

use crate::app::AppState;
use crate::error::ScanFailure;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSuccessBody {
    pub success: bool,
    pub message: String,
    pub scan_time: String,
    pub scan_result: ScanResult,
    pub participant: Participant,
}

#[derive(Debug, Serialize)]
pub struct StatsBody {
    pub stats: ScanStats,
}

/// `POST /api/scan`
pub async fn scan_handler(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> Response {
    // An unreadable body is the same as one without a QR code
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected scan payload");
            ScanRequest::default()
        }
    };

    let identity = identity.map(|Extension(identity)| identity);
    match state.scans.process(identity.as_ref(), &request).await {
        Ok(success) => {
            // The audit log task keeps running after the handle is dropped
            drop(success.log_task);
            Json(ScanSuccessBody {
                success: true,
                message: success.result.message.clone(),
                scan_time: success.result.scan_time.clone(),
                scan_result: success.result,
                participant: success.participant,
            })
            .into_response()
        }
        Err(err) => ScanFailure(err).into_response(),
    }
}

/// `GET /api/scan` and `GET /api/scan/stats`
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsBody> {
    let stats = state.repository().scan_stats(true).await;
    Json(StatsBody { stats })
}
