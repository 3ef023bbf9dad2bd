use std::path::Path;
use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use checkin_core::{Repository, ScanService, SessionProvider};

use crate::middleware::auth::resolve_identity;
use crate::routes::{health, scan};

#[derive(Clone)]
pub struct AppState {
    pub scans: ScanService,
    pub sessions: Arc<dyn SessionProvider>,
}

impl AppState {
    pub fn new(scans: ScanService, sessions: Arc<dyn SessionProvider>) -> Self {
        Self { scans, sessions }
    }

    pub fn repository(&self) -> &Repository {
        self.scans.repository()
    }
}

pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route(
            "/api/scan",
            get(scan::stats_handler).post(scan::scan_handler),
        )
        .route("/api/scan/stats", get(scan::stats_handler))
        .route("/health", get(health::health_handler));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(middleware::from_fn_with_state(state.clone(), resolve_identity))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use checkin_core::auth::{Identity, StaticSessions};
    use checkin_core::models::{NewParticipant, ParticipantStatus};
    use checkin_core::{MemoryCache, MemoryStore};

    const TOKEN: &str = "gate-token";

    struct Harness {
        store: Arc<MemoryStore>,
        app: Router,
    }

    async fn harness(participants: &[(&str, &str, ParticipantStatus)]) -> Harness {
        let store = Arc::new(MemoryStore::default());
        let repo = Repository::new(store.clone(), Arc::new(MemoryCache::new()));
        for (name, qr, status) in participants {
            repo.create_participant(NewParticipant {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                qr_code: Some(qr.to_string()),
                status: Some(*status),
                ..Default::default()
            })
            .await
            .unwrap();
        }
        let sessions = StaticSessions::new().with_token(TOKEN, Identity::new("user-1", None));
        let state = AppState::new(ScanService::new(repo), Arc::new(sessions));
        Harness {
            store,
            app: router(state, None),
        }
    }

    fn scan_request(token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/scan")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_scan_success() {
        let h = harness(&[("Asha", "QR-A", ParticipantStatus::Registered)]).await;

        let (status, body) = send(
            &h.app,
            scan_request(Some(TOKEN), r#"{"qrCode":"QR-A","volunteerId":"v-7"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["scanResult"]["participantName"], "Asha");
        assert_eq!(body["scanResult"]["status"], "success");
        assert_eq!(body["scanResult"]["volunteerId"], "v-7");
        assert_eq!(body["participant"]["status"], "scanned");
    }

    #[tokio::test]
    async fn test_scan_requires_session() {
        let h = harness(&[("Asha", "QR-A", ParticipantStatus::Registered)]).await;

        let (status, body) = send(&h.app, scan_request(None, r#"{"qrCode":"QR-A"}"#)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert!(body["scanTime"].is_string());

        let (status, _) = send(&h.app, scan_request(Some("wrong"), r#"{"qrCode":"QR-A"}"#)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_scan_validation_errors() {
        let h = harness(&[]).await;

        let (status, body) = send(&h.app, scan_request(Some(TOKEN), "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "QR code is required");

        let (status, _) = send(&h.app, scan_request(Some(TOKEN), "not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&h.app, scan_request(Some(TOKEN), r#"{"qrCode":"QR-X"}"#)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Participant not found");
    }

    #[tokio::test]
    async fn test_duplicate_scan_conflict() {
        let h = harness(&[("Ravi", "QR-R", ParticipantStatus::Scanned)]).await;

        let (status, body) = send(&h.app, scan_request(Some(TOKEN), r#"{"qrCode":"QR-R"}"#)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Participant already scanned");
        assert_eq!(body["participant"]["name"], "Ravi");
        assert!(h.store.scan_logs().await.is_empty());
    }

    #[tokio::test]
    async fn test_stats_routes() {
        let h = harness(&[
            ("Asha", "QR-A", ParticipantStatus::Registered),
            ("Ravi", "QR-R", ParticipantStatus::Scanned),
        ])
        .await;

        for uri in ["/api/scan", "/api/scan/stats"] {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let (status, body) = send(&h.app, request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(
                body,
                json!({"stats": {"total": 2, "scanned": 1, "checkedIn": 0, "registered": 1, "scanRate": "50.0"}})
            );
        }
    }

    #[tokio::test]
    async fn test_stats_fail_soft_over_http() {
        let h = harness(&[("Asha", "QR-A", ParticipantStatus::Registered)]).await;
        h.store.set_fail_reads(true);

        let request = Request::builder().uri("/api/scan").body(Body::empty()).unwrap();
        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["total"], 0);
        assert_eq!(body["stats"]["scanRate"], "0");
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(&[]).await;
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
