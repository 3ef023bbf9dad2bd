use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::app::AppState;

const TOKEN_COOKIE: &str = "access_token";

/// Bearer token from the Authorization header, else the access-token cookie.
fn request_token(request: &Request) -> Option<String> {
    let headers = request.headers();
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get(header::COOKIE)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .map(str::trim)
                .find_map(|c| c.strip_prefix(TOKEN_COOKIE)?.strip_prefix('='))
        })
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Attach the caller's `Identity` when the token checks out. Handlers decide
/// whether a missing identity is an error.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = request_token(&request) {
        match state.sessions.identify(&token).await {
            Ok(Some(identity)) => {
                request.extensions_mut().insert(identity);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Session lookup failed, continuing unauthenticated"),
        }
    }
    next.run(request).await
}
