pub mod auth;
pub mod error;
pub mod middleware;
pub mod session;
pub mod storage;
pub mod submissions;
pub mod validation;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::auth::{AppState, AppStateInner};
use crate::middleware::require_auth;

/// Room for a 5 MB photo plus form fields, so oversized photos reach
/// validation instead of being cut off by the transport limit.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// All `/api` routes. Callers add CORS and tracing layers.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/logout", get(auth::logout_redirect).post(auth::logout))
        .route("/api/session", get(auth::session_status));

    let protected_routes = Router::new()
        .route(
            "/api/submit",
            get(submissions::list_submissions).post(submissions::create_submission),
        )
        .route("/api/delete", post(submissions::delete_submission))
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Run blocking DB or hashing work off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&AppStateInner) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(state.as_ref()))
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?
}
