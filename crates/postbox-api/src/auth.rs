use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use tracing::{info, warn};

use postbox_crypto::{ids::create_id, password};
use postbox_db::{Database, is_unique_violation, models::NewUser};
use postbox_types::api::{
    ApiResponse, AuthState, LoginRequest, LogoutQuery, RegisterRequest, RegisteredUser, SessionUser,
};

use crate::blocking;
use crate::error::{ApiError, JsonBody};
use crate::session;
use crate::storage::PhotoStorage;
use crate::validation;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub session_secret: String,
    pub storage: PhotoStorage,
}

const REGISTER_FAILED: &str = "An error occurred during registration";
const LOGIN_FAILED: &str = "An error occurred during login";

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let form = validation::validate_registration(req)?;

    // Check if username or email is taken
    let (username, email) = (form.username.clone(), form.email.clone());
    let availability = blocking(&state, move |s| s.db.check_availability(&username, &email))
        .await
        .map_err(|e| ApiError::internal(REGISTER_FAILED, e))?;

    if !availability.username_available {
        return Err(ApiError::Conflict("Username is already taken".into()));
    }
    if !availability.email_available {
        return Err(ApiError::Conflict("Email is already registered".into()));
    }

    let row = blocking(&state, move |s| {
        let password_hash = password::hash_password(&form.password);
        let id = create_id();
        s.db.create_user(&NewUser {
            id: &id,
            username: &form.username,
            email: &form.email,
            password_hash: &password_hash,
            full_name: form.full_name.as_deref(),
        })
    })
    .await
    .map_err(|e| {
        // Lost a race with a concurrent registration
        if is_unique_violation(&e) {
            ApiError::Conflict("Username or email is already registered".into())
        } else {
            ApiError::internal(REGISTER_FAILED, e)
        }
    })?;

    info!("Registered user {} ({})", row.username, row.id);

    Ok((
        StatusCode::CREATED,
        Json(
            ApiResponse::data(RegisteredUser::from(row.to_user()))
                .with_message("User registered successfully"),
        ),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let creds = validation::validate_login(req)?;

    let user = blocking(&state, move |s| {
        let Some(row) = s.db.find_user_for_login(&creds.identifier)? else {
            warn!("Login failed: no such user");
            return Ok(None);
        };
        if !row.is_active {
            warn!("Login failed: user {} is inactive", row.id);
            return Ok(None);
        }
        if !password::verify_password(&creds.password, &row.password_hash) {
            warn!("Login failed: wrong password for user {}", row.id);
            return Ok(None);
        }

        let now = Utc::now();
        s.db.touch_last_login(&row.id, now)?;

        let mut user = row.to_user();
        user.last_login = Some(now);
        Ok(Some(user))
    })
    .await
    .map_err(|e| ApiError::internal(LOGIN_FAILED, e))?
    .ok_or(ApiError::InvalidCredentials)?;

    let token = session::issue_token(&state.session_secret, &user.id)
        .map_err(|e| ApiError::internal(LOGIN_FAILED, e))?;

    info!("User {} logged in", user.id);

    Ok((
        jar.add(session::session_cookie(token)),
        Json(ApiResponse::data(SessionUser::from(user)).with_message("Login successful")),
    ))
}

/// POST /api/logout
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(session::expired_cookie()),
        Json(ApiResponse::message("Logged out successfully")),
    )
}

/// GET /api/logout?redirect=/path, for plain links.
pub async fn logout_redirect(jar: CookieJar, Query(query): Query<LogoutQuery>) -> impl IntoResponse {
    let target = local_redirect(query.redirect.as_deref());
    (
        StatusCode::FOUND,
        jar.add(session::expired_cookie()),
        [(header::LOCATION, target)],
    )
}

/// GET /api/session. Reports whether the caller is logged in; never 401.
pub async fn session_status(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<ApiResponse<AuthState>>, ApiError> {
    let user = session::authenticate(&state, &jar).await?;

    Ok(Json(ApiResponse::data(AuthState {
        is_authenticated: user.is_some(),
        user,
    })))
}

/// Only same-site paths are followed; anything else goes to `/`.
fn local_redirect(target: Option<&str>) -> String {
    match target {
        Some(t)
            if t.starts_with('/')
                && !t.starts_with("//")
                && !t.starts_with("/\\")
                && !t.chars().any(char::is_control) =>
        {
            t.to_string()
        }
        _ => "/".to_string(),
    }
}
