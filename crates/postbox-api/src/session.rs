use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use postbox_crypto::ids::random_alphanumeric;
use postbox_types::models::User;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "user_session";

const SESSION_DAYS: i64 = 7;
const SESSION_ID_LEN: usize = 13;

/// Session token claims. The token is signed with the server's session
/// secret, so `sub` cannot be swapped for another user's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub sid: String,
    pub exp: usize,
}

pub fn issue_token(secret: &str, user_id: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        sid: random_alphanumeric(SESSION_ID_LEN),
        exp: (chrono::Utc::now() + chrono::Duration::days(SESSION_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Signature and expiry checked; `None` for anything that does not verify.
pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| debug!("Rejected session token: {}", e))
    .ok()
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::days(SESSION_DAYS))
        .build()
}

/// Replacement cookie that makes the browser drop the session.
pub fn expired_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "deleted"))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build()
}

/// Resolve the session cookie to an active user, if there is one.
pub async fn authenticate(state: &AppState, jar: &CookieJar) -> Result<Option<User>, ApiError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };
    let Some(claims) = decode_token(&state.session_secret, cookie.value()) else {
        return Ok(None);
    };

    let user_id = claims.sub;
    let row = blocking(state, move |s| s.db.get_user_by_id(&user_id))
        .await
        .map_err(|e| ApiError::internal("Authentication error", e))?;

    match row {
        Some(row) if row.is_active => Ok(Some(row.to_user())),
        Some(row) => {
            debug!("Session for inactive user {}", row.id);
            Ok(None)
        }
        None => {
            debug!("Session names unknown user");
            Ok(None)
        }
    }
}
