//! Database row types. These map directly to SQLite rows.
//! Distinct from postbox-types API models to keep the DB layer independent.

use chrono::{DateTime, Utc};
use postbox_types::models::{Role, Submission, User};
use tracing::warn;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: String,
    pub created_at: i64,
    pub last_login: Option<i64>,
    pub is_active: bool,
}

pub struct SubmissionRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub message: String,
    pub photo_path: Option<String>,
    pub created_at: i64,
    pub user_id: Option<String>,
}

pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: Option<&'a str>,
}

pub struct NewSubmission<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub message: &'a str,
    pub photo_path: Option<&'a str>,
    pub user_id: Option<&'a str>,
}

/// Result of the two independent uniqueness lookups done before registering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub username_available: bool,
    pub email_available: bool,
}

impl UserRow {
    /// Public view of the row, without the password hash.
    pub fn to_user(&self) -> User {
        let role = self.role.parse::<Role>().unwrap_or_else(|e| {
            warn!("Corrupt role on user '{}': {}", self.id, e);
            Role::User
        });

        User {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role,
            created_at: timestamp(self.created_at),
            last_login: self.last_login.map(timestamp),
            is_active: self.is_active,
        }
    }
}

impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Submission {
            created_at: timestamp(row.created_at),
            id: row.id,
            name: row.name,
            email: row.email,
            message: row.message,
            photo_path: row.photo_path,
            user_id: row.user_id,
        }
    }
}

/// Columns hold unix seconds.
fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(|| {
        warn!("Out-of-range timestamp {}", secs);
        DateTime::default()
    })
}
