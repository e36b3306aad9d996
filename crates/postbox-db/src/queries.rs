use crate::Database;
use crate::models::{Availability, NewSubmission, NewUser, SubmissionRow, UserRow};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, full_name, role, created_at, last_login, is_active";

const SUBMISSION_COLUMNS: &str = "id, name, email, message, photo_path, created_at, user_id";

impl Database {
    // -- Users --

    pub fn create_user(&self, new: &NewUser<'_>) -> Result<UserRow> {
        let created_at = Utc::now().timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password_hash, full_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    new.id,
                    new.username,
                    new.email,
                    new.password_hash,
                    new.full_name,
                    created_at
                ],
            )?;
            Ok(())
        })?;

        Ok(UserRow {
            id: new.id.to_string(),
            username: new.username.to_string(),
            email: new.email.to_string(),
            password_hash: new.password_hash.to_string(),
            full_name: new.full_name.map(str::to_string),
            role: "user".to_string(),
            created_at,
            last_login: None,
            is_active: true,
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = lower(?1)", email))
    }

    /// Match on username, or on email ignoring case. A username match wins
    /// if both would hit different rows.
    pub fn find_user_for_login(&self, identifier: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(
                conn,
                "username = ?1 OR email = lower(?1) ORDER BY username = ?1 DESC",
                identifier,
            )
        })
    }

    /// Two independent lookups, so the caller can say which one is taken.
    pub fn check_availability(&self, username: &str, email: &str) -> Result<Availability> {
        let username_available = self.get_user_by_username(username)?.is_none();
        let email_available = self.get_user_by_email(email)?.is_none();
        Ok(Availability {
            username_available,
            email_available,
        })
    }

    pub fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET last_login = ?1 WHERE id = ?2",
                rusqlite::params![at.timestamp(), id],
            )?;
            Ok(())
        })
    }

    // -- Submissions --

    pub fn insert_submission(&self, new: &NewSubmission<'_>) -> Result<SubmissionRow> {
        let created_at = Utc::now().timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO submissions (id, name, email, message, photo_path, created_at, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    new.id,
                    new.name,
                    new.email,
                    new.message,
                    new.photo_path,
                    created_at,
                    new.user_id
                ],
            )?;
            Ok(())
        })?;

        Ok(SubmissionRow {
            id: new.id.to_string(),
            name: new.name.to_string(),
            email: new.email.to_string(),
            message: new.message.to_string(),
            photo_path: new.photo_path.map(str::to_string),
            created_at,
            user_id: new.user_id.map(str::to_string),
        })
    }

    pub fn get_submission(&self, id: &str) -> Result<Option<SubmissionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM submissions WHERE id = ?1",
                SUBMISSION_COLUMNS
            ))?;
            let row = stmt.query_row([id], submission_from_row).optional()?;
            Ok(row)
        })
    }

    /// Newest first, across every owner.
    pub fn list_submissions(&self, limit: u32) -> Result<Vec<SubmissionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM submissions ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                SUBMISSION_COLUMNS
            ))?;
            let rows = stmt
                .query_map([limit], submission_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Newest first, only rows owned by `user_id`.
    pub fn list_submissions_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<SubmissionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM submissions WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                SUBMISSION_COLUMNS
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], submission_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns whether a row was removed.
    pub fn delete_submission(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM submissions WHERE id = ?1", [id])?;
            Ok(affected > 0)
        })
    }
}

/// True when the error is a UNIQUE constraint failure, e.g. two
/// registrations racing for the same username.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE {} LIMIT 1",
        USER_COLUMNS, predicate
    ))?;

    let row = stmt.query_row([value], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        full_name: row.get(4)?,
        role: row.get(5)?,
        created_at: row.get(6)?,
        last_login: row.get(7)?,
        is_active: row.get(8)?,
    })
}

fn submission_from_row(row: &Row<'_>) -> rusqlite::Result<SubmissionRow> {
    Ok(SubmissionRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        message: row.get(3)?,
        photo_path: row.get(4)?,
        created_at: row.get(5)?,
        user_id: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user<'a>(id: &'a str, username: &'a str, email: &'a str) -> NewUser<'a> {
        NewUser {
            id,
            username,
            email,
            password_hash: "hash:salt",
            full_name: None,
        }
    }

    fn new_submission<'a>(id: &'a str, user_id: Option<&'a str>) -> NewSubmission<'a> {
        NewSubmission {
            id,
            name: "Ann",
            email: "ann@example.com",
            message: "hello",
            photo_path: None,
            user_id,
        }
    }

    #[test]
    fn duplicate_username_is_a_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "ann", "ann@example.com")).unwrap();

        let err = db
            .create_user(&new_user("u2", "ann", "other@example.com"))
            .err()
            .unwrap();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn availability_reports_each_field() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "ann", "ann@example.com")).unwrap();

        let taken = db.check_availability("ann", "new@example.com").unwrap();
        assert!(!taken.username_available);
        assert!(taken.email_available);

        let taken = db.check_availability("bob", "ANN@example.com").unwrap();
        assert!(taken.username_available);
        assert!(!taken.email_available);
    }

    #[test]
    fn login_lookup_matches_username_or_email() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "ann", "ann@example.com")).unwrap();

        assert_eq!(db.find_user_for_login("ann").unwrap().unwrap().id, "u1");
        assert_eq!(db.find_user_for_login("Ann@Example.com").unwrap().unwrap().id, "u1");
        assert!(db.find_user_for_login("ANN").unwrap().is_none());
        assert!(db.find_user_for_login("nobody").unwrap().is_none());
    }

    #[test]
    fn touch_last_login_sets_timestamp() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "ann", "ann@example.com")).unwrap();
        assert!(db.get_user_by_id("u1").unwrap().unwrap().last_login.is_none());

        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        db.touch_last_login("u1", at).unwrap();

        let user = db.get_user_by_id("u1").unwrap().unwrap().to_user();
        assert_eq!(user.last_login, Some(at));
        assert!(user.is_active);
    }

    #[test]
    fn submissions_are_scoped_by_owner() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "ann", "ann@example.com")).unwrap();
        db.create_user(&new_user("u2", "bob", "bob@example.com")).unwrap();

        db.insert_submission(&new_submission("s1", Some("u1"))).unwrap();
        db.insert_submission(&new_submission("s2", Some("u2"))).unwrap();
        db.insert_submission(&new_submission("s3", None)).unwrap();

        let mine = db.list_submissions_for_user("u1", 100).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, "s1");

        assert_eq!(db.list_submissions(100).unwrap().len(), 3);
        assert_eq!(db.list_submissions(2).unwrap().len(), 2);
    }

    #[test]
    fn submission_owner_must_exist() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_submission(&new_submission("s1", Some("ghost"))).is_err());
    }

    #[test]
    fn delete_reports_whether_row_existed() {
        let db = Database::open_in_memory().unwrap();
        db.insert_submission(&new_submission("s1", None)).unwrap();

        assert!(db.delete_submission("s1").unwrap());
        assert!(!db.delete_submission("s1").unwrap());
        assert!(db.get_submission("s1").unwrap().is_none());
    }

    #[test]
    fn open_on_disk_persists_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.db");

        {
            let db = Database::open(&path).unwrap();
            db.insert_submission(&new_submission("s1", None)).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert!(db.get_submission("s1").unwrap().is_some());
    }
}
