use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Bring the schema up to date. Safe to run against databases created by
/// the older standalone scripts: every step checks before it alters.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("DB: running migration v1 (submissions)");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS submissions (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL,
                message     TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );
            ",
        )?;
        add_column_if_missing(conn, "submissions", "photo_path", "TEXT")?;
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
    }

    if version < 2 {
        info!("DB: running migration v2 (users)");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                full_name       TEXT,
                role            TEXT NOT NULL DEFAULT 'user',
                created_at      INTEGER NOT NULL,
                last_login      INTEGER,
                is_active       INTEGER NOT NULL DEFAULT 1
            );
            ",
        )?;
        conn.execute("INSERT INTO schema_version (version) VALUES (2)", [])?;
    }

    if version < 3 {
        info!("DB: running migration v3 (submission owners)");
        add_column_if_missing(conn, "submissions", "user_id", "TEXT REFERENCES users(id)")?;
        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_submissions_user ON submissions(user_id, created_at);",
        )?;
        conn.execute("INSERT INTO schema_version (version) VALUES (3)", [])?;
    }

    info!("Database migrations complete");
    Ok(())
}

fn add_column_if_missing(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<()> {
    if has_column(conn, table, column)? {
        info!("{}.{} already exists", table, column);
        return Ok(());
    }

    conn.execute_batch(&format!("ALTER TABLE {} ADD COLUMN {} {};", table, column, decl))?;
    info!("Added column {}.{}", table, column);
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_gets_full_schema() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();

        assert!(has_column(&conn, "submissions", "photo_path").unwrap());
        assert!(has_column(&conn, "submissions", "user_id").unwrap());
        assert!(has_column(&conn, "users", "last_login").unwrap());
        assert!(!has_column(&conn, "submissions", "photo_paths").unwrap());
    }

    #[test]
    fn running_twice_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 3);
    }

    #[test]
    fn upgrades_pre_account_database() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE submissions (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                message TEXT NOT NULL,
                photo_paths TEXT,
                created_at INTEGER NOT NULL
            );
            INSERT INTO submissions (id, name, email, message, created_at)
                VALUES ('old', 'Ann', 'ann@example.com', 'hello', 1700000000);
            ",
        )
        .unwrap();

        run(&conn).unwrap();

        assert!(has_column(&conn, "submissions", "photo_path").unwrap());
        assert!(has_column(&conn, "submissions", "user_id").unwrap());
        let owner: Option<String> = conn
            .query_row("SELECT user_id FROM submissions WHERE id = 'old'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(owner, None);
    }
}
