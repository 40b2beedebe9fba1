//! User repository: CRUD operations for the `users` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::store::User;

fn from_row(row: &Row<'_>) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        password_hash: row.get("password")?,
    })
}

/// Inserts a user and returns it with its assigned id.
pub fn insert(db: &Database, username: &str, password_hash: &str) -> Result<User, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO users (username, password) VALUES (?1, ?2)",
            params![username, password_hash],
        )?;
        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        })
    })
}

pub fn find_by_username(db: &Database, username: &str) -> Result<Option<User>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT id, username, password FROM users WHERE username = ?1")?;
        let mut rows = stmt.query_map(params![username], from_row)?;
        match rows.next() {
            Some(Ok(user)) => Ok(Some(user)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// All users, ordered by id.
pub fn list(db: &Database) -> Result<Vec<User>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT id, username, password FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    })
}

/// Replaces the stored hash. Returns false if no row matched.
pub fn update_password(
    db: &Database,
    user_id: i64,
    password_hash: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE users SET password = ?2, updated_at = datetime('now') WHERE id = ?1",
            params![user_id, password_hash],
        )?;
        Ok(changed > 0)
    })
}
