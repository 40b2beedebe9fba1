//! Configuration repository: one JSON blob per user.

use rusqlite::params;

use super::{Database, DatabaseError};

/// Returns the raw stored blob, if the user ever saved a configuration.
pub fn find_by_user(db: &Database, user_id: i64) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT data FROM configurations WHERE user_id = ?1")?;
        let mut rows = stmt.query_map(params![user_id], |r| r.get::<_, String>(0))?;
        match rows.next() {
            Some(Ok(data)) => Ok(Some(data)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Inserts or replaces the user's configuration blob.
pub fn upsert(db: &Database, user_id: i64, data: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO configurations (user_id, data) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET
               data = excluded.data,
               updated_at = datetime('now')",
            params![user_id, data],
        )?;
        Ok(())
    })
}
