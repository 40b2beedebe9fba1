//! Versioned schema changes, recorded in `_migrations`.
//!
//! Every step is applied in its own transaction together with its
//! bookkeeping row. A column addition whose column already exists (a
//! database written by the older backend) is recorded without running.

use std::collections::BTreeSet;

use rusqlite::{params, Connection};

use super::error::DatabaseError;

enum Step {
    Script(&'static str),
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
}

struct Migration {
    version: u32,
    name: &'static str,
    step: Step,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users_table",
        step: Step::Script(include_str!("sql/001_create_users.sql")),
    },
    Migration {
        version: 2,
        name: "create_configurations_table",
        step: Step::Script(include_str!("sql/002_create_configurations.sql")),
    },
    Migration {
        version: 3,
        name: "add_users_updated_at",
        step: Step::AddColumn {
            table: "users",
            column: "updated_at",
            definition: "TEXT",
        },
    },
];

const BOOKKEEPING: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

/// Brings the schema up to date.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(BOOKKEEPING)?;
    let applied = applied_versions(conn)?;

    let pending = MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&m.version));
    for migration in pending {
        apply(conn, migration).map_err(|e| match e {
            DatabaseError::Sqlite(source) => DatabaseError::Migration {
                version: migration.version,
                reason: source.to_string(),
            },
            other => other,
        })?;
    }
    Ok(())
}

/// Highest applied version, 0 for an unmigrated database.
pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    conn.execute_batch(BOOKKEEPING)?;
    Ok(applied_versions(conn)?.last().copied().unwrap_or(0))
}

fn applied_versions(conn: &Connection) -> Result<BTreeSet<u32>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT version FROM _migrations")?;
    let versions = stmt
        .query_map([], |r| r.get::<_, u32>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(versions)
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    match &migration.step {
        Step::Script(sql) => {
            log::info!("Applying migration v{} ({})", migration.version, migration.name);
            tx.execute_batch(sql)?;
        }
        Step::AddColumn {
            table,
            column,
            definition,
        } => {
            if has_column(&tx, table, column)? {
                log::info!(
                    "Recording migration v{} ({}): {}.{} already present",
                    migration.version,
                    migration.name,
                    table,
                    column
                );
            } else {
                log::info!("Applying migration v{} ({})", migration.version, migration.name);
                tx.execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {};",
                    identifier(table)?,
                    identifier(column)?,
                    definition
                ))?;
            }
        }
    }

    tx.execute(
        "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
        params![migration.version, migration.name],
    )?;
    tx.commit()?;
    Ok(())
}

/// Identifiers cannot be bound as parameters, so only plain names pass.
fn identifier(name: &str) -> Result<&str, DatabaseError> {
    let plain = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        Ok(name)
    } else {
        Err(DatabaseError::Migration {
            version: 0,
            reason: format!("Invalid identifier: {}", name),
        })
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let sql = format!("SELECT name FROM pragma_table_info('{}')", identifier(table)?);
    let mut stmt = conn.prepare(&sql)?;
    let mut names = stmt.query_map([], |r| r.get::<_, String>(0))?;
    Ok(names.any(|name| matches!(name, Ok(n) if n == column)))
}
