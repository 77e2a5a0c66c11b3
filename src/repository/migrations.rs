//! Schema migrations.
//!
//! Migrations are declared with cetane and applied through a blocking
//! rusqlite connection. Applied names are tracked so re-running is a no-op.

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::pool::DieselError;
use super::util::to_diesel_error;

const TRACKING_TABLE: &str = "CREATE TABLE IF NOT EXISTS docvault_migrations (
    name TEXT PRIMARY KEY NOT NULL,
    applied_at TEXT NOT NULL
)";

/// Apply pending migrations to the database at `database_url`.
///
/// Returns the names of the migrations applied by this call.
pub async fn run_migrations(database_url: &str) -> Result<Vec<String>, DieselError> {
    let url = database_url
        .strip_prefix("sqlite:")
        .unwrap_or(database_url)
        .to_string();

    tokio::task::spawn_blocking(move || {
        let conn = Connection::open(&url).map_err(to_diesel_error)?;
        apply_pending(&conn)
    })
    .await
    .map_err(to_diesel_error)?
}

fn apply_pending(conn: &Connection) -> Result<Vec<String>, DieselError> {
    use cetane::backend::Sqlite;

    conn.execute_batch(TRACKING_TABLE)
        .map_err(to_diesel_error)?;

    let registry = crate::migrations::registry();
    let ordered = registry
        .resolve_order()
        .map_err(to_diesel_error)?;

    let mut applied = Vec::new();
    for name in ordered {
        let name: &str = &name;
        let already: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM docvault_migrations WHERE name = ?1)",
                params![name],
                |row| row.get(0),
            )
            .map_err(to_diesel_error)?;
        if already {
            debug!("Migration {} already applied", name);
            continue;
        }

        let migration = registry
            .get(name)
            .ok_or_else(|| to_diesel_error(format!("migration {} not registered", name)))?;
        for stmt in migration.forward_sql(&Sqlite) {
            if stmt.trim().is_empty() {
                continue;
            }
            conn.execute_batch(&stmt).map_err(to_diesel_error)?;
        }
        conn.execute(
            "INSERT INTO docvault_migrations (name, applied_at) VALUES (?1, ?2)",
            params![name, Utc::now().to_rfc3339()],
        )
        .map_err(to_diesel_error)?;

        info!("Applied migration: {}", name);
        applied.push(name.to_string());
    }

    if applied.is_empty() {
        info!("No pending migrations");
    }
    Ok(applied)
}
