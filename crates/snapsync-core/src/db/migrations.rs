//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Which side of the sync a database file serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Client replica: a `kv_store` table holding `images` and `lastSync`
    Replica,
    /// Server: the authoritative `images` table
    Catalog,
}

/// Run all pending migrations for `schema`
pub async fn run(conn: &Connection, schema: Schema) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn, schema).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

const REPLICA_V1: &[&str] = &["CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )"];

const CATALOG_V1: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        filename TEXT NOT NULL,
        size INTEGER NOT NULL,
        mime_type TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_images_updated ON images(updated_at DESC)",
];

/// Migration to version 1: the tables `schema` needs
async fn migrate_v1(conn: &Connection, schema: Schema) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let tables = match schema {
        Schema::Replica => REPLICA_V1,
        Schema::Catalog => CATALOG_V1,
    };
    let statements = std::iter::once(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
    )
    .chain(tables.iter().copied())
    .chain(std::iter::once(
        "INSERT INTO schema_version (version) VALUES (1)",
    ));

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!(?schema, "Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
