use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "0.1.0";

pub fn open_store(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        crate::util::ensure_directory(parent)?;
    }

    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

pub fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign_keys")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS schemas (
          schema_id INTEGER PRIMARY KEY,
          namespace TEXT NOT NULL,
          name TEXT NOT NULL,
          registered_at TEXT NOT NULL,
          UNIQUE(namespace, name)
        );

        CREATE TABLE IF NOT EXISTS parameter_names (
          param_id INTEGER PRIMARY KEY,
          schema_id INTEGER NOT NULL,
          name TEXT NOT NULL,
          data_type TEXT NOT NULL CHECK (data_type IN ('numeric', 'string')),
          units TEXT,
          order_index INTEGER NOT NULL DEFAULT 0,
          source TEXT,
          UNIQUE(schema_id, name),
          UNIQUE(param_id, schema_id),
          FOREIGN KEY(schema_id) REFERENCES schemas(schema_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS datasets (
          dataset_id INTEGER PRIMARY KEY,
          name TEXT NOT NULL UNIQUE,
          description TEXT NOT NULL DEFAULT '',
          schema_namespace TEXT,
          schema_name TEXT,
          fingerprint TEXT,
          extracted_at TEXT,
          staged_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS dataset_files (
          file_id INTEGER PRIMARY KEY,
          dataset_id INTEGER NOT NULL,
          filename TEXT NOT NULL,
          path TEXT NOT NULL,
          sha256 TEXT NOT NULL,
          order_index INTEGER NOT NULL,
          FOREIGN KEY(dataset_id) REFERENCES datasets(dataset_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS parameter_sets (
          set_id INTEGER PRIMARY KEY,
          schema_id INTEGER NOT NULL,
          dataset_id INTEGER NOT NULL,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          UNIQUE(schema_id, dataset_id),
          UNIQUE(set_id, schema_id),
          FOREIGN KEY(schema_id) REFERENCES schemas(schema_id),
          FOREIGN KEY(dataset_id) REFERENCES datasets(dataset_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS parameter_values (
          value_id INTEGER PRIMARY KEY,
          set_id INTEGER NOT NULL,
          param_id INTEGER NOT NULL,
          schema_id INTEGER NOT NULL,
          numeric_value REAL,
          string_value TEXT NOT NULL,
          UNIQUE(set_id, param_id),
          FOREIGN KEY(set_id, schema_id) REFERENCES parameter_sets(set_id, schema_id) ON DELETE CASCADE,
          FOREIGN KEY(param_id, schema_id) REFERENCES parameter_names(param_id, schema_id)
        );
        ",
    )?;

    connection.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_parameter_names_schema_order ON parameter_names(schema_id, order_index);
        CREATE INDEX IF NOT EXISTS idx_dataset_files_dataset_order ON dataset_files(dataset_id, order_index);
        CREATE INDEX IF NOT EXISTS idx_parameter_values_set ON parameter_values(set_id);
        ",
    )?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

pub fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("failed to count rows: {sql}"))?;
    Ok(count)
}
