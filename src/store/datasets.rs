use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::info;

use crate::error::ExtractError;
use crate::util::{now_utc_string, sha256_hex};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaRef {
    pub namespace: String,
    pub name: String,
}

impl SchemaRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetRecord {
    pub dataset_id: i64,
    pub name: String,
    pub description: String,
    pub schema_ref: Option<SchemaRef>,
    pub fingerprint: Option<String>,
    pub extracted_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetFile {
    pub filename: String,
    pub path: PathBuf,
    pub sha256: String,
}

/// Creates or refreshes a dataset and replaces its file list, keeping the
/// given file order.
pub fn stage_dataset(
    connection: &mut Connection,
    name: &str,
    description: &str,
    schema_ref: Option<&SchemaRef>,
    files: &[PathBuf],
) -> Result<i64, ExtractError> {
    let mut staged = Vec::with_capacity(files.len());
    for path in files {
        let filename = path
            .file_name()
            .map(|value| value.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
            path: path.clone(),
            source,
        })?;
        let sha256 = sha256_hex(&bytes);
        staged.push(DatasetFile {
            filename,
            path: path.clone(),
            sha256,
        });
    }

    let tx = connection.transaction()?;
    tx.execute(
        "
        INSERT INTO datasets(name, description, schema_namespace, schema_name, staged_at)
        VALUES(?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(name) DO UPDATE SET
          description=excluded.description,
          schema_namespace=excluded.schema_namespace,
          schema_name=excluded.schema_name,
          staged_at=excluded.staged_at
        ",
        params![
            name,
            description,
            schema_ref.map(|value| value.namespace.as_str()),
            schema_ref.map(|value| value.name.as_str()),
            now_utc_string(),
        ],
    )?;
    let dataset_id: i64 = tx.query_row(
        "SELECT dataset_id FROM datasets WHERE name = ?1",
        [name],
        |row| row.get(0),
    )?;

    tx.execute("DELETE FROM dataset_files WHERE dataset_id = ?1", [dataset_id])?;
    {
        let mut statement = tx.prepare(
            "
            INSERT INTO dataset_files(dataset_id, filename, path, sha256, order_index)
            VALUES(?1, ?2, ?3, ?4, ?5)
            ",
        )?;
        for (index, file) in staged.iter().enumerate() {
            statement.execute(params![
                dataset_id,
                file.filename,
                file.path.to_string_lossy(),
                file.sha256,
                index as i64,
            ])?;
        }
    }
    tx.commit()?;

    info!(dataset = %name, dataset_id, files = staged.len(), "staged dataset");
    Ok(dataset_id)
}

pub fn list_datasets(connection: &Connection) -> Result<Vec<DatasetRecord>, ExtractError> {
    let mut statement = connection.prepare(
        "
        SELECT dataset_id, name, description, schema_namespace, schema_name, fingerprint, extracted_at
        FROM datasets
        ORDER BY dataset_id
        ",
    )?;

    let rows = statement.query_map([], dataset_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn find_dataset(connection: &Connection, name: &str) -> Result<DatasetRecord, ExtractError> {
    connection
        .query_row(
            "
            SELECT dataset_id, name, description, schema_namespace, schema_name, fingerprint, extracted_at
            FROM datasets
            WHERE name = ?1
            ",
            [name],
            dataset_from_row,
        )
        .optional()?
        .ok_or_else(|| ExtractError::DatasetNotFound(name.to_string()))
}

pub fn dataset_files(
    connection: &Connection,
    dataset_id: i64,
) -> Result<Vec<DatasetFile>, ExtractError> {
    let mut statement = connection.prepare(
        "
        SELECT filename, path, sha256
        FROM dataset_files
        WHERE dataset_id = ?1
        ORDER BY order_index, file_id
        ",
    )?;

    let rows = statement.query_map([dataset_id], |row| {
        Ok(DatasetFile {
            filename: row.get(0)?,
            path: PathBuf::from(row.get::<_, String>(1)?),
            sha256: row.get(2)?,
        })
    })?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn mark_extracted(
    connection: &Connection,
    dataset_id: i64,
    fingerprint: &str,
) -> Result<(), ExtractError> {
    connection.execute(
        "UPDATE datasets SET fingerprint = ?1, extracted_at = ?2 WHERE dataset_id = ?3",
        params![fingerprint, now_utc_string(), dataset_id],
    )?;
    Ok(())
}

/// Regular files directly inside `dir`, sorted by name.
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let io_err = |source| ExtractError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    Ok(files)
}

fn dataset_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DatasetRecord> {
    let namespace: Option<String> = row.get(3)?;
    let schema_name: Option<String> = row.get(4)?;
    Ok(DatasetRecord {
        dataset_id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        schema_ref: namespace.zip(schema_name).map(|(ns, name)| SchemaRef::new(ns, name)),
        fingerprint: row.get(5)?,
        extracted_at: row.get(6)?,
    })
}
