use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::store::{count_rows, list_schemas};

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args.store.resolved_db_path();

    info!(data_root = %args.store.data_root.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing");
        return Ok(());
    }

    let connection = Connection::open_with_flags(&db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    let schema_version: String = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = 'db_schema_version'",
            [],
            |row| row.get(0),
        )
        .unwrap_or_default();
    let schemas = list_schemas(&connection)
        .with_context(|| format!("failed to read schemas from {}", db_path.display()))?;
    let datasets = count_rows(&connection, "SELECT COUNT(*) FROM datasets").unwrap_or(0);
    let pending = count_rows(
        &connection,
        "SELECT COUNT(*) FROM datasets WHERE extracted_at IS NULL",
    )
    .unwrap_or(0);
    let parameter_sets = count_rows(&connection, "SELECT COUNT(*) FROM parameter_sets").unwrap_or(0);
    let parameter_values =
        count_rows(&connection, "SELECT COUNT(*) FROM parameter_values").unwrap_or(0);

    info!(
        path = %db_path.display(),
        db_schema_version = %schema_version,
        schemas = schemas.len(),
        datasets,
        never_extracted = pending,
        parameter_sets,
        parameter_values,
        "database status"
    );
    for schema in &schemas {
        info!(
            namespace = %schema.namespace,
            name = %schema.name,
            parameters = schema.parameters.len(),
            "registered schema"
        );
    }

    Ok(())
}
