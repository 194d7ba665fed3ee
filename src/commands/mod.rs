use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::cli::StoreArgs;
use crate::config::Config;
use crate::store::{RegisterOutcome, open_store, register_schema};

pub mod extract;
pub mod register;
pub mod show;
pub mod stage;
pub mod status;

fn open_with_config(args: &StoreArgs) -> Result<(Config, Connection)> {
    let config = Config::load(args.config.as_deref())?;
    let connection = open_store(&args.resolved_db_path())?;
    Ok((config, connection))
}

/// Registers every configured schema; returns how many were created or
/// updated.
fn sync_schemas(connection: &mut Connection, config: &Config) -> Result<usize> {
    let mut changed = 0;
    for definition in &config.schemas {
        let outcome = register_schema(connection, definition).with_context(|| {
            format!(
                "failed to register schema {} ({})",
                definition.namespace, definition.name
            )
        })?;
        if outcome != RegisterOutcome::Unchanged {
            changed += 1;
        }
    }
    Ok(changed)
}
