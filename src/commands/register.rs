use anyhow::Result;
use tracing::info;

use crate::cli::RegisterArgs;
use crate::commands::{open_with_config, sync_schemas};

pub fn run(args: RegisterArgs) -> Result<()> {
    let (config, mut connection) = open_with_config(&args.store)?;
    let changed = sync_schemas(&mut connection, &config)?;

    info!(
        db_path = %args.store.resolved_db_path().display(),
        schemas = config.schemas.len(),
        changed,
        "schema registration complete"
    );
    Ok(())
}
