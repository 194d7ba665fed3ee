use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::StageArgs;
use crate::store::{SchemaRef, discover_files, open_store, stage_dataset};

pub fn run(args: StageArgs) -> Result<()> {
    let files = match &args.dir {
        Some(dir) => discover_files(dir)
            .with_context(|| format!("failed to list dataset directory {}", dir.display()))?,
        None => args.files.clone(),
    };
    if files.is_empty() {
        bail!("dataset {} has no files to stage", args.dataset);
    }

    let schema_ref = args
        .namespace
        .as_ref()
        .zip(args.schema_name.as_ref())
        .map(|(namespace, name)| SchemaRef::new(namespace, name));

    let db_path = args.store.resolved_db_path();
    let mut connection = open_store(&db_path)?;
    let dataset_id = stage_dataset(
        &mut connection,
        &args.dataset,
        &args.description,
        schema_ref.as_ref(),
        &files,
    )
    .with_context(|| format!("failed to stage dataset {}", args.dataset))?;

    info!(
        db_path = %db_path.display(),
        dataset = %args.dataset,
        dataset_id,
        files = files.len(),
        "dataset staged"
    );
    Ok(())
}
