use std::collections::BTreeMap;
use std::fs;

use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::error::ExtractError;
use crate::extract::{
    ClassifiedFile, Extracted, FormatTag, classify_files, extract_format, merge_extracted,
};
use crate::model::{DatasetFailure, DatasetOutcome, DatasetStatus, ExtractReport};
use crate::store::{
    DatasetRecord, ExistingPolicy, SchemaRef, dataset_files, get_schema, has_parameter_set,
    list_datasets, mark_extracted, save_metadata,
};

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub default_schema: SchemaRef,
    pub on_existing: ExistingPolicy,
    /// Re-extract datasets whose files have not changed since the last run.
    pub force: bool,
}

/// Runs extraction over every staged dataset. A failing dataset is logged
/// and recorded in the report; the remaining datasets are still processed.
pub fn go(
    connection: &mut Connection,
    options: &ExtractOptions,
) -> Result<ExtractReport, ExtractError> {
    let datasets = list_datasets(connection)?;
    info!(datasets = datasets.len(), force = options.force, "starting extraction pass");

    let mut report = ExtractReport::default();
    for dataset in &datasets {
        match extract_dataset(connection, dataset, options) {
            Ok(outcome) => report.outcomes.push(outcome),
            Err(err) => {
                error!(
                    dataset = %dataset.name,
                    kind = err.kind(),
                    error = %err,
                    "dataset extraction failed"
                );
                report.outcomes.push(DatasetOutcome {
                    dataset_id: dataset.dataset_id,
                    dataset: dataset.name.clone(),
                    status: DatasetStatus::Failed,
                    schema: Some(resolve_schema_ref(dataset, options)),
                    formats: Vec::new(),
                    values_written: 0,
                });
                report.failures.push(DatasetFailure {
                    dataset_id: dataset.dataset_id,
                    dataset: dataset.name.clone(),
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                });
            }
        }
    }

    info!(
        extracted = report.count(DatasetStatus::Extracted),
        up_to_date = report.count(DatasetStatus::UpToDate),
        failed = report.failures.len(),
        "extraction pass complete"
    );
    Ok(report)
}

pub fn extract_dataset(
    connection: &mut Connection,
    dataset: &DatasetRecord,
    options: &ExtractOptions,
) -> Result<DatasetOutcome, ExtractError> {
    let schema_ref = resolve_schema_ref(dataset, options);
    let files = read_dataset_files(connection, dataset.dataset_id)?;
    let fingerprint = fingerprint(&files, &schema_ref);

    let schema = get_schema(connection, &schema_ref.namespace, &schema_ref.name)?;

    if !options.force
        && dataset.fingerprint.as_deref() == Some(fingerprint.as_str())
        && has_parameter_set(connection, dataset.dataset_id, schema.schema_id)?
    {
        debug!(dataset = %dataset.name, "dataset unchanged since last extraction");
        return Ok(DatasetOutcome {
            dataset_id: dataset.dataset_id,
            dataset: dataset.name.clone(),
            status: DatasetStatus::UpToDate,
            schema: Some(schema_ref),
            formats: Vec::new(),
            values_written: 0,
        });
    }

    let classified = classify_files(files);
    let mut results = BTreeMap::<FormatTag, Extracted>::new();
    for (tag, file) in &classified {
        let extracted = extract_format(*tag, &file.text);
        debug!(
            dataset = %dataset.name,
            file = %file.path.display(),
            format = tag.as_str(),
            keys = extracted.len(),
            "extracted file"
        );
        results.insert(*tag, extracted);
    }

    let merged = merge_extracted(&results, &schema);
    let values_written = save_metadata(
        connection,
        dataset.dataset_id,
        &schema,
        &merged,
        options.on_existing,
    )?;
    mark_extracted(connection, dataset.dataset_id, &fingerprint)?;

    info!(
        dataset = %dataset.name,
        namespace = %schema.namespace,
        schema = %schema.name,
        values = values_written,
        "saved metadata"
    );

    Ok(DatasetOutcome {
        dataset_id: dataset.dataset_id,
        dataset: dataset.name.clone(),
        status: DatasetStatus::Extracted,
        schema: Some(schema_ref),
        formats: classified.keys().map(|tag| tag.as_str().to_string()).collect(),
        values_written,
    })
}

fn resolve_schema_ref(dataset: &DatasetRecord, options: &ExtractOptions) -> SchemaRef {
    dataset
        .schema_ref
        .clone()
        .unwrap_or_else(|| options.default_schema.clone())
}

fn read_dataset_files(
    connection: &Connection,
    dataset_id: i64,
) -> Result<Vec<ClassifiedFile>, ExtractError> {
    dataset_files(connection, dataset_id)?
        .into_iter()
        .map(|file| {
            let bytes = fs::read(&file.path).map_err(|source| ExtractError::Io {
                path: file.path.clone(),
                source,
            })?;
            Ok(ClassifiedFile {
                filename: file.filename,
                path: file.path,
                text: String::from_utf8_lossy(&bytes).into_owned(),
            })
        })
        .collect()
}

fn fingerprint(files: &[ClassifiedFile], schema_ref: &SchemaRef) -> String {
    let mut hasher = Sha256::new();
    hasher.update(schema_ref.namespace.as_bytes());
    hasher.update([0u8]);
    hasher.update(schema_ref.name.as_bytes());
    for file in files {
        hasher.update([0u8]);
        hasher.update(file.filename.as_bytes());
        hasher.update([0u8]);
        hasher.update(file.text.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
