//! SQLite-backed schema registry, staged datasets and parameter sets.

mod datasets;
mod db_setup;
mod parameters;
mod registry;
#[cfg(test)]
mod tests;

pub use datasets::{
    DatasetFile, DatasetRecord, SchemaRef, dataset_files, discover_files, find_dataset,
    list_datasets, mark_extracted, stage_dataset,
};
pub use db_setup::{DB_SCHEMA_VERSION, count_rows, open_store};
pub use parameters::{
    ExistingPolicy, MetadataEntry, ParamValue, get_metadata, has_parameter_set, save_metadata,
};
pub use registry::{
    DataType, ParameterDef, RegisterOutcome, Schema, SchemaDefinition, StoredParameter,
    default_vasp_schema, get_schema, list_schemas, register_schema,
};

#[cfg(test)]
pub(crate) fn open_in_memory_store() -> rusqlite::Connection {
    let connection =
        rusqlite::Connection::open_in_memory().expect("in-memory DB should open");
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .expect("foreign keys should enable");
    db_setup::ensure_schema(&connection).expect("schema should initialize");
    connection
}
