use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::store::DataType;

/// A single literal that could not be coerced to its declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedValue {
    pub key: String,
    pub literal: String,
    pub expected: DataType,
}

impl fmt::Display for MalformedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {:?} is not a valid {} value",
            self.key,
            self.literal,
            self.expected.as_str()
        )
    }
}

/// Errors raised by the schema registry, the metadata store and the
/// per-dataset extraction pass.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("schema not found: namespace={namespace} name={name}")]
    SchemaNotFound { namespace: String, name: String },

    #[error("malformed values: {}", join_malformed(.0))]
    MalformedValue(Vec<MalformedValue>),

    #[error("dataset {dataset} already has a parameter set for schema {namespace} ({name})")]
    DuplicateParameterSet {
        dataset: String,
        namespace: String,
        name: String,
    },

    #[error("schema {namespace} ({name}) is referenced by stored parameter sets and cannot change")]
    SchemaInUse { namespace: String, name: String },

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("dataset {dataset} has no parameter set for schema {namespace} ({name})")]
    ParameterSetNotFound {
        dataset: String,
        namespace: String,
        name: String,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl ExtractError {
    /// Stable tag used in run manifests.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SchemaNotFound { .. } => "schema_not_found",
            Self::MalformedValue(_) => "malformed_value",
            Self::DuplicateParameterSet { .. } => "duplicate_parameter_set",
            Self::SchemaInUse { .. } => "schema_in_use",
            Self::DatasetNotFound(_) => "dataset_not_found",
            Self::ParameterSetNotFound { .. } => "parameter_set_not_found",
            Self::Io { .. } => "io",
            Self::Database(_) => "database",
        }
    }
}

fn join_malformed(values: &[MalformedValue]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
