use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{DataType, Schema};
use crate::error::ExtractError;
use crate::extract::RawValue;
use crate::extract::coerce::{coerce_value, format_numeric};
use crate::util::now_utc_string;

/// What `save_metadata` does when the dataset already carries a set for the
/// schema.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingPolicy {
    #[default]
    Replace,
    Reject,
}

impl ExistingPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Numeric { value: f64, literal: String },
    Text(String),
}

impl ParamValue {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Numeric { .. } => DataType::Numeric,
            Self::Text(_) => DataType::String,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric { value, .. } => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric { value, .. } => f.write_str(&format_numeric(*value)),
            Self::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    pub key: String,
    pub data_type: DataType,
    pub value: ParamValue,
}

/// Persists the schema-defined keys of `mapping` as the dataset's parameter
/// set. Nothing is written when any value fails coercion.
pub fn save_metadata(
    connection: &mut Connection,
    dataset_id: i64,
    schema: &Schema,
    mapping: &BTreeMap<String, RawValue>,
    policy: ExistingPolicy,
) -> Result<usize, ExtractError> {
    let mut coerced = Vec::new();
    let mut malformed = Vec::new();
    for param in &schema.parameters {
        let Some(raw) = mapping.get(&param.def.name) else {
            debug!(key = %param.def.name, "no extracted value for schema key");
            continue;
        };
        match coerce_value(&param.def.name, raw, param.def.data_type) {
            Ok(value) => coerced.push((param.param_id, value)),
            Err(bad) => {
                warn!(dataset_id, %bad, "rejected extracted value");
                malformed.push(bad);
            }
        }
    }
    if !malformed.is_empty() {
        return Err(ExtractError::MalformedValue(malformed));
    }

    let tx = connection.transaction()?;
    let existing: Option<i64> = tx
        .query_row(
            "SELECT set_id FROM parameter_sets WHERE schema_id = ?1 AND dataset_id = ?2",
            params![schema.schema_id, dataset_id],
            |row| row.get(0),
        )
        .optional()?;

    let now = now_utc_string();
    let set_id = match (existing, policy) {
        (Some(_), ExistingPolicy::Reject) => {
            let dataset: String = tx.query_row(
                "SELECT name FROM datasets WHERE dataset_id = ?1",
                [dataset_id],
                |row| row.get(0),
            )?;
            return Err(ExtractError::DuplicateParameterSet {
                dataset,
                namespace: schema.namespace.clone(),
                name: schema.name.clone(),
            });
        }
        (Some(set_id), ExistingPolicy::Replace) => {
            tx.execute("DELETE FROM parameter_values WHERE set_id = ?1", [set_id])?;
            tx.execute(
                "UPDATE parameter_sets SET updated_at = ?1 WHERE set_id = ?2",
                params![now, set_id],
            )?;
            set_id
        }
        (None, _) => {
            tx.execute(
                "
                INSERT INTO parameter_sets(schema_id, dataset_id, created_at, updated_at)
                VALUES(?1, ?2, ?3, ?3)
                ",
                params![schema.schema_id, dataset_id, now],
            )?;
            tx.last_insert_rowid()
        }
    };

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO parameter_values(set_id, param_id, schema_id, numeric_value, string_value)
            VALUES(?1, ?2, ?3, ?4, ?5)
            ",
        )?;
        for (param_id, value) in &coerced {
            let (numeric, text) = match value {
                ParamValue::Numeric { value, literal } => (Some(*value), literal.as_str()),
                ParamValue::Text(text) => (None, text.as_str()),
            };
            statement.execute(params![set_id, param_id, schema.schema_id, numeric, text])?;
        }
    }
    tx.commit()?;

    Ok(coerced.len())
}

/// Reads the dataset's parameter set for `schema` in definition order.
pub fn get_metadata(
    connection: &Connection,
    dataset_id: i64,
    schema: &Schema,
) -> Result<Vec<MetadataEntry>, ExtractError> {
    let set_id: Option<i64> = connection
        .query_row(
            "SELECT set_id FROM parameter_sets WHERE schema_id = ?1 AND dataset_id = ?2",
            params![schema.schema_id, dataset_id],
            |row| row.get(0),
        )
        .optional()?;

    let Some(set_id) = set_id else {
        let dataset: Option<String> = connection
            .query_row(
                "SELECT name FROM datasets WHERE dataset_id = ?1",
                [dataset_id],
                |row| row.get(0),
            )
            .optional()?;
        return Err(ExtractError::ParameterSetNotFound {
            dataset: dataset.unwrap_or_else(|| dataset_id.to_string()),
            namespace: schema.namespace.clone(),
            name: schema.name.clone(),
        });
    };

    let mut statement = connection.prepare(
        "
        SELECT pn.name, pn.data_type, pv.numeric_value, pv.string_value
        FROM parameter_values pv
        JOIN parameter_names pn ON pn.param_id = pv.param_id
        WHERE pv.set_id = ?1
        ORDER BY pn.order_index, pn.param_id
        ",
    )?;

    let rows = statement.query_map([set_id], |row| {
        let data_type: String = row.get(1)?;
        let numeric: Option<f64> = row.get(2)?;
        let text: String = row.get(3)?;
        let value = match numeric {
            Some(value) => ParamValue::Numeric {
                value,
                literal: text,
            },
            None => ParamValue::Text(text),
        };
        Ok(MetadataEntry {
            key: row.get(0)?,
            data_type: DataType::parse(&data_type).unwrap_or_else(|| value.data_type()),
            value,
        })
    })?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn has_parameter_set(
    connection: &Connection,
    dataset_id: i64,
    schema_id: i64,
) -> Result<bool, ExtractError> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM parameter_sets WHERE schema_id = ?1 AND dataset_id = ?2",
        params![schema_id, dataset_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
