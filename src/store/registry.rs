use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ExtractError;
use crate::extract::FormatTag;
use crate::util::now_utc_string;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Numeric,
    String,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::String => "string",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "numeric" => Some(Self::Numeric),
            "string" => Some(Self::String),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub units: Option<String>,
    /// Restricts the value to one file format instead of the default precedence.
    #[serde(default)]
    pub source: Option<FormatTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredParameter {
    pub param_id: i64,
    pub order_index: i64,
    pub def: ParameterDef,
}

/// A registered schema with its parameter definitions in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub schema_id: i64,
    pub namespace: String,
    pub name: String,
    pub parameters: Vec<StoredParameter>,
}

impl Schema {
    pub fn parameter(&self, name: &str) -> Option<&StoredParameter> {
        self.parameters.iter().find(|param| param.def.name == name)
    }

    pub fn definition(&self) -> SchemaDefinition {
        SchemaDefinition {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            parameters: self.parameters.iter().map(|param| param.def.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    Unchanged,
    Updated,
}

/// The `vasp 1.0` schema used when no configuration names schemas.
pub fn default_vasp_schema() -> SchemaDefinition {
    use DataType::{Numeric, String as Text};

    let params: [(&str, DataType, Option<&str>); 19] = [
        ("kpoint_grid", Text, None),
        ("kpoint_grid_offset", Text, None),
        ("ENCUT", Numeric, Some("eV")),
        ("NIONS", Numeric, None),
        ("NELECT", Numeric, None),
        ("ISIF", Numeric, None),
        ("ISPIN", Numeric, None),
        ("Walltime", Text, None),
        ("Number Of CPUs", Numeric, None),
        ("Maximum virtual memory", Numeric, Some("MB")),
        ("Max jobfs disk use", Numeric, Some("MB")),
        ("NSW", Numeric, None),
        ("IBRION", Numeric, None),
        ("ISMEAR", Numeric, None),
        ("POTIM", Numeric, None),
        ("MAGMOM", Text, None),
        ("EDIFF", Numeric, None),
        ("EDIFFG", Numeric, None),
        ("NELM", Numeric, None),
    ];

    SchemaDefinition {
        namespace: "http://tardis.edu.au/schemas/vasp/1".to_string(),
        name: "vasp 1.0".to_string(),
        parameters: params
            .into_iter()
            .map(|(name, data_type, units)| ParameterDef {
                name: name.to_string(),
                data_type,
                units: units.map(ToOwned::to_owned),
                source: None,
            })
            .collect(),
    }
}

pub fn get_schema(
    connection: &Connection,
    namespace: &str,
    name: &str,
) -> Result<Schema, ExtractError> {
    let schema_id: Option<i64> = connection
        .query_row(
            "SELECT schema_id FROM schemas WHERE namespace = ?1 AND name = ?2",
            params![namespace, name],
            |row| row.get(0),
        )
        .optional()?;

    let Some(schema_id) = schema_id else {
        return Err(ExtractError::SchemaNotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
    };

    Ok(Schema {
        schema_id,
        namespace: namespace.to_string(),
        name: name.to_string(),
        parameters: load_parameters(connection, schema_id)?,
    })
}

pub fn list_schemas(connection: &Connection) -> Result<Vec<Schema>, ExtractError> {
    let mut statement =
        connection.prepare("SELECT namespace, name FROM schemas ORDER BY schema_id")?;
    let keys = statement
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    keys.iter()
        .map(|(namespace, name)| get_schema(connection, namespace, name))
        .collect()
}

/// Registers `definition`, keeping stored schemas immutable once a parameter
/// set references them.
pub fn register_schema(
    connection: &mut Connection,
    definition: &SchemaDefinition,
) -> Result<RegisterOutcome, ExtractError> {
    let existing = match get_schema(connection, &definition.namespace, &definition.name) {
        Ok(schema) => Some(schema),
        Err(ExtractError::SchemaNotFound { .. }) => None,
        Err(err) => return Err(err),
    };

    let tx = connection.transaction()?;
    let outcome = match existing {
        Some(schema) if schema.definition() == *definition => {
            debug!(namespace = %definition.namespace, name = %definition.name, "schema unchanged");
            RegisterOutcome::Unchanged
        }
        Some(schema) => {
            let referenced: i64 = tx.query_row(
                "SELECT COUNT(*) FROM parameter_sets WHERE schema_id = ?1",
                [schema.schema_id],
                |row| row.get(0),
            )?;
            if referenced > 0 {
                return Err(ExtractError::SchemaInUse {
                    namespace: definition.namespace.clone(),
                    name: definition.name.clone(),
                });
            }

            tx.execute(
                "DELETE FROM parameter_names WHERE schema_id = ?1",
                [schema.schema_id],
            )?;
            insert_parameters(&tx, schema.schema_id, &definition.parameters)?;
            RegisterOutcome::Updated
        }
        None => {
            tx.execute(
                "INSERT INTO schemas(namespace, name, registered_at) VALUES(?1, ?2, ?3)",
                params![definition.namespace, definition.name, now_utc_string()],
            )?;
            let schema_id = tx.last_insert_rowid();
            insert_parameters(&tx, schema_id, &definition.parameters)?;
            RegisterOutcome::Created
        }
    };
    tx.commit()?;

    if outcome != RegisterOutcome::Unchanged {
        info!(
            namespace = %definition.namespace,
            name = %definition.name,
            parameters = definition.parameters.len(),
            outcome = ?outcome,
            "registered schema"
        );
    }

    Ok(outcome)
}

fn insert_parameters(
    connection: &Connection,
    schema_id: i64,
    parameters: &[ParameterDef],
) -> Result<(), ExtractError> {
    let mut statement = connection.prepare(
        "
        INSERT INTO parameter_names(schema_id, name, data_type, units, order_index, source)
        VALUES(?1, ?2, ?3, ?4, ?5, ?6)
        ",
    )?;

    for (index, param) in parameters.iter().enumerate() {
        statement.execute(params![
            schema_id,
            param.name,
            param.data_type.as_str(),
            param.units,
            index as i64,
            param.source.map(FormatTag::as_str),
        ])?;
    }

    Ok(())
}

fn load_parameters(
    connection: &Connection,
    schema_id: i64,
) -> Result<Vec<StoredParameter>, ExtractError> {
    let mut statement = connection.prepare(
        "
        SELECT param_id, name, data_type, units, order_index, source
        FROM parameter_names
        WHERE schema_id = ?1
        ORDER BY order_index, param_id
        ",
    )?;

    let rows = statement.query_map([schema_id], |row| {
        let data_type: String = row.get(2)?;
        let source: Option<String> = row.get(5)?;
        Ok(StoredParameter {
            param_id: row.get(0)?,
            order_index: row.get(4)?,
            def: ParameterDef {
                name: row.get(1)?,
                data_type: DataType::parse(&data_type).unwrap_or(DataType::String),
                units: row.get(3)?,
                source: source.as_deref().and_then(FormatTag::parse),
            },
        })
    })?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
