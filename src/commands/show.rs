use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::ShowArgs;
use crate::commands::open_with_config;
use crate::store::{MetadataEntry, ParamValue, Schema, find_dataset, get_metadata, get_schema};

#[derive(Debug, Serialize)]
struct EntryOutput<'a> {
    key: &'a str,
    data_type: &'static str,
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    units: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    numeric: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    literal: Option<&'a str>,
}

pub fn run(args: ShowArgs) -> Result<()> {
    let (config, connection) = open_with_config(&args.store)?;

    let dataset = find_dataset(&connection, &args.dataset)?;
    let schema_ref = match (&args.namespace, &args.schema_name) {
        (Some(namespace), Some(name)) => crate::store::SchemaRef::new(namespace, name),
        _ => dataset
            .schema_ref
            .clone()
            .unwrap_or_else(|| config.extract.default_schema()),
    };
    let schema = get_schema(&connection, &schema_ref.namespace, &schema_ref.name)?;
    let entries = get_metadata(&connection, dataset.dataset_id, &schema)
        .with_context(|| format!("failed to read metadata for {}", dataset.name))?;

    if args.json {
        let output: Vec<EntryOutput<'_>> = entries
            .iter()
            .map(|entry| entry_output(entry, &schema))
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{} [{} ({})]", dataset.name, schema.namespace, schema.name);
    if !dataset.description.is_empty() {
        println!("  {}", dataset.description);
    }
    for entry in &entries {
        let output = entry_output(entry, &schema);
        println!(
            "  {:<24} {:<8} {:?} {}",
            output.key,
            output.data_type,
            output.value,
            output.units.unwrap_or_default()
        );
    }

    Ok(())
}

fn entry_output<'a>(entry: &'a MetadataEntry, schema: &'a Schema) -> EntryOutput<'a> {
    let literal = match &entry.value {
        ParamValue::Numeric { literal, .. } => Some(literal.as_str()),
        ParamValue::Text(_) => None,
    };
    EntryOutput {
        key: &entry.key,
        data_type: entry.data_type.as_str(),
        value: entry.value.to_string(),
        units: schema
            .parameter(&entry.key)
            .and_then(|param| param.def.units.as_deref()),
        numeric: entry.value.as_f64(),
        literal,
    }
}
