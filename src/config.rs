use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::{ExistingPolicy, SchemaDefinition, SchemaRef, default_vasp_schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Schema used for datasets staged without their own schema reference.
    pub default_namespace: String,
    pub default_schema_name: String,
    pub on_existing: ExistingPolicy,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        let vasp = default_vasp_schema();
        Self {
            default_namespace: vasp.namespace,
            default_schema_name: vasp.name,
            on_existing: ExistingPolicy::Replace,
        }
    }
}

impl ExtractConfig {
    pub fn default_schema(&self) -> SchemaRef {
        SchemaRef::new(&self.default_namespace, &self.default_schema_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extract: ExtractConfig,
    pub schemas: Vec<SchemaDefinition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extract: ExtractConfig::default(),
            schemas: vec![default_vasp_schema()],
        }
    }
}

impl Config {
    /// Reads a TOML config, or returns the built-in defaults when no path
    /// is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        info!(path = %path.display(), schemas = config.schemas.len(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for schema in &self.schemas {
            if schema.namespace.trim().is_empty() || schema.name.trim().is_empty() {
                bail!("schema entries need a namespace and a name");
            }
            let mut seen = std::collections::HashSet::new();
            for param in &schema.parameters {
                if !seen.insert(param.name.as_str()) {
                    bail!(
                        "parameter {} declared twice in schema {} ({})",
                        param.name,
                        schema.namespace,
                        schema.name
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FormatTag;
    use crate::store::DataType;

    #[test]
    fn default_config_registers_vasp_schema() {
        let config = Config::default();
        assert_eq!(config.schemas.len(), 1);
        assert_eq!(
            config.extract.default_schema(),
            SchemaRef::new("http://tardis.edu.au/schemas/vasp/1", "vasp 1.0")
        );
        assert_eq!(config.extract.on_existing, ExistingPolicy::Replace);
    }

    #[test]
    fn from_toml_reads_schemas_and_sources() {
        let raw = r#"
            [extract]
            default_namespace = "http://example.org/schemas/relax/1"
            default_schema_name = "relax 1.0"
            on_existing = "reject"

            [[schemas]]
            namespace = "http://example.org/schemas/relax/1"
            name = "relax 1.0"

            [[schemas.parameters]]
            name = "NIONS"
            data_type = "numeric"
            source = "poscar"

            [[schemas.parameters]]
            name = "Walltime"
            data_type = "string"
        "#;

        let config = Config::from_toml(raw).expect("config should parse");
        assert_eq!(config.extract.on_existing, ExistingPolicy::Reject);
        assert_eq!(config.schemas.len(), 1);

        let params = &config.schemas[0].parameters;
        assert_eq!(params[0].data_type, DataType::Numeric);
        assert_eq!(params[0].source, Some(FormatTag::Poscar));
        assert_eq!(params[1].data_type, DataType::String);
        assert_eq!(params[1].source, None);
    }

    #[test]
    fn from_toml_rejects_duplicate_parameters() {
        let raw = r#"
            [[schemas]]
            namespace = "ns"
            name = "dup"

            [[schemas.parameters]]
            name = "ENCUT"
            data_type = "numeric"

            [[schemas.parameters]]
            name = "ENCUT"
            data_type = "string"
        "#;

        assert!(Config::from_toml(raw).is_err());
    }
}
