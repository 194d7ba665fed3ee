use std::collections::BTreeMap;
use std::path::PathBuf;

use super::*;
use crate::error::ExtractError;
use crate::extract::{FormatTag, RawValue};

fn small_schema() -> SchemaDefinition {
    SchemaDefinition {
        namespace: "http://example.org/schemas/relax/1".to_string(),
        name: "relax 1.0".to_string(),
        parameters: vec![
            ParameterDef {
                name: "ENCUT".to_string(),
                data_type: DataType::Numeric,
                units: Some("eV".to_string()),
                source: None,
            },
            ParameterDef {
                name: "kpoint_grid".to_string(),
                data_type: DataType::String,
                units: None,
                source: Some(FormatTag::Kpoints),
            },
            ParameterDef {
                name: "NSW".to_string(),
                data_type: DataType::Numeric,
                units: None,
                source: None,
            },
        ],
    }
}

fn staged_dataset(connection: &mut rusqlite::Connection, name: &str) -> (tempfile::TempDir, i64) {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("INCAR");
    std::fs::write(&path, "ENCUT = 400\n").expect("file should be written");
    let dataset_id = stage_dataset(connection, name, "", None, &[path]).expect("stage dataset");
    (dir, dataset_id)
}

fn mapping(pairs: &[(&str, RawValue)]) -> BTreeMap<String, RawValue> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

#[test]
fn register_then_get_schema_preserves_parameter_order() {
    let mut connection = open_in_memory_store();
    let outcome = register_schema(&mut connection, &small_schema()).expect("register schema");
    assert_eq!(outcome, RegisterOutcome::Created);

    let schema = get_schema(&connection, "http://example.org/schemas/relax/1", "relax 1.0")
        .expect("schema should be found");
    let names: Vec<&str> = schema
        .parameters
        .iter()
        .map(|param| param.def.name.as_str())
        .collect();
    assert_eq!(names, vec!["ENCUT", "kpoint_grid", "NSW"]);
    assert_eq!(schema.definition(), small_schema());
    assert_eq!(
        schema.parameter("kpoint_grid").and_then(|param| param.def.source),
        Some(FormatTag::Kpoints)
    );
}

#[test]
fn get_schema_requires_exact_namespace_and_name() {
    let mut connection = open_in_memory_store();
    register_schema(&mut connection, &small_schema()).expect("register schema");

    let err = get_schema(&connection, "http://example.org/schemas/relax/1", "relax 2.0")
        .expect_err("name mismatch");
    assert!(matches!(err, ExtractError::SchemaNotFound { .. }));
    assert_eq!(err.kind(), "schema_not_found");
}

#[test]
fn register_schema_is_idempotent_and_updates_unreferenced_schema() {
    let mut connection = open_in_memory_store();
    register_schema(&mut connection, &small_schema()).expect("register schema");
    assert_eq!(
        register_schema(&mut connection, &small_schema()).expect("re-register"),
        RegisterOutcome::Unchanged
    );

    let mut changed = small_schema();
    changed.parameters.pop();
    assert_eq!(
        register_schema(&mut connection, &changed).expect("update"),
        RegisterOutcome::Updated
    );
    assert_eq!(list_schemas(&connection).expect("list")[0].parameters.len(), 2);
}

#[test]
fn register_schema_refuses_to_change_referenced_schema() {
    let mut connection = open_in_memory_store();
    register_schema(&mut connection, &small_schema()).expect("register schema");
    let schema = get_schema(&connection, "http://example.org/schemas/relax/1", "relax 1.0")
        .expect("schema");
    let (_dir, dataset_id) = staged_dataset(&mut connection, "relax-a");
    save_metadata(
        &mut connection,
        dataset_id,
        &schema,
        &mapping(&[("ENCUT", RawValue::numeric("400"))]),
        ExistingPolicy::Replace,
    )
    .expect("save");

    let mut changed = small_schema();
    changed.parameters.pop();
    let err = register_schema(&mut connection, &changed).expect_err("schema in use");
    assert!(matches!(err, ExtractError::SchemaInUse { .. }));
}

#[test]
fn save_then_get_metadata_round_trips_values_in_schema_order() {
    let mut connection = open_in_memory_store();
    register_schema(&mut connection, &small_schema()).expect("register schema");
    let schema = get_schema(&connection, "http://example.org/schemas/relax/1", "relax 1.0")
        .expect("schema");
    let (_dir, dataset_id) = staged_dataset(&mut connection, "relax-a");

    let written = save_metadata(
        &mut connection,
        dataset_id,
        &schema,
        &mapping(&[
            ("NSW", RawValue::numeric("0")),
            ("kpoint_grid", RawValue::text(" 4  4  4\n")),
            ("ENCUT", RawValue::numeric("520.0")),
            ("NOT_IN_SCHEMA", RawValue::numeric("1")),
        ]),
        ExistingPolicy::Replace,
    )
    .expect("save");
    assert_eq!(written, 3);

    let entries = get_metadata(&connection, dataset_id, &schema).expect("get metadata");
    let rendered: Vec<(&str, DataType, String)> = entries
        .iter()
        .map(|entry| (entry.key.as_str(), entry.data_type, entry.value.to_string()))
        .collect();
    assert_eq!(
        rendered,
        vec![
            ("ENCUT", DataType::Numeric, "520.0".to_string()),
            ("kpoint_grid", DataType::String, " 4  4  4\n".to_string()),
            ("NSW", DataType::Numeric, "0.0".to_string()),
        ]
    );
    assert_eq!(
        entries[0].value,
        ParamValue::Numeric {
            value: 520.0,
            literal: "520.0".to_string()
        }
    );
}

#[test]
fn save_metadata_leaves_missing_keys_unset() {
    let mut connection = open_in_memory_store();
    register_schema(&mut connection, &small_schema()).expect("register schema");
    let schema = get_schema(&connection, "http://example.org/schemas/relax/1", "relax 1.0")
        .expect("schema");
    let (_dir, dataset_id) = staged_dataset(&mut connection, "relax-a");

    save_metadata(
        &mut connection,
        dataset_id,
        &schema,
        &mapping(&[("ENCUT", RawValue::numeric("400"))]),
        ExistingPolicy::Replace,
    )
    .expect("save");

    let entries = get_metadata(&connection, dataset_id, &schema).expect("get metadata");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, "ENCUT");
}

#[test]
fn save_metadata_rejects_malformed_numeric_without_writing() {
    let mut connection = open_in_memory_store();
    register_schema(&mut connection, &small_schema()).expect("register schema");
    let schema = get_schema(&connection, "http://example.org/schemas/relax/1", "relax 1.0")
        .expect("schema");
    let (_dir, dataset_id) = staged_dataset(&mut connection, "relax-a");

    let err = save_metadata(
        &mut connection,
        dataset_id,
        &schema,
        &mapping(&[
            ("ENCUT", RawValue::text("high")),
            ("NSW", RawValue::text("5*2")),
            ("kpoint_grid", RawValue::text(" 4  4  4\n")),
        ]),
        ExistingPolicy::Replace,
    )
    .expect_err("malformed values");

    match err {
        ExtractError::MalformedValue(values) => {
            let keys: Vec<&str> = values.iter().map(|value| value.key.as_str()).collect();
            assert_eq!(keys, vec!["ENCUT", "NSW"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!has_parameter_set(&connection, dataset_id, schema.schema_id).expect("lookup"));
}

#[test]
fn save_metadata_replace_policy_rewrites_set_in_place() {
    let mut connection = open_in_memory_store();
    register_schema(&mut connection, &small_schema()).expect("register schema");
    let schema = get_schema(&connection, "http://example.org/schemas/relax/1", "relax 1.0")
        .expect("schema");
    let (_dir, dataset_id) = staged_dataset(&mut connection, "relax-a");

    for encut in ["400", "520"] {
        save_metadata(
            &mut connection,
            dataset_id,
            &schema,
            &mapping(&[("ENCUT", RawValue::numeric(encut))]),
            ExistingPolicy::Replace,
        )
        .expect("save");
    }

    let sets = count_rows(&connection, "SELECT COUNT(*) FROM parameter_sets").expect("count");
    let values = count_rows(&connection, "SELECT COUNT(*) FROM parameter_values").expect("count");
    assert_eq!((sets, values), (1, 1));

    let entries = get_metadata(&connection, dataset_id, &schema).expect("get metadata");
    assert_eq!(entries[0].value.as_f64(), Some(520.0));
}

#[test]
fn save_metadata_reject_policy_reports_duplicate_set() {
    let mut connection = open_in_memory_store();
    register_schema(&mut connection, &small_schema()).expect("register schema");
    let schema = get_schema(&connection, "http://example.org/schemas/relax/1", "relax 1.0")
        .expect("schema");
    let (_dir, dataset_id) = staged_dataset(&mut connection, "relax-a");
    let values = mapping(&[("ENCUT", RawValue::numeric("400"))]);

    save_metadata(&mut connection, dataset_id, &schema, &values, ExistingPolicy::Reject)
        .expect("first save");
    let err = save_metadata(&mut connection, dataset_id, &schema, &values, ExistingPolicy::Reject)
        .expect_err("duplicate");

    match err {
        ExtractError::DuplicateParameterSet { dataset, .. } => assert_eq!(dataset, "relax-a"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn get_metadata_without_set_reports_missing_parameter_set() {
    let mut connection = open_in_memory_store();
    register_schema(&mut connection, &small_schema()).expect("register schema");
    let schema = get_schema(&connection, "http://example.org/schemas/relax/1", "relax 1.0")
        .expect("schema");
    let (_dir, dataset_id) = staged_dataset(&mut connection, "relax-a");

    let err = get_metadata(&connection, dataset_id, &schema).expect_err("no set");
    assert_eq!(err.kind(), "parameter_set_not_found");
}

#[test]
fn values_cannot_reference_another_schemas_parameter() {
    let mut connection = open_in_memory_store();
    register_schema(&mut connection, &small_schema()).expect("register schema");
    register_schema(&mut connection, &default_vasp_schema()).expect("register vasp");
    let relax = get_schema(&connection, "http://example.org/schemas/relax/1", "relax 1.0")
        .expect("schema");
    let vasp = get_schema(&connection, "http://tardis.edu.au/schemas/vasp/1", "vasp 1.0")
        .expect("schema");
    let (_dir, dataset_id) = staged_dataset(&mut connection, "relax-a");
    save_metadata(
        &mut connection,
        dataset_id,
        &relax,
        &mapping(&[("ENCUT", RawValue::numeric("400"))]),
        ExistingPolicy::Replace,
    )
    .expect("save");

    let set_id: i64 = connection
        .query_row("SELECT set_id FROM parameter_sets", [], |row| row.get(0))
        .expect("set id");
    let foreign_param = vasp.parameter("NIONS").expect("NIONS").param_id;

    let result = connection.execute(
        "
        INSERT INTO parameter_values(set_id, param_id, schema_id, numeric_value, string_value)
        VALUES(?1, ?2, ?3, 216.0, '216')
        ",
        rusqlite::params![set_id, foreign_param, relax.schema_id],
    );
    assert!(result.is_err());
}

#[test]
fn stage_dataset_replaces_file_list_and_keeps_order() {
    let mut connection = open_in_memory_store();
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let paths: Vec<PathBuf> = ["POSCAR", "INCAR", "KPOINTS"]
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            std::fs::write(&path, name).expect("file should be written");
            path
        })
        .collect();

    let first = stage_dataset(&mut connection, "ds", "first", None, &paths).expect("stage");
    let schema_ref = SchemaRef::new("ns", "name");
    let second = stage_dataset(&mut connection, "ds", "second", Some(&schema_ref), &paths[..2])
        .expect("restage");
    assert_eq!(first, second);

    let files = dataset_files(&connection, first).expect("files");
    let names: Vec<&str> = files.iter().map(|file| file.filename.as_str()).collect();
    assert_eq!(names, vec!["POSCAR", "INCAR"]);

    let record = find_dataset(&connection, "ds").expect("dataset");
    assert_eq!(record.description, "second");
    assert_eq!(record.schema_ref, Some(schema_ref));
    assert!(record.fingerprint.is_none());

    mark_extracted(&connection, first, "abc").expect("mark");
    let record = &list_datasets(&connection).expect("list")[0];
    assert_eq!(record.fingerprint.as_deref(), Some("abc"));
    assert!(record.extracted_at.is_some());
}

#[test]
fn stage_dataset_fails_for_missing_file() {
    let mut connection = open_in_memory_store();
    let missing = PathBuf::from("/nonexistent/hpcmeta/OUTCAR");
    let err = stage_dataset(&mut connection, "ds", "", None, &[missing]).expect_err("missing");
    assert_eq!(err.kind(), "io");
    assert!(matches!(
        find_dataset(&connection, "ds"),
        Err(ExtractError::DatasetNotFound(_))
    ));
}

#[test]
fn discover_files_lists_regular_files_sorted() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    for name in ["POSCAR", "INCAR", "OUTCAR"] {
        std::fs::write(dir.path().join(name), "").expect("file should be written");
    }
    std::fs::create_dir(dir.path().join("subdir")).expect("subdir");

    let files = discover_files(dir.path()).expect("discover");
    let names: Vec<String> = files
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["INCAR", "OUTCAR", "POSCAR"]);
}

#[test]
fn ensure_schema_is_repeatable_on_an_existing_store() {
    let connection = open_in_memory_store();
    super::db_setup::ensure_schema(&connection).expect("second initialization");

    let mut statement = connection
        .prepare("PRAGMA table_info(datasets)")
        .expect("table info");
    let columns: Vec<String> = statement
        .query_map([], |row| row.get(1))
        .expect("columns")
        .collect::<rusqlite::Result<_>>()
        .expect("column names");
    assert!(columns.iter().any(|name| name == "schema_namespace"));
    assert!(columns.iter().any(|name| name == "schema_name"));

    let version: String = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = 'db_schema_version'",
            [],
            |row| row.get(0),
        )
        .expect("version row");
    assert_eq!(version, DB_SCHEMA_VERSION);
}
