use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use super::{ExtractOptions, go};
use crate::cli::ExtractArgs;
use crate::commands::{open_with_config, sync_schemas};
use crate::model::{DatasetStatus, ExtractCounts, ExtractPaths, ExtractRunManifest};
use crate::store::{DB_SCHEMA_VERSION, SchemaRef, count_rows};
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(args: ExtractArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let db_path = args.store.resolved_db_path();
    let report_path = args.report_path.clone().unwrap_or_else(|| {
        args.store.manifest_dir().join(format!(
            "extract_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });

    info!(data_root = %args.store.data_root.display(), run_id = %run_id, "starting extract");

    let (config, mut connection) = open_with_config(&args.store)?;
    sync_schemas(&mut connection, &config)?;

    let default_schema = match (&args.namespace, &args.schema_name) {
        (Some(namespace), Some(name)) => SchemaRef::new(namespace, name),
        _ => config.extract.default_schema(),
    };
    let options = ExtractOptions {
        default_schema,
        on_existing: args.on_existing.unwrap_or(config.extract.on_existing),
        force: args.force,
    };

    let report = go(&mut connection, &options)?;

    let counts = ExtractCounts {
        datasets_total: report.outcomes.len(),
        datasets_extracted: report.count(DatasetStatus::Extracted),
        datasets_up_to_date: report.count(DatasetStatus::UpToDate),
        datasets_failed: report.failures.len(),
        parameter_sets_total: count_rows(&connection, "SELECT COUNT(*) FROM parameter_sets")?,
        parameter_values_total: count_rows(&connection, "SELECT COUNT(*) FROM parameter_values")?,
    };
    let failed = counts.datasets_failed;

    let manifest = ExtractRunManifest {
        manifest_version: 1,
        run_id,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: if report.is_success() { "completed" } else { "completed_with_failures" }
            .to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_extract_command(&args),
        default_schema: options.default_schema.clone(),
        on_existing: options.on_existing.as_str().to_string(),
        force: options.force,
        paths: ExtractPaths {
            data_root: args.store.data_root.display().to_string(),
            db_path: db_path.display().to_string(),
            report_path: report_path.display().to_string(),
        },
        counts,
        report,
    };

    write_json_pretty(&report_path, &manifest)?;
    info!(path = %report_path.display(), "wrote extract run manifest");

    for failure in &manifest.report.failures {
        warn!(
            dataset = %failure.dataset,
            kind = %failure.kind,
            message = %failure.message,
            "dataset failed"
        );
    }

    if failed > 0 {
        bail!("{failed} dataset(s) failed extraction, see {}", report_path.display());
    }

    info!(
        extracted = manifest.counts.datasets_extracted,
        up_to_date = manifest.counts.datasets_up_to_date,
        "extract completed"
    );
    Ok(())
}

fn render_extract_command(args: &ExtractArgs) -> String {
    let mut command = format!(
        "hpcmeta extract --data-root {}",
        args.store.data_root.display()
    );
    if let Some(db_path) = &args.store.db_path {
        command.push_str(&format!(" --db-path {}", db_path.display()));
    }
    if let Some(config) = &args.store.config {
        command.push_str(&format!(" --config {}", config.display()));
    }
    if args.force {
        command.push_str(" --force");
    }
    if let Some(policy) = args.on_existing {
        command.push_str(&format!(" --on-existing {}", policy.as_str()));
    }
    if let (Some(namespace), Some(name)) = (&args.namespace, &args.schema_name) {
        command.push_str(&format!(" --namespace {namespace} --schema-name '{name}'"));
    }
    command
}
