use serde::Serialize;

use crate::store::SchemaRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetStatus {
    Extracted,
    UpToDate,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetOutcome {
    pub dataset_id: i64,
    pub dataset: String,
    pub status: DatasetStatus,
    pub schema: Option<SchemaRef>,
    pub formats: Vec<String>,
    pub values_written: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetFailure {
    pub dataset_id: i64,
    pub dataset: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractReport {
    pub outcomes: Vec<DatasetOutcome>,
    pub failures: Vec<DatasetFailure>,
}

impl ExtractReport {
    pub fn count(&self, status: DatasetStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractPaths {
    pub data_root: String,
    pub db_path: String,
    pub report_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractCounts {
    pub datasets_total: usize,
    pub datasets_extracted: usize,
    pub datasets_up_to_date: usize,
    pub datasets_failed: usize,
    pub parameter_sets_total: i64,
    pub parameter_values_total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub default_schema: SchemaRef,
    pub on_existing: String,
    pub force: bool,
    pub paths: ExtractPaths,
    pub counts: ExtractCounts,
    pub report: ExtractReport,
}
