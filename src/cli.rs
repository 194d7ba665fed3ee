use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::store::ExistingPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "hpcmeta",
    version,
    about = "Metadata extraction for VASP datasets produced on HPC clusters"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register the configured schemas in the store.
    Register(RegisterArgs),
    /// Stage a dataset and its files for extraction.
    Stage(StageArgs),
    /// Extract metadata from every staged dataset.
    Extract(ExtractArgs),
    /// Print a dataset's stored metadata.
    Show(ShowArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, default_value = ".cache/hpcmeta")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// TOML file with schema definitions and extraction defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl StoreArgs {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_root.join("hpcmeta.sqlite"))
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.data_root.join("manifests")
    }
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Args, Debug, Clone)]
pub struct StageArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub dataset: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Stage every regular file in this directory, sorted by name.
    #[arg(long, conflicts_with = "files")]
    pub dir: Option<PathBuf>,

    /// Stage these files in the given order.
    #[arg(long = "file")]
    pub files: Vec<PathBuf>,

    #[arg(long, requires = "schema_name")]
    pub namespace: Option<String>,

    #[arg(long, requires = "namespace")]
    pub schema_name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Re-extract datasets even when their files are unchanged.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    #[arg(long, value_enum)]
    pub on_existing: Option<ExistingPolicy>,

    #[arg(long, requires = "schema_name")]
    pub namespace: Option<String>,

    #[arg(long, requires = "namespace")]
    pub schema_name: Option<String>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub dataset: String,

    #[arg(long, requires = "schema_name")]
    pub namespace: Option<String>,

    #[arg(long, requires = "namespace")]
    pub schema_name: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}
