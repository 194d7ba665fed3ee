use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::FormatTag;

static SCHEDULER_LOG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+\.o\d+$").expect("scheduler log regex is valid"));

/// A dataset file already read into memory.
#[derive(Debug, Clone)]
pub struct ClassifiedFile {
    pub filename: String,
    pub path: PathBuf,
    pub text: String,
}

pub fn classify_name(filename: &str) -> Option<FormatTag> {
    match filename {
        "OUTCAR" => Some(FormatTag::Outcar),
        "KPOINTS" => Some(FormatTag::Kpoints),
        "INCAR" => Some(FormatTag::Incar),
        "POSCAR" => Some(FormatTag::Poscar),
        name if SCHEDULER_LOG_NAME.is_match(name) => Some(FormatTag::SchedulerLog),
        _ => None,
    }
}

pub fn classify_content(text: &str) -> Option<FormatTag> {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.starts_with(" vasp.") {
        return Some(FormatTag::Outcar);
    }

    if text
        .lines()
        .any(|line| line.trim_start().starts_with("Resource Usage"))
    {
        return Some(FormatTag::SchedulerLog);
    }

    None
}

/// Picks at most one file per format. Filename matches beat content matches;
/// within each pass the first file in dataset order wins.
pub fn classify_files(files: Vec<ClassifiedFile>) -> BTreeMap<FormatTag, ClassifiedFile> {
    let mut chosen = BTreeMap::<FormatTag, ClassifiedFile>::new();
    let mut unnamed = Vec::new();

    for file in files {
        match classify_name(&file.filename) {
            Some(tag) => insert_first(&mut chosen, tag, file),
            None => unnamed.push(file),
        }
    }

    for file in unnamed {
        match classify_content(&file.text) {
            Some(tag) => insert_first(&mut chosen, tag, file),
            None => debug!(file = %file.filename, "no extractor for file"),
        }
    }

    chosen
}

fn insert_first(
    chosen: &mut BTreeMap<FormatTag, ClassifiedFile>,
    tag: FormatTag,
    file: ClassifiedFile,
) {
    if let Some(existing) = chosen.get(&tag) {
        warn!(
            format = tag.as_str(),
            kept = %existing.filename,
            ignored = %file.filename,
            "multiple files for one format, keeping the first"
        );
        return;
    }
    chosen.insert(tag, file);
}
