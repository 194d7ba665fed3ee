//! Per-format parsers for VASP datasets and the merge step that turns their
//! output into one key/value mapping per dataset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::{DataType, Schema};

mod classify;
pub mod coerce;
mod incar;
mod kpoints;
mod outcar;
mod poscar;
mod scheduler_log;

pub use classify::{ClassifiedFile, classify_content, classify_files, classify_name};
pub use incar::extract_incar;
pub use kpoints::extract_kpoints;
pub use outcar::extract_outcar;
pub use poscar::extract_poscar;
pub use scheduler_log::extract_scheduler_log;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatTag {
    Outcar,
    Incar,
    Kpoints,
    Poscar,
    SchedulerLog,
}

impl FormatTag {
    /// Merge precedence: earlier formats win when several report a key.
    pub const PRECEDENCE: [FormatTag; 5] = [
        FormatTag::Outcar,
        FormatTag::Incar,
        FormatTag::Kpoints,
        FormatTag::Poscar,
        FormatTag::SchedulerLog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Outcar => "outcar",
            Self::Incar => "incar",
            Self::Kpoints => "kpoints",
            Self::Poscar => "poscar",
            Self::SchedulerLog => "scheduler_log",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::PRECEDENCE
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(value))
    }
}

/// An extracted literal and the type its shape suggests.
#[derive(Debug, Clone, PartialEq)]
pub struct RawValue {
    pub kind: DataType,
    pub literal: String,
}

impl RawValue {
    pub fn numeric(literal: impl Into<String>) -> Self {
        Self {
            kind: DataType::Numeric,
            literal: literal.into(),
        }
    }

    pub fn text(literal: impl Into<String>) -> Self {
        Self {
            kind: DataType::String,
            literal: literal.into(),
        }
    }
}

pub type Extracted = BTreeMap<String, RawValue>;

pub fn extract_format(tag: FormatTag, text: &str) -> Extracted {
    match tag {
        FormatTag::Outcar => extract_outcar(text),
        FormatTag::Incar => extract_incar(text),
        FormatTag::Kpoints => extract_kpoints(text),
        FormatTag::Poscar => extract_poscar(text),
        FormatTag::SchedulerLog => extract_scheduler_log(text),
    }
}

/// Combines per-format results. Keys pinned to a source by the schema only
/// come from that format; every other key follows `FormatTag::PRECEDENCE`.
pub fn merge_extracted(results: &BTreeMap<FormatTag, Extracted>, schema: &Schema) -> Extracted {
    let mut merged = Extracted::new();
    for tag in FormatTag::PRECEDENCE {
        let Some(extracted) = results.get(&tag) else {
            continue;
        };
        for (key, value) in extracted {
            merged.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    for param in &schema.parameters {
        let Some(source) = param.def.source else {
            continue;
        };
        match results.get(&source).and_then(|values| values.get(&param.def.name)) {
            Some(value) => {
                merged.insert(param.def.name.clone(), value.clone());
            }
            None => {
                merged.remove(&param.def.name);
            }
        }
    }

    check_ion_counts(results);
    merged
}

fn check_ion_counts(results: &BTreeMap<FormatTag, Extracted>) {
    let nions = |tag| {
        results
            .get(&tag)
            .and_then(|values: &Extracted| values.get("NIONS"))
            .and_then(|value| coerce::parse_numeric_literal(&value.literal))
    };

    if let (Some(outcar), Some(poscar)) = (nions(FormatTag::Outcar), nions(FormatTag::Poscar)) {
        if outcar != poscar {
            warn!(outcar, poscar, "NIONS differs between OUTCAR and POSCAR");
        }
    }
}
