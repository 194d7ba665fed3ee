use std::sync::LazyLock;

use regex::Regex;

use super::{Extracted, RawValue};

struct AccountingField {
    key: &'static str,
    pattern: Regex,
    numeric: bool,
}

static FIELDS: LazyLock<Vec<AccountingField>> = LazyLock::new(|| {
    let field = |key, pattern: &str, numeric| AccountingField {
        key,
        pattern: Regex::new(pattern).expect("accounting field regex is valid"),
        numeric,
    };

    vec![
        field(
            "Walltime",
            r"(?mi)^\s*(?:elapsed\s+time|wall\s*time(?:\s+used)?)\s*:\s*(\d+:\d{2}:\d{2})\b",
            false,
        ),
        field(
            "Number Of CPUs",
            r"(?mi)^\s*(?:number\s+of\s+cpus|ncpus(?:\s+used)?)\s*:\s*(\d+)\b",
            true,
        ),
        field(
            "Maximum virtual memory",
            r"(?mi)^\s*max(?:imum)?\s+virtual\s+memory\s*:\s*(\d+(?:\.\d+)?)",
            true,
        ),
        field(
            "Max jobfs disk use",
            r"(?mi)^\s*max(?:imum)?\s+jobfs\s+disk\s+use\s*:\s*(\d+(?:\.\d+)?)",
            true,
        ),
    ]
});

/// Reads the resource accounting summary PBS appends to job output. Values
/// keep the printed units; only the unit suffix is dropped.
pub fn extract_scheduler_log(text: &str) -> Extracted {
    let mut values = Extracted::new();

    for field in FIELDS.iter() {
        let Some(captures) = field.pattern.captures(text) else {
            continue;
        };
        let literal = &captures[1];
        let value = if field.numeric {
            RawValue::numeric(literal)
        } else {
            RawValue::text(literal)
        };
        values.insert(field.key.to_string(), value);
    }

    values
}
