use std::sync::LazyLock;

use regex::Regex;

use super::{Extracted, RawValue};
use crate::extract::coerce::parse_numeric_literal;

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z0-9_]*)\s*=").expect("INCAR assignment regex is valid")
});

/// Parses INCAR tags. A value continued on following lines becomes one
/// verbatim multi-line string (MAGMOM for non-collinear runs, for example).
pub fn extract_incar(text: &str) -> Extracted {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut values = Extracted::new();
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        index += 1;

        let Some(captures) = ASSIGNMENT.captures(line) else {
            continue;
        };
        let key = captures[1].to_ascii_uppercase();
        let after_eq = &line[captures.get(0).map_or(0, |m| m.end())..];

        let block_start = index;
        while index < lines.len() && !ASSIGNMENT.is_match(lines[index]) {
            index += 1;
        }
        let continuation: Vec<&str> = lines[block_start..index]
            .iter()
            .copied()
            .filter(|line| !is_comment(line))
            .collect();
        let content_len = continuation
            .iter()
            .rposition(|line| !line.trim().is_empty())
            .map_or(0, |pos| pos + 1);

        let mut assignments = split_assignments(key, after_eq);
        if content_len == 0 {
            for (name, value) in assignments {
                values.insert(name, classify_literal(value));
            }
            continue;
        }

        // continuation lines belong to the last assignment on the key line
        let Some((last_name, last_value)) = assignments.pop() else {
            continue;
        };
        for (name, value) in assignments {
            values.insert(name, classify_literal(value));
        }
        let mut literal = format!("{last_value}\n");
        for line in &continuation[..content_len] {
            literal.push_str(&strip_comment_keep_newline(line));
        }
        values.insert(last_name, RawValue::text(literal));
    }

    values
}

/// `ISMEAR = -6; SIGMA = 0.05` carries several tags on one line. Values are
/// returned untrimmed with comments and the line ending removed.
fn split_assignments(key: String, after_eq: &str) -> Vec<(String, &str)> {
    let body = strip_comment(after_eq.trim_end_matches('\n'));
    let mut segments = body.split(';');
    let first = segments.next().unwrap_or_default();
    let mut assignments = vec![(key, first)];

    for segment in segments {
        if let Some((name, value)) = segment.split_once('=') {
            let name = name.trim();
            if is_tag_name(name) {
                assignments.push((name.to_ascii_uppercase(), value));
            }
        }
    }

    assignments
}

fn classify_literal(value: &str) -> RawValue {
    let value = value.trim();
    if parse_numeric_literal(value).is_some() {
        RawValue::numeric(value)
    } else {
        RawValue::text(value)
    }
}

fn is_tag_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|ch| ch.is_ascii_alphabetic())
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#') || trimmed.starts_with('!')
}

fn strip_comment(value: &str) -> &str {
    match value.find(['#', '!']) {
        Some(pos) => &value[..pos],
        None => value,
    }
}

fn strip_comment_keep_newline(value: &str) -> String {
    match value.find(['#', '!']) {
        Some(pos) => {
            let mut kept = value[..pos].to_string();
            if value.ends_with('\n') {
                kept.push('\n');
            }
            kept
        }
        None => value.to_string(),
    }
}
