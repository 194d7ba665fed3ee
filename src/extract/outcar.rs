use std::sync::LazyLock;

use regex::Regex;

use super::{Extracted, RawValue};

static TAG_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][A-Z0-9_]*)\s*=\s*([-+]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][-+]?\d+)?)")
        .expect("OUTCAR tag regex is valid")
});

/// Collects every `NAME = number` pair VASP echoes into OUTCAR. The first
/// occurrence of a name wins, which is the parameter dump near the top of
/// the file rather than later per-step output.
pub fn extract_outcar(text: &str) -> Extracted {
    let mut values = Extracted::new();

    for line in text.lines() {
        for captures in TAG_VALUE.captures_iter(line) {
            let (_, [name, literal]) = captures.extract();
            if !terminates_number(line, captures.get(2).map_or(0, |m| m.end())) {
                continue;
            }
            values
                .entry(name.to_string())
                .or_insert_with(|| RawValue::numeric(literal));
        }
    }

    values
}

// Rejects captures that stop inside a longer token such as `2x2` or `1.0eV`.
fn terminates_number(line: &str, end: usize) -> bool {
    line[end..]
        .chars()
        .next()
        .is_none_or(|ch| ch.is_whitespace() || matches!(ch, ';' | ',' | ')'))
}
