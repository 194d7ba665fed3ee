use tracing::warn;

use super::{Extracted, RawValue};
use crate::extract::coerce::parse_numeric_literal;

const SCALE_LINE: usize = 1;
const LATTICE_LINES: std::ops::Range<usize> = 2..5;

/// Reads the POSCAR header: scaling factor, lattice vectors and the ion
/// counts (VASP 5 files carry a species line before the counts).
pub fn extract_poscar(text: &str) -> Extracted {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut values = Extracted::new();

    if let Some(scale) = lines.get(SCALE_LINE) {
        let literal = scale.split_whitespace().next().unwrap_or_default();
        if parse_numeric_literal(literal).is_some() {
            values.insert("scaling_factor".to_string(), RawValue::numeric(literal));
        }
    }

    if lines.len() >= LATTICE_LINES.end {
        values.insert(
            "lattice_vectors".to_string(),
            RawValue::text(lines[LATTICE_LINES].concat()),
        );
    }

    let mut counts_line = LATTICE_LINES.end;
    if let Some(species) = lines.get(counts_line) {
        let is_symbols = species
            .split_whitespace()
            .next()
            .is_some_and(|token| token.chars().all(|ch| ch.is_ascii_alphabetic()));
        if is_symbols {
            values.insert("species".to_string(), RawValue::text(species.trim()));
            counts_line += 1;
        }
    }

    if let Some(line) = lines.get(counts_line) {
        let counts: Option<Vec<u64>> = line
            .split_whitespace()
            .map(|token| token.parse::<u64>().ok())
            .collect();
        if let Some(counts) = counts.filter(|counts| !counts.is_empty()) {
            match counts.iter().try_fold(0u64, |acc, n| acc.checked_add(*n)) {
                Some(total) => {
                    values.insert("ion_counts".to_string(), RawValue::text(line.trim()));
                    values.insert("NIONS".to_string(), RawValue::numeric(total.to_string()));
                }
                None => warn!(counts = %line.trim(), "POSCAR ion counts overflow, skipping"),
            }
        }
    }

    values
}
