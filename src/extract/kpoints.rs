use super::{Extracted, RawValue};

// comment / number of points / generation mode / grid / shift
const MODE_LINE: usize = 2;
const GRID_LINE: usize = 3;
const OFFSET_LINE: usize = 4;

pub fn extract_kpoints(text: &str) -> Extracted {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut values = Extracted::new();

    if let Some(mode) = lines.get(MODE_LINE) {
        values.insert("kpoint_mode".to_string(), RawValue::text(mode.trim()));
    }
    if let Some(grid) = lines.get(GRID_LINE) {
        values.insert("kpoint_grid".to_string(), RawValue::text(*grid));
    }
    if let Some(offset) = lines.get(OFFSET_LINE) {
        values.insert("kpoint_grid_offset".to_string(), RawValue::text(*offset));
    }

    values
}
