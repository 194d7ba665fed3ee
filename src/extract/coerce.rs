use std::sync::LazyLock;

use regex::Regex;

use super::RawValue;
use crate::error::MalformedValue;
use crate::store::{DataType, ParamValue};

static NUMERIC_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][-+]?\d+)?$")
        .expect("numeric literal regex is valid")
});

/// Parses integer, decimal and exponent literals. Rejects `inf`, `nan` and
/// anything else `f64::from_str` would accept beyond plain numbers.
pub fn parse_numeric_literal(literal: &str) -> Option<f64> {
    let trimmed = literal.trim();
    if !NUMERIC_LITERAL.is_match(trimmed) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

pub fn coerce_value(
    key: &str,
    raw: &RawValue,
    declared: DataType,
) -> Result<ParamValue, MalformedValue> {
    match declared {
        DataType::String => Ok(ParamValue::Text(raw.literal.clone())),
        DataType::Numeric => match parse_numeric_literal(&raw.literal) {
            Some(value) => Ok(ParamValue::Numeric {
                value,
                literal: raw.literal.trim().to_string(),
            }),
            None => Err(MalformedValue {
                key: key.to_string(),
                literal: raw.literal.clone(),
                expected: declared,
            }),
        },
    }
}

/// Canonical text for a stored number: `400.0`, `0.0001`, `5e-06`, `1e+16`.
pub fn format_numeric(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    // `{:e}` yields the shortest digits that round-trip, e.g. `2.7047e4`.
    let scientific = format!("{:e}", value.abs());
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|ch| *ch != '.').collect();
    let sign = if value.is_sign_negative() { "-" } else { "" };

    if !(-4..16).contains(&exponent) {
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        return format!("{sign}{mantissa}e{exp_sign}{:02}", exponent.abs());
    }

    if exponent < 0 {
        let zeros = "0".repeat((-exponent - 1) as usize);
        return format!("{sign}0.{zeros}{digits}");
    }

    let int_len = exponent as usize + 1;
    if digits.len() <= int_len {
        let padding = "0".repeat(int_len - digits.len());
        format!("{sign}{digits}{padding}.0")
    } else {
        let (int_part, frac_part) = digits.split_at(int_len);
        format!("{sign}{int_part}.{frac_part}")
    }
}
