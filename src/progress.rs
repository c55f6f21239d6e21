//! Progress normalization
//!
//! The service reports progress as free-form text: sometimes `"35"`, sometimes
//! `"35%"`, sometimes a phase label. [`normalize`] turns all of these into a single
//! display form without ever inventing information.

/// Convert a raw progress value into a percentage string
///
/// - empty input stays empty
/// - input already containing `%` is returned unchanged
/// - input with a leading number becomes that number followed by `%`
///   (`"42"` → `"42%"`, `"12.50"` → `"12.5%"`)
/// - anything else is passed through unchanged
///
/// The function is idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() || raw.contains('%') {
        return raw.to_string();
    }

    match leading_number(raw) {
        Some(value) => format!("{}%", display_number(value)),
        None => raw.to_string(),
    }
}

/// Shortest round-trip rendering of `value` in the notation browsers use
///
/// Magnitudes in `[1e-6, 1e21)` are written out in full, anything else in
/// exponent form with an explicit exponent sign (`1e+21`, `1e-7`). Negative zero
/// prints as `0`.
fn display_number(value: f64) -> String {
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return value.to_string();
    }

    let formatted = format!("{value:e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => formatted,
    }
}

/// Parse the longest decimal number at the start of `raw`, after leading whitespace
///
/// Accepts an optional sign, then either `Infinity` or digits with an optional
/// fraction and an optional exponent. Trailing text after the number is ignored.
/// Literals too large for `f64` come back infinite.
fn leading_number(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    if s[end..].starts_with("Infinity") {
        return Some(if bytes.first() == Some(&b'-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        if digits > 0 || frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}
