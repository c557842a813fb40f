//! `format-number()` picture strings over named decimal formats.

use crate::error::TransformError;

#[derive(Debug, Clone)]
pub struct DecimalFormat {
    pub decimal_separator: char,
    pub grouping_separator: char,
    pub pattern_separator: char,
    pub minus_sign: char,
    pub zero_digit: char,
    pub digit: char,
    pub percent: char,
    pub per_mille: char,
    pub infinity: String,
    pub nan: String,
}

impl Default for DecimalFormat {
    fn default() -> Self {
        DecimalFormat {
            decimal_separator: '.',
            grouping_separator: ',',
            pattern_separator: ';',
            minus_sign: '-',
            zero_digit: '0',
            digit: '#',
            percent: '%',
            per_mille: '‰',
            infinity: "Infinity".to_string(),
            nan: "NaN".to_string(),
        }
    }
}

/// The registry name of the format used when no third argument is given.
pub const DEFAULT_FORMAT_NAME: &str = "_default";

struct SubPattern {
    prefix: String,
    integer: Vec<char>,
    fraction: Vec<char>,
    suffix: String,
    multiplier: f64,
}

/// Formats `value` against `pattern` under `format`.
pub fn format_number(
    value: f64,
    pattern: &str,
    format: &DecimalFormat,
) -> Result<String, TransformError> {
    if value.is_nan() {
        return Ok(format.nan.clone());
    }

    let mut halves = pattern.splitn(2, format.pattern_separator);
    let positive_src = halves.next().unwrap_or("");
    let negative_src = halves.next();

    let negative = value < 0.0;
    let (sub_src, prepend_minus) = if negative {
        match negative_src {
            Some(neg) => (neg, false),
            None => (positive_src, true),
        }
    } else {
        (positive_src, false)
    };
    let sub = parse_sub_pattern(sub_src, format)?;

    let magnitude = value.abs() * sub.multiplier;
    if magnitude.is_infinite() {
        let mut out = String::new();
        if prepend_minus {
            out.push(format.minus_sign);
        }
        out.push_str(&sub.prefix);
        out.push_str(&format.infinity);
        out.push_str(&sub.suffix);
        return Ok(out);
    }

    let fraction_slots = sub.fraction.iter().filter(|&&c| is_digit_slot(c, format)).count();
    let rendered = format!("{:.*}", fraction_slots, magnitude);
    let (int_digits, frac_digits) = match rendered.split_once('.') {
        Some((i, f)) => (i, f),
        None => (rendered.as_str(), ""),
    };

    let mut out = String::new();
    if prepend_minus {
        out.push(format.minus_sign);
    }
    out.push_str(&sub.prefix);
    out.push_str(&format_integer_part(int_digits, &sub.integer, format));
    let frac = format_fraction_part(frac_digits, &sub.fraction, format);
    if !frac.is_empty() {
        out.push(format.decimal_separator);
        out.push_str(&frac);
    }
    out.push_str(&sub.suffix);
    Ok(out)
}

fn is_digit_slot(c: char, format: &DecimalFormat) -> bool {
    c == format.zero_digit || c == format.digit
}

fn is_pattern_char(c: char, format: &DecimalFormat) -> bool {
    is_digit_slot(c, format) || c == format.grouping_separator || c == format.decimal_separator
}

fn parse_sub_pattern(src: &str, format: &DecimalFormat) -> Result<SubPattern, TransformError> {
    let chars: Vec<char> = src.chars().collect();
    let start = chars
        .iter()
        .position(|&c| is_pattern_char(c, format))
        .ok_or_else(|| {
            TransformError::Execution(format!("picture '{}' has no digit pattern", src))
        })?;
    let end = chars.len()
        - chars
            .iter()
            .rev()
            .position(|&c| is_pattern_char(c, format))
            .unwrap_or(0);

    let prefix: String = chars[..start].iter().collect();
    let suffix: String = chars[end..].iter().collect();
    let core: Vec<char> = chars[start..end].to_vec();

    let (integer, fraction) = match core.iter().position(|&c| c == format.decimal_separator) {
        Some(dot) => (core[..dot].to_vec(), core[dot + 1..].to_vec()),
        None => (core, Vec::new()),
    };

    let mut multiplier = 1.0;
    if src.contains(format.percent) {
        multiplier = 100.0;
    } else if src.contains(format.per_mille) {
        multiplier = 1000.0;
    }

    Ok(SubPattern {
        prefix,
        integer,
        fraction,
        suffix,
        multiplier,
    })
}

/// Fills the integer picture right-to-left. Grouping separators are kept
/// only while digits remain; digits beyond the picture are prepended.
fn format_integer_part(digits: &str, picture: &[char], format: &DecimalFormat) -> String {
    let mut source: Vec<char> = digits.chars().collect();
    // "0" from the float formatter counts as no significant digits when the
    // picture has no forced slot.
    if source == ['0'] && !picture.contains(&format.zero_digit) {
        source.clear();
    }

    let mut out_rev: Vec<char> = Vec::new();
    for &pc in picture.iter().rev() {
        if pc == format.grouping_separator {
            if !source.is_empty() {
                out_rev.push(format.grouping_separator);
            }
        } else if pc == format.zero_digit {
            out_rev.push(source.pop().unwrap_or('0'));
        } else if let Some(d) = source.pop() {
            out_rev.push(d);
        }
    }
    // Overflow digits.
    while let Some(d) = source.pop() {
        out_rev.push(d);
    }
    out_rev.into_iter().rev().collect()
}

/// Fills the fraction picture left-to-right: `0` forces a digit, `#` keeps
/// one only while significant digits remain.
fn format_fraction_part(digits: &str, picture: &[char], format: &DecimalFormat) -> String {
    let source: Vec<char> = digits.chars().collect();
    let forced = picture
        .iter()
        .filter(|&&c| c == format.zero_digit)
        .count();
    let last_significant = source
        .iter()
        .rposition(|&d| d != '0')
        .map(|p| p + 1)
        .unwrap_or(0);
    let keep = forced.max(last_significant);

    source.into_iter().take(keep).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(value: f64, pattern: &str) -> String {
        format_number(value, pattern, &DecimalFormat::default()).unwrap()
    }

    #[test]
    fn plain_patterns() {
        assert_eq!(fmt(1234.6, "0"), "1235");
        assert_eq!(fmt(3.0, "0.00"), "3.00");
        assert_eq!(fmt(3.456, "0.00"), "3.46");
        assert_eq!(fmt(0.5, "#.##"), ".5");
    }

    #[test]
    fn grouping() {
        assert_eq!(fmt(123456.0, "###,###"), "123,456");
        assert_eq!(fmt(42.0, "#,##0"), "42");
        assert_eq!(fmt(1234.5, "#,##0.00"), "1,234.50");
        // Digits past the picture are prepended as-is.
        assert_eq!(fmt(1234567.0, "#,##0"), "1234,567");
    }

    #[test]
    fn negative_patterns() {
        assert_eq!(fmt(-1234.5, "#,##0.00;(#,##0.00)"), "(1,234.50)");
        assert_eq!(fmt(-3.0, "0.0"), "-3.0");
    }

    #[test]
    fn zero_padding_and_overflow() {
        assert_eq!(fmt(7.0, "000"), "007");
        assert_eq!(fmt(123456.0, "00"), "123456");
    }

    #[test]
    fn percent_multiplies() {
        assert_eq!(fmt(0.25, "0%"), "25%");
    }

    #[test]
    fn specials() {
        assert_eq!(fmt(f64::NAN, "0"), "NaN");
        assert_eq!(fmt(f64::INFINITY, "0"), "Infinity");
        assert_eq!(fmt(f64::NEG_INFINITY, "0.0;(0.0)"), "(Infinity)");
    }

    #[test]
    fn custom_format_symbols() {
        let format = DecimalFormat {
            decimal_separator: ',',
            grouping_separator: '.',
            ..DecimalFormat::default()
        };
        assert_eq!(
            format_number(1234.5, "#.##0,00", &format).unwrap(),
            "1.234,50"
        );
    }
}
