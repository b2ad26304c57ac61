//! Locale-aware numeric normalization.
//!
//! Converts a raw numeric token extracted from a document (`"1.234.567,89
//! €"`, `"(1.234)"`, `"12,5%"`, …) into an exact [`rust_decimal::Decimal`]
//! with explicit unit/currency/sign metadata. Decimal, not `f64`, is used
//! throughout so repeated additions in the guardrail and derivation engines
//! never drift — the same reasoning the teacher applies to exact byte
//! offsets rather than float ratios when locating chunk boundaries.

use crate::error::{NormalizeError, Result};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;

/// Locale hint used to disambiguate `.`/`,` as thousands/decimal separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocaleHint {
    /// `.` thousands, `,` decimal (e.g. `1.234.567,89`).
    Italian,
    /// `,` thousands, `.` decimal (e.g. `1,234,567.89`).
    Us,
    /// Caller did not supply a hint; detect from the token itself.
    Unknown,
}

/// A scale multiplier applied to a parsed figure, preserved as metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleHint {
    /// No scaling.
    Units,
    /// "values in thousands".
    Thousands,
    /// "values in millions".
    Millions,
}

impl ScaleHint {
    fn multiplier(self) -> Decimal {
        match self {
            Self::Units => Decimal::ONE,
            Self::Thousands => Decimal::from(1_000),
            Self::Millions => Decimal::from(1_000_000),
        }
    }
}

/// The result of normalizing a raw numeric token.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedValue {
    /// The value in base units, after sign/scale/percentage adjustment.
    pub value: Decimal,
    /// `"currency"`, `"percentage"`, `"ratio"`, `"count"`, `"days"`, or
    /// `"quantity"` — left as a free string here; the caller reconciles it
    /// against the ontology's declared `UnitKind`.
    pub unit: &'static str,
    /// ISO currency code, if a currency marker was detected.
    pub currency: Option<String>,
    /// Whether a trailing `%` was present.
    pub is_percentage: bool,
    /// Whether the value parsed as negative (leading `-` or parentheses).
    pub is_negative: bool,
    /// Parser confidence in `[0, 1]`: penalized for ambiguous locale
    /// detection.
    pub confidence: f32,
}

fn currency_symbol_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"[€$£¥]|\b[A-Z]{3}\b").expect("valid regex"))
}

fn currency_code_from_symbol(symbol: &str) -> Option<&'static str> {
    match symbol {
        "€" => Some("EUR"),
        "$" => Some("USD"),
        "£" => Some("GBP"),
        "¥" => Some("JPY"),
        _ => None,
    }
}

/// Normalizes a raw numeric token extracted from a document.
///
/// # Errors
///
/// Returns [`NormalizeError::UnparseableNumber`] if no digits can be
/// recovered from `raw_value`.
pub fn normalize(
    raw_value: &str,
    locale_hint: LocaleHint,
    scale_hint: ScaleHint,
    currency_hint: Option<&str>,
) -> Result<NormalizedValue> {
    let trimmed = raw_value.trim();

    let is_negative = trimmed.starts_with('(') && trimmed.ends_with(')') || trimmed.starts_with('-');
    let is_percentage = trimmed.trim_end().ends_with('%');

    let mut currency = currency_hint.map(str::to_string);
    if currency.is_none() {
        if let Some(m) = currency_symbol_regex().find(trimmed) {
            currency = currency_code_from_symbol(m.as_str()).map(str::to_string);
            if currency.is_none() {
                let code: String = m.as_str().chars().filter(char::is_ascii_uppercase).collect();
                if code.len() == 3 {
                    currency = Some(code);
                }
            }
        }
    }

    let digits_only: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    if digits_only.chars().all(|c| c == '.' || c == ',') || digits_only.is_empty() {
        return Err(NormalizeError::UnparseableNumber {
            raw: raw_value.to_string(),
        }
        .into());
    }

    let (canonical, resolved_confidence_penalty) = resolve_separators(&digits_only, locale_hint);

    let mut value = Decimal::from_str(&canonical).map_err(|_| NormalizeError::UnparseableNumber {
        raw: raw_value.to_string(),
    })?;

    if is_negative {
        value = -value.abs();
    }
    value *= scale_hint.multiplier();
    if is_percentage {
        // The caller divides by 100 only when the metric is declared as a
        // ratio; the raw percentage figure is preserved here.
    }

    let unit = if is_percentage {
        "percentage"
    } else if currency.is_some() {
        "currency"
    } else {
        "count"
    };

    let confidence = 0.97 - resolved_confidence_penalty;

    Ok(NormalizedValue {
        value,
        unit,
        currency,
        is_percentage,
        is_negative,
        confidence,
    })
}

/// Rewrites a digit string containing both `.` and `,` (or just one) into a
/// canonical `Decimal`-parseable form (`,` removed, `.` as decimal point).
/// Returns the canonical string and a confidence penalty applied when the
/// locale had to be guessed rather than supplied.
fn resolve_separators(digits_only: &str, hint: LocaleHint) -> (String, f32) {
    let has_dot = digits_only.contains('.');
    let has_comma = digits_only.contains(',');

    let locale = match hint {
        LocaleHint::Italian | LocaleHint::Us => hint,
        LocaleHint::Unknown => detect_locale(digits_only, has_dot, has_comma),
    };
    let penalty = if matches!(hint, LocaleHint::Unknown) && has_dot && has_comma {
        0.05
    } else {
        0.0
    };

    let canonical = match locale {
        LocaleHint::Italian => digits_only.replace('.', "").replace(',', "."),
        LocaleHint::Us | LocaleHint::Unknown => digits_only.replace(',', ""),
    };
    (canonical, penalty)
}

/// Detects Italian vs. US locale by comparing separator positions: the last
/// separator is the decimal point only if 2-3 digits follow it.
fn detect_locale(digits_only: &str, has_dot: bool, has_comma: bool) -> LocaleHint {
    if has_dot && !has_comma {
        return if trailing_digits_after(digits_only, '.') <= 3 {
            LocaleHint::Us
        } else {
            LocaleHint::Italian
        };
    }
    if has_comma && !has_dot {
        return if trailing_digits_after(digits_only, ',') <= 3 {
            LocaleHint::Italian
        } else {
            LocaleHint::Us
        };
    }
    // Both present: whichever separator appears last is the decimal point.
    let last_dot = digits_only.rfind('.');
    let last_comma = digits_only.rfind(',');
    match (last_dot, last_comma) {
        (Some(d), Some(c)) if d > c => LocaleHint::Us,
        (Some(_), Some(_)) => LocaleHint::Italian,
        _ => LocaleHint::Us,
    }
}

fn trailing_digits_after(s: &str, sep: char) -> usize {
    s.rfind(sep).map_or(0, |pos| s.len() - pos - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_italian_thousands_and_decimal() {
        let result = normalize("1.234.567,89 €", LocaleHint::Unknown, ScaleHint::Units, None).unwrap();
        assert_eq!(result.value, Decimal::from_str("1234567.89").unwrap());
        assert_eq!(result.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_us_thousands_and_decimal() {
        let result = normalize("$1,234,567.89", LocaleHint::Unknown, ScaleHint::Units, None).unwrap();
        assert_eq!(result.value, Decimal::from_str("1234567.89").unwrap());
        assert_eq!(result.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_parenthesized_is_negative() {
        let result = normalize("(1.234)", LocaleHint::Italian, ScaleHint::Units, None).unwrap();
        assert!(result.is_negative);
        assert_eq!(result.value, Decimal::from_str("-1234").unwrap());
    }

    #[test]
    fn test_percentage_suffix() {
        let result = normalize("12,5%", LocaleHint::Italian, ScaleHint::Units, None).unwrap();
        assert!(result.is_percentage);
        assert_eq!(result.value, Decimal::from_str("12.5").unwrap());
    }

    #[test]
    fn test_scale_hint_thousands() {
        let result = normalize("1.234,5", LocaleHint::Italian, ScaleHint::Thousands, None).unwrap();
        assert_eq!(result.value, Decimal::from_str("1234500").unwrap());
    }

    #[test]
    fn test_explicit_locale_hint_overrides_detection() {
        let result = normalize("1.234", LocaleHint::Us, ScaleHint::Units, None).unwrap();
        assert_eq!(result.value, Decimal::from_str("1.234").unwrap());
    }

    #[test]
    fn test_unparseable_number_errors() {
        let result = normalize("n/a", LocaleHint::Unknown, ScaleHint::Units, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_round_trip_italian_value() {
        let original = Decimal::from_str("1234567.89").unwrap();
        let rendered = original.to_string().replace('.', ",");
        let result = normalize(&rendered, LocaleHint::Italian, ScaleHint::Units, None).unwrap();
        assert_eq!(result.value, original);
    }
}
