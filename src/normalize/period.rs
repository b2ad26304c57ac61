//! Period-text normalization.
//!
//! Recognizes common period expressions (`FY YYYY`, `Q[1-4] YYYY`, bare
//! `YYYY`, `MM/YYYY`, explicit date ranges, `YTD <month> YYYY`) and
//! resolves them to a canonical [`PeriodKey`] against a caller's
//! [`FiscalCalendar`].

use crate::core::period::{FiscalCalendar, PeriodKey, PeriodType};
use crate::error::{NormalizeError, Result};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

fn fy_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^FY\s*(\d{4})$").expect("valid regex"))
}

fn quarter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^Q([1-4])\s*(\d{4})$").expect("valid regex"))
}

fn bare_year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})$").expect("valid regex"))
}

fn month_year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})/(\d{4})$").expect("valid regex"))
}

fn date_range_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{2})/(\d{2})/(\d{4})\s*[-\u{2013}]\s*(\d{2})/(\d{2})/(\d{4})$")
            .expect("valid regex")
    })
}

fn ytd_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^YTD\s+(\w+)\s+(\d{4})$").expect("valid regex"))
}

fn month_name_to_number(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let table: &[(&str, u32)] = &[
        ("gennaio", 1), ("january", 1), ("jan", 1),
        ("febbraio", 2), ("february", 2), ("feb", 2),
        ("marzo", 3), ("march", 3), ("mar", 3),
        ("aprile", 4), ("april", 4), ("apr", 4),
        ("maggio", 5), ("may", 5),
        ("giugno", 6), ("june", 6), ("jun", 6),
        ("luglio", 7), ("july", 7), ("jul", 7),
        ("agosto", 8), ("august", 8), ("aug", 8),
        ("settembre", 9), ("september", 9), ("sep", 9),
        ("ottobre", 10), ("october", 10), ("oct", 10),
        ("novembre", 11), ("november", 11), ("nov", 11),
        ("dicembre", 12), ("december", 12), ("dec", 12),
    ];
    table.iter().find(|(n, _)| *n == lower).map(|(_, m)| *m)
}

/// Normalizes free-text period expressions against `fiscal_calendar`.
///
/// # Errors
///
/// Returns [`NormalizeError::UnparseablePeriod`] if `text` matches none of
/// the recognized period grammars.
pub fn normalize_period(text: &str, fiscal_calendar: &FiscalCalendar) -> Result<PeriodKey> {
    let trimmed = text.trim();

    if let Some(caps) = fy_regex().captures(trimmed) {
        let year: i32 = caps[1].parse().unwrap_or_default();
        let (start, _) = fiscal_calendar.quarter_bounds(year, 1).ok_or_else(|| unparseable(text))?;
        let (_, end) = fiscal_calendar.quarter_bounds(year, 4).ok_or_else(|| unparseable(text))?;
        return Ok(PeriodKey::fy(year, start, end));
    }

    if let Some(caps) = quarter_regex().captures(trimmed) {
        let q: u8 = caps[1].parse().unwrap_or_default();
        let year: i32 = caps[2].parse().unwrap_or_default();
        let (start, end) = fiscal_calendar.quarter_bounds(year, q).ok_or_else(|| unparseable(text))?;
        return Ok(PeriodKey::quarter(year, q, start, end));
    }

    if let Some(caps) = bare_year_regex().captures(trimmed) {
        let year: i32 = caps[1].parse().unwrap_or_default();
        let (start, _) = fiscal_calendar.quarter_bounds(year, 1).ok_or_else(|| unparseable(text))?;
        let (_, end) = fiscal_calendar.quarter_bounds(year, 4).ok_or_else(|| unparseable(text))?;
        return Ok(PeriodKey::fy(year, start, end));
    }

    if let Some(caps) = month_year_regex().captures(trimmed) {
        let month: u32 = caps[1].parse().unwrap_or_default();
        let year: i32 = caps[2].parse().unwrap_or_default();
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| unparseable(text))?;
        let end = last_day_of_month(year, month).ok_or_else(|| unparseable(text))?;
        return Ok(PeriodKey::month(year, u8::try_from(month).unwrap_or_default(), start, end));
    }

    if let Some(caps) = date_range_regex().captures(trimmed) {
        let start = NaiveDate::from_ymd_opt(
            caps[3].parse().unwrap_or_default(),
            caps[2].parse().unwrap_or_default(),
            caps[1].parse().unwrap_or_default(),
        )
        .ok_or_else(|| unparseable(text))?;
        let end = NaiveDate::from_ymd_opt(
            caps[6].parse().unwrap_or_default(),
            caps[5].parse().unwrap_or_default(),
            caps[4].parse().unwrap_or_default(),
        )
        .ok_or_else(|| unparseable(text))?;
        return Ok(collapse_if_quarter(start, end, fiscal_calendar));
    }

    if let Some(caps) = ytd_regex().captures(trimmed) {
        let month = month_name_to_number(&caps[1]).ok_or_else(|| unparseable(text))?;
        let year: i32 = caps[2].parse().unwrap_or_default();
        let (fy_start, _) = fiscal_calendar.quarter_bounds(year, 1).ok_or_else(|| unparseable(text))?;
        let end = last_day_of_month(year, month).ok_or_else(|| unparseable(text))?;
        let mut key = PeriodKey::custom(year, fy_start, end);
        key.period_type = PeriodType::Ytd;
        return Ok(key);
    }

    Err(unparseable(text))
}

fn unparseable(text: &str) -> crate::error::Error {
    NormalizeError::UnparseablePeriod {
        raw: text.to_string(),
    }
    .into()
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// If `[start, end]` exactly matches a fiscal quarter, returns a `Q` period
/// key; otherwise returns a `custom` range.
fn collapse_if_quarter(start: NaiveDate, end: NaiveDate, fiscal_calendar: &FiscalCalendar) -> PeriodKey {
    for q in 1..=4u8 {
        if let Some((q_start, q_end)) = fiscal_calendar.quarter_bounds(start.year(), q) {
            if q_start == start && q_end == end {
                return PeriodKey::quarter(start.year(), q, q_start, q_end);
            }
        }
    }
    PeriodKey::custom(start.year(), start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cal() -> FiscalCalendar {
        FiscalCalendar::default()
    }

    #[test]
    fn test_fy_year() {
        let key = normalize_period("FY 2024", &cal()).unwrap();
        assert_eq!(key.period_type, PeriodType::Fy);
        assert_eq!(key.year, 2024);
    }

    #[test]
    fn test_quarter() {
        let key = normalize_period("Q2 2025", &cal()).unwrap();
        assert_eq!(key.period_type, PeriodType::Q);
        assert_eq!(key.index, 2);
    }

    #[test]
    fn test_bare_year() {
        let key = normalize_period("2023", &cal()).unwrap();
        assert_eq!(key.period_type, PeriodType::Fy);
    }

    #[test]
    fn test_month_year() {
        let key = normalize_period("03/2024", &cal()).unwrap();
        assert_eq!(key.period_type, PeriodType::M);
        assert_eq!(key.index, 3);
    }

    #[test]
    fn test_range_collapses_to_quarter() {
        let key = normalize_period("01/01/2025-31/03/2025", &cal()).unwrap();
        assert_eq!(key.period_type, PeriodType::Q);
        assert_eq!(key.index, 1);
    }

    #[test]
    fn test_non_quarter_range_stays_custom() {
        let key = normalize_period("15/02/2025-20/05/2025", &cal()).unwrap();
        assert_eq!(key.period_type, PeriodType::Custom);
    }

    #[test]
    fn test_ytd() {
        let key = normalize_period("YTD June 2025", &cal()).unwrap();
        assert_eq!(key.period_type, PeriodType::Ytd);
        assert_eq!(key.end_date, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
    }

    #[test]
    fn test_unparseable() {
        assert!(normalize_period("not a period", &cal()).is_err());
    }
}
