//! Canonical fiscal period representation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a canonical period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PeriodType {
    /// Full fiscal year.
    Fy,
    /// Quarter.
    Q,
    /// Month.
    M,
    /// Half-year.
    H,
    /// Year-to-date.
    Ytd,
    /// A date range that does not collapse to a standard period.
    Custom,
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fy => "FY",
            Self::Q => "Q",
            Self::M => "M",
            Self::H => "H",
            Self::Ytd => "YTD",
            Self::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// A canonical period key: `(type, year, index)` plus explicit bounds.
///
/// `index` is `0` for `FY`, `1..=4` for `Q`, `1..=12` for `M`, `1..=2` for
/// `H`, and `0` for `YTD`/`custom` (bounds carry the real meaning there).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    /// The period's type.
    pub period_type: PeriodType,
    /// The calendar or fiscal year the period falls in.
    pub year: i32,
    /// Sub-year index, see field documentation above.
    pub index: u8,
    /// Inclusive start date.
    pub start_date: NaiveDate,
    /// Inclusive end date.
    pub end_date: NaiveDate,
}

impl PeriodKey {
    /// Builds a full fiscal year period.
    #[must_use]
    pub fn fy(year: i32, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            period_type: PeriodType::Fy,
            year,
            index: 0,
            start_date,
            end_date,
        }
    }

    /// Builds a quarter period.
    #[must_use]
    pub fn quarter(year: i32, q: u8, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            period_type: PeriodType::Q,
            year,
            index: q,
            start_date,
            end_date,
        }
    }

    /// Builds a month period.
    #[must_use]
    pub fn month(year: i32, m: u8, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            period_type: PeriodType::M,
            year,
            index: m,
            start_date,
            end_date,
        }
    }

    /// Builds a custom (non-standard) range period.
    #[must_use]
    pub const fn custom(year: i32, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            period_type: PeriodType::Custom,
            year,
            index: 0,
            start_date,
            end_date,
        }
    }

    /// Whether `other`'s range exactly matches this period's range.
    #[must_use]
    pub fn range_matches(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date == start && self.end_date == end
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.period_type {
            PeriodType::Fy | PeriodType::Ytd | PeriodType::Custom => {
                write!(f, "{}/{}", self.period_type, self.year)
            }
            PeriodType::Q | PeriodType::M | PeriodType::H => {
                write!(f, "{}{}/{}", self.period_type, self.index, self.year)
            }
        }
    }
}

/// Describes a deployment's fiscal calendar: the month (1-12) the fiscal
/// year starts on. `1` means the fiscal year matches the calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalCalendar {
    /// First month of the fiscal year, 1-12.
    pub fiscal_year_start_month: u8,
}

impl Default for FiscalCalendar {
    fn default() -> Self {
        Self {
            fiscal_year_start_month: 1,
        }
    }
}

impl FiscalCalendar {
    /// Returns the `(start, end)` dates of quarter `q` of fiscal year `year`
    /// under this calendar.
    #[must_use]
    pub fn quarter_bounds(&self, year: i32, q: u8) -> Option<(NaiveDate, NaiveDate)> {
        if !(1..=4).contains(&q) {
            return None;
        }
        let start_month0 = (self.fiscal_year_start_month as u32 - 1 + u32::from(q - 1) * 3) % 12;
        let start_year = year
            + ((u32::from(self.fiscal_year_start_month - 1) + u32::from(q - 1) * 3) / 12) as i32;
        let start = NaiveDate::from_ymd_opt(start_year, start_month0 + 1, 1)?;
        let end_month0 = (start_month0 + 3) % 12;
        let end_year = start_year + i32::from(start_month0 + 3 >= 12);
        let next_start = NaiveDate::from_ymd_opt(end_year, end_month0 + 1, 1)?;
        let end = next_start.pred_opt()?;
        Some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quarter() {
        let key = PeriodKey::quarter(
            2025,
            2,
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        );
        assert_eq!(key.to_string(), "Q2/2025");
    }

    #[test]
    fn test_display_fy() {
        let key = PeriodKey::fy(
            2024,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        );
        assert_eq!(key.to_string(), "FY/2024");
    }

    #[test]
    fn test_calendar_year_quarter_bounds() {
        let cal = FiscalCalendar::default();
        let (start, end) = cal.quarter_bounds(2025, 1).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
    }

    #[test]
    fn test_shifted_fiscal_calendar_quarter_bounds() {
        let cal = FiscalCalendar {
            fiscal_year_start_month: 7,
        };
        let (start, end) = cal.quarter_bounds(2025, 1).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 9, 30).unwrap());
    }

    #[test]
    fn test_range_matches() {
        let key = PeriodKey::quarter(
            2025,
            1,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        );
        assert!(key.range_matches(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()
        ));
    }
}
