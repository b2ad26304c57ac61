//! Locale-aware normalization of raw extracted values.
//!
//! Extraction (`ingest`) never normalizes; this module turns a raw numeric
//! token and a raw period expression into the canonical `Decimal`/
//! `PeriodKey` forms the fact store persists.

pub mod number;
pub mod period;

pub use number::{LocaleHint, NormalizedValue, ScaleHint, normalize};
pub use period::normalize_period;
