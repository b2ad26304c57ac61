//! One extractor module per source format, dispatched by
//! `ingest::route_and_extract`'s flat match over `SourceFormat`.

pub mod csv_json;
pub mod docx;
pub mod html;
pub mod pdf;
pub mod scanned;
pub mod spreadsheet;
