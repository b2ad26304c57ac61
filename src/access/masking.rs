//! PII redaction applied to log lines and trace fields.
//!
//! Tracing spans routinely interpolate raw extracted text (narrative
//! snippets, cell contents) for debugging; this module scrubs patterns
//! that commonly identify an individual (tax ids, IBANs, emails) before any
//! such string reaches a `tracing` event. Follows the teacher's static-regex-per-pattern
//! convention from `chunking::code::BoundaryPattern::regex`.

use regex::Regex;
use std::sync::OnceLock;

fn iban_regex() -> &'static Regex {
    static IBAN: OnceLock<Regex> = OnceLock::new();
    IBAN.get_or_init(|| {
        Regex::new(r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b").expect("valid regex")
    })
}

fn italian_tax_id_regex() -> &'static Regex {
    static TAX_ID: OnceLock<Regex> = OnceLock::new();
    TAX_ID.get_or_init(|| {
        Regex::new(r"\b[A-Z]{6}\d{2}[A-EHLMPRST]\d{2}[A-Z]\d{3}[A-Z]\b").expect("valid regex")
    })
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"\b[\w.+-]+@[\w-]+\.[A-Za-z]{2,}\b").expect("valid regex")
    })
}

/// Replaces any tax id, IBAN, or email address found in `text` with a
/// `[redacted:<kind>]` placeholder.
#[must_use]
pub fn redact(text: &str) -> String {
    let text = iban_regex().replace_all(text, "[redacted:iban]");
    let text = italian_tax_id_regex().replace_all(&text, "[redacted:tax-id]");
    email_regex().replace_all(&text, "[redacted:email]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_email() {
        let out = redact("contact mario.rossi@example.com for details");
        assert!(!out.contains("mario.rossi@example.com"));
        assert!(out.contains("[redacted:email]"));
    }

    #[test]
    fn test_redacts_iban() {
        let out = redact("IBAN: IT60X0542811101000000123456");
        assert!(out.contains("[redacted:iban]"));
    }

    #[test]
    fn test_redacts_italian_tax_id() {
        let out = redact("CF: RSSMRA80A01H501U");
        assert!(out.contains("[redacted:tax-id]"));
    }

    #[test]
    fn test_leaves_plain_text_untouched() {
        let out = redact("Ricavi netti pari a 1.234.567 euro");
        assert_eq!(out, "Ricavi netti pari a 1.234.567 euro");
    }
}
