//! Word-processor document extraction.
//!
//! `.docx` is a zip container; `word/document.xml` holds the body as WordML.
//! This parses it directly with `quick-xml` rather than pulling in a
//! full docx crate: paragraphs (`<w:p>`) become narrative blocks, tables
//! (`<w:tbl>`/`<w:tr>`/`<w:tc>`) become table blocks, each run's text
//! (`<w:t>`) concatenated in document order.

use crate::core::fact::ClassificationLevel;
use crate::core::source_ref::{SourceReference, SourceType};
use crate::error::{IngestError, Result};
use crate::ingest::candidates::{pair_narrative_text, pair_table_row};
use crate::ingest::{hash_file_bytes, now_unix, BlockKind, ExtractedBlock, IngestResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

const EXTRACTION_METHOD: &str = "quick-xml";
const DOCUMENT_XML_PATH: &str = "word/document.xml";

#[derive(Debug, Clone)]
enum Node {
    Paragraph(String),
    Table(Vec<Vec<String>>),
}

/// Extracts paragraph and table blocks from a `.docx` document.
///
/// # Errors
///
/// Returns [`IngestError::ExtractionFailed`] if the file is not a valid zip
/// container or `word/document.xml` is missing or malformed.
pub fn extract(
    bytes: &[u8],
    file_name: &str,
    _document_id: &str,
    _tenant_id: &str,
    _classification_level: ClassificationLevel,
) -> Result<IngestResult> {
    let document_xml = read_document_xml(bytes)?;
    let nodes = parse_document_xml(&document_xml)?;

    let file_hash = hash_file_bytes(bytes);
    let extracted_at = now_unix();

    let mut blocks = Vec::new();
    let mut candidates = Vec::new();
    let mut table_index: u32 = 0;

    for node in nodes {
        match node {
            Node::Paragraph(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let source_ref = SourceReference::narrative(
                    file_name,
                    file_hash.clone(),
                    SourceType::Docx,
                    None,
                    EXTRACTION_METHOD,
                    extracted_at,
                    0.95,
                );
                candidates.extend(pair_narrative_text(trimmed, &source_ref));
                blocks.push(ExtractedBlock {
                    kind: BlockKind::Narrative,
                    text: trimmed.to_string(),
                    source_ref,
                });
            }
            Node::Table(rows) => {
                if rows.is_empty() {
                    continue;
                }
                let mut text = String::new();
                for (row_index, row) in rows.iter().enumerate() {
                    text.push_str(&row.join("\t"));
                    text.push('\n');
                    if row_index == 0 {
                        continue;
                    }
                    let row_label = row.first().cloned().unwrap_or_default();
                    if let Some(candidate) = pair_table_row(row, row_index, |_r, _c| {
                        SourceReference::pdf_table(
                            file_name,
                            file_hash.clone(),
                            1,
                            table_index,
                            row_label.clone(),
                            EXTRACTION_METHOD,
                            extracted_at,
                            0.9,
                        )
                    }) {
                        candidates.push(candidate);
                    }
                }
                blocks.push(ExtractedBlock {
                    kind: BlockKind::Table,
                    text,
                    source_ref: SourceReference::pdf_table(
                        file_name,
                        file_hash.clone(),
                        1,
                        table_index,
                        "*",
                        EXTRACTION_METHOD,
                        extracted_at,
                        0.9,
                    ),
                });
                table_index += 1;
            }
        }
    }

    if blocks.is_empty() {
        return Err(IngestError::ExtractionFailed {
            detail: "no paragraphs or tables found".to_string(),
        }
        .into());
    }

    Ok(IngestResult {
        document_id: String::new(),
        blocks,
        candidates,
        partial_failures: Vec::new(),
    })
}

fn read_document_xml(bytes: &[u8]) -> Result<String> {
    let cursor = Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor).map_err(|e| IngestError::ExtractionFailed {
        detail: format!("not a valid docx container: {e}"),
    })?;
    let mut entry = archive.by_name(DOCUMENT_XML_PATH).map_err(|e| IngestError::ExtractionFailed {
        detail: format!("missing {DOCUMENT_XML_PATH}: {e}"),
    })?;
    let mut content = String::new();
    entry.read_to_string(&mut content).map_err(|e| IngestError::ExtractionFailed {
        detail: format!("could not read {DOCUMENT_XML_PATH}: {e}"),
    })?;
    Ok(content)
}

/// Walks the flat WordML event stream, grouping `<w:t>` runs by the
/// innermost `<w:p>`/`<w:tr>` they belong to. Tables nest paragraphs inside
/// cells; this walker only tracks depth enough to tell "inside a table" from
/// "top-level paragraph", not arbitrary nesting, which WordML for financial
/// reports does not produce.
fn parse_document_xml(xml: &str) -> Result<Vec<Node>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut nodes = Vec::new();
    let mut buf = Vec::new();

    let mut in_table = false;
    let mut table_rows: Vec<Vec<String>> = Vec::new();
    let mut row_cells: Vec<String> = Vec::new();
    let mut cell_text = String::new();
    let mut paragraph_text = String::new();
    let mut capture_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()).as_str() {
                "tbl" => {
                    in_table = true;
                    table_rows.clear();
                }
                "tr" => row_cells.clear(),
                "tc" => cell_text.clear(),
                "p" if !in_table => paragraph_text.clear(),
                "t" => capture_text = true,
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if capture_text {
                    let text = t.unescape().unwrap_or_default().into_owned();
                    if in_table {
                        cell_text.push_str(&text);
                    } else {
                        paragraph_text.push_str(&text);
                    }
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()).as_str() {
                "t" => capture_text = false,
                "tc" => row_cells.push(std::mem::take(&mut cell_text)),
                "tr" => table_rows.push(std::mem::take(&mut row_cells)),
                "tbl" => {
                    in_table = false;
                    nodes.push(Node::Table(std::mem::take(&mut table_rows)));
                }
                "p" if !in_table => nodes.push(Node::Paragraph(std::mem::take(&mut paragraph_text))),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::ExtractionFailed {
                    detail: format!("malformed document.xml: {e}"),
                }
                .into())
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(nodes)
}

fn local_name(qname: &[u8]) -> String {
    let s = String::from_utf8_lossy(qname);
    s.rsplit(':').next().unwrap_or(&s).to_string()
}
