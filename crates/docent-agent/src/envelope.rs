//! Search-result envelope codec.
//!
//! Search-like tools answer with an XML-ish container:
//!
//! ```text
//! <search_results query='Q' type='T' count='N'>
//! <document ATTRS>
//! BODY
//! </document>
//! ...
//! </search_results>
//! ```
//!
//! Parsing is lenient (regex based, like the tool server's own output is
//! loosely formed). Rendering is canonical: one newline between elements.

use std::sync::OnceLock;

use regex::Regex;

const HEADER_PATTERN: &str = r"<search_results query='([^']*)' type='([^']*)' count='([^']*)'>";
const DOCUMENT_PATTERN: &str = r"(?s)<document ([^>]*)>\s*(.*?)\s*</document>";

fn compiled(
    cell: &'static OnceLock<Result<Regex, regex::Error>>,
    pattern: &str,
) -> Option<&'static Regex> {
    match cell.get_or_init(|| Regex::new(pattern)) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "envelope pattern failed to compile");
            None
        }
    }
}

fn header_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    compiled(&CELL, HEADER_PATTERN)
}

fn document_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    compiled(&CELL, DOCUMENT_PATTERN)
}

/// One `<document>` inside an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubDocument {
    /// Raw attribute block, e.g. `id='mu2e-docdb-123' title='...'`.
    pub attributes: String,
    /// Trimmed body text.
    pub body: String,
}

/// A parsed `<search_results>` container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEnvelope {
    pub query: String,
    pub search_type: String,
    /// Count as the tool reported it; not recomputed.
    pub count: String,
    pub documents: Vec<SubDocument>,
}

impl SearchEnvelope {
    /// Parse an envelope. Returns `None` for anything without a header.
    pub fn parse(text: &str) -> Option<Self> {
        if !text.contains("<search_results") {
            return None;
        }
        let header = header_regex()?.captures(text)?;
        let documents = document_regex()?
            .captures_iter(text)
            .map(|c| SubDocument {
                attributes: c[1].to_string(),
                body: c[2].trim().to_string(),
            })
            .collect();

        Some(Self {
            query: header[1].to_string(),
            search_type: header[2].to_string(),
            count: header[3].to_string(),
            documents,
        })
    }

    /// Canonical text form.
    pub fn render(&self) -> String {
        let mut out = format!(
            "<search_results query='{}' type='{}' count='{}'>\n",
            self.query, self.search_type, self.count
        );
        for doc in &self.documents {
            out.push_str(&format!(
                "<document {}>\n{}\n</document>\n",
                doc.attributes, doc.body
            ));
        }
        out.push_str("</search_results>");
        out
    }
}
