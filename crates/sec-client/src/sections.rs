//! Plain-text extraction and item-heading based section cutting for 10-K/10-Q documents.

use analysis_core::{AnalysisError, FilingSections};
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Node};

/// Shorter spans are table-of-contents entries, not section bodies
const MIN_SECTION_CHARS: usize = 80;
/// Upper bound per section so downstream payloads stay bounded
pub const MAX_SECTION_CHARS: usize = 50_000;

const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "tr", "li", "table", "h1", "h2", "h3", "h4", "h5", "h6", "section",
];

lazy_static! {
    static ref RISK_START: Regex =
        Regex::new(r"(?im)^\s*item\s*1a\s*[.:\-–—]?\s*risk\s+factors[^\n]*").expect("Invalid regex pattern");
    static ref TEN_K_MDA_START: Regex =
        Regex::new(r"(?im)^\s*item\s*7\s*[.:\-–—]?\s*management['’`]?s\s+discussion[^\n]*")
            .expect("Invalid regex pattern");
    static ref TEN_K_FIN_START: Regex =
        Regex::new(r"(?im)^\s*item\s*8\s*[.:\-–—]?\s*financial\s+statements[^\n]*").expect("Invalid regex pattern");
    static ref TEN_Q_FIN_START: Regex =
        Regex::new(r"(?im)^\s*item\s*1\s*[.:\-–—]?\s*financial\s+statements[^\n]*").expect("Invalid regex pattern");
    static ref TEN_Q_MDA_START: Regex =
        Regex::new(r"(?im)^\s*item\s*2\s*[.:\-–—]?\s*management['’`]?s\s+discussion[^\n]*")
            .expect("Invalid regex pattern");

    /// Any item or part heading at the start of a line closes the current section
    static ref SECTION_END: Regex =
        Regex::new(r"(?im)^\s*(item\s*\d{1,2}[a-c]?\b|part\s+i{1,3}\b)").expect("Invalid regex pattern");

    static ref INLINE_WS: Regex = Regex::new(r"[ \t\u{a0}]+").expect("Invalid regex pattern");
}

/// Render an HTML document as text, one line per block element.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::with_capacity(html.len() / 4);

    for node in document.tree.nodes() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map_or(false, |e| matches!(e.name(), "script" | "style" | "title"))
        });
        if hidden {
            continue;
        }

        // A text node opens a new line when it is the first content of its
        // nearest block ancestor
        let mut current = node;
        let starts_block = loop {
            if current.prev_sibling().is_some() {
                break false;
            }
            let Some(parent) = current.parent() else {
                break true;
            };
            let is_block = parent
                .value()
                .as_element()
                .map_or(false, |e| BLOCK_ELEMENTS.contains(&e.name()));
            if is_block {
                break true;
            }
            current = parent;
        };

        raw.push(if starts_block { '\n' } else { ' ' });
        raw.push_str(text);
    }

    normalize_lines(&raw)
}

/// Collapse inline whitespace and drop blank lines.
fn normalize_lines(raw: &str) -> String {
    raw.lines()
        .map(|line| INLINE_WS.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Longest span between a start heading and the next heading.
/// Table-of-contents entries produce empty spans and lose.
fn extract_section(text: &str, start: &Regex) -> Option<String> {
    let mut best: Option<&str> = None;

    for m in start.find_iter(text) {
        let rest = &text[m.end()..];
        let body = match SECTION_END.find(rest) {
            Some(e) => &rest[..e.start()],
            None => rest,
        };
        let body = body.trim();
        if best.map_or(true, |b| body.len() > b.len()) {
            best = Some(body);
        }
    }

    best.filter(|b| b.chars().count() >= MIN_SECTION_CHARS)
        .map(|b| b.chars().take(MAX_SECTION_CHARS).collect())
}

/// Cut the three sections out of a filing's text.
pub fn extract_sections(text: &str, form: &str) -> Result<FilingSections, AnalysisError> {
    let (mda, risk_factors, financials) = if form.starts_with("10-Q") {
        (
            extract_section(text, &TEN_Q_MDA_START),
            extract_section(text, &RISK_START),
            extract_section(text, &TEN_Q_FIN_START),
        )
    } else {
        (
            extract_section(text, &TEN_K_MDA_START),
            extract_section(text, &RISK_START),
            extract_section(text, &TEN_K_FIN_START),
        )
    };

    let mut missing = Vec::new();
    if mda.is_none() {
        missing.push("management discussion");
    }
    if risk_factors.is_none() {
        missing.push("risk factors");
    }
    if financials.is_none() {
        missing.push("financial statements");
    }

    match (mda, risk_factors, financials) {
        (Some(mda), Some(risk_factors), Some(financials)) => Ok(FilingSections {
            mda,
            risk_factors,
            financials,
        }),
        _ => Err(AnalysisError::UpstreamFormat(format!(
            "{} is missing sections: {}",
            form,
            missing.join(", ")
        ))),
    }
}
