//! Printer-agnostic document
//!
//! A [`PrintDocument`] is what the receipt layout produces and what the
//! encoders consume. Text lines are already padded to the paper width;
//! emphasis is carried as literal markers (`**bold**`, `__underline__`)
//! that the encoders turn into control codes.

use serde::{Deserialize, Serialize};

use crate::encoding::text_width;

pub const BOLD_MARKER: &str = "**";
pub const UNDERLINE_MARKER: &str = "__";

/// One line of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum DocLine {
    /// Fixed-width text, possibly containing markers
    Text(String),
    /// Centered QR symbol
    Qr(String),
    /// Centered Code39 barcode
    Barcode(String),
    /// Blank lines
    Feed(u8),
}

/// A run of text sharing one style
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub underline: bool,
}

/// Split a marked-up line into styled spans
///
/// An opening marker without a matching closing marker is printed literally.
pub fn parse_markers(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut current = String::new();
    let mut bold = false;
    let mut underline = false;
    let mut rest = line;

    fn flush(spans: &mut Vec<Span>, current: &mut String, bold: bool, underline: bool) {
        if !current.is_empty() {
            spans.push(Span {
                text: std::mem::take(current),
                bold,
                underline,
            });
        }
    }

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix(BOLD_MARKER)
            && (bold || after.contains(BOLD_MARKER))
        {
            flush(&mut spans, &mut current, bold, underline);
            bold = !bold;
            rest = after;
            continue;
        }
        if let Some(after) = rest.strip_prefix(UNDERLINE_MARKER)
            && (underline || after.contains(UNDERLINE_MARKER))
        {
            flush(&mut spans, &mut current, bold, underline);
            underline = !underline;
            rest = after;
            continue;
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            current.push(c);
        }
        rest = chars.as_str();
    }
    flush(&mut spans, &mut current, bold, underline);

    spans
}

/// Text of a marked-up line as it appears on paper
pub fn strip_markers(line: &str) -> String {
    parse_markers(line).into_iter().map(|s| s.text).collect()
}

/// Printed width of a marked-up line
pub fn visible_width(line: &str) -> usize {
    parse_markers(line).iter().map(|s| text_width(&s.text)).sum()
}

/// Wrap text in bold markers
pub fn bold(text: &str) -> String {
    format!("{BOLD_MARKER}{text}{BOLD_MARKER}")
}

/// Wrap text in underline markers
pub fn underline(text: &str) -> String {
    format!("{UNDERLINE_MARKER}{text}{UNDERLINE_MARKER}")
}

/// Transport-agnostic print document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintDocument {
    pub width: usize,
    pub lines: Vec<DocLine>,
    /// Cut the paper after the last line
    pub cut: bool,
}

impl PrintDocument {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            lines: Vec::new(),
            cut: true,
        }
    }

    /// Document made of raw text lines (one per `\n`)
    pub fn from_text(width: usize, text: &str) -> Self {
        let mut doc = Self::new(width);
        for line in text.lines() {
            doc.text(line);
        }
        doc
    }

    pub fn text(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(DocLine::Text(line.into()));
        self
    }

    pub fn qr(&mut self, data: impl Into<String>) -> &mut Self {
        self.lines.push(DocLine::Qr(data.into()));
        self
    }

    pub fn barcode(&mut self, data: impl Into<String>) -> &mut Self {
        self.lines.push(DocLine::Barcode(data.into()));
        self
    }

    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.lines.push(DocLine::Feed(lines));
        self
    }

    /// Preview form: one string per printed line, markers kept
    pub fn preview(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            match line {
                DocLine::Text(text) => out.push(text.clone()),
                DocLine::Qr(data) => out.push(format!("[QR] {}", data)),
                DocLine::Barcode(data) => out.push(format!("[BARCODE] {}", data)),
                DocLine::Feed(n) => out.extend(std::iter::repeat_n(String::new(), *n as usize)),
            }
        }
        out
    }

    /// Preview joined into plain text with markers removed
    pub fn preview_text(&self) -> String {
        self.preview()
            .iter()
            .map(|line| strip_markers(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bold_and_underline() {
        let spans = parse_markers("**TILAUS #1042** __x__ y");
        assert_eq!(spans.len(), 4);
        assert_eq!(spans[0].text, "TILAUS #1042");
        assert!(spans[0].bold && !spans[0].underline);
        assert_eq!(spans[1].text, " ");
        assert!(!spans[1].bold);
        assert!(spans[2].underline);
        assert_eq!(spans[3].text, " y");
    }

    #[test]
    fn test_parse_nested_markers() {
        let spans = parse_markers("**a __b__**");
        assert_eq!(spans[0], Span { text: "a ".into(), bold: true, underline: false });
        assert_eq!(spans[1], Span { text: "b".into(), bold: true, underline: true });
    }

    #[test]
    fn test_unmatched_marker_is_literal() {
        let spans = parse_markers("2**3");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "2**3");
        assert_eq!(strip_markers("snake__case"), "snake__case");
    }

    #[test]
    fn test_visible_width_ignores_markers() {
        assert_eq!(visible_width(&bold("YHTEENSÄ")), 8);
        assert_eq!(visible_width("plain"), 5);
    }

    #[test]
    fn test_preview() {
        let mut doc = PrintDocument::new(48);
        doc.text(bold("A")).feed(2).qr("1042");
        assert_eq!(doc.preview(), vec!["**A**", "", "", "[QR] 1042"]);
        assert_eq!(doc.preview_text(), "A\n\n\n[QR] 1042");
    }
}
