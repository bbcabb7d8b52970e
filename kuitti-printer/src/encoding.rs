//! Windows-1252 text utilities for thermal printers
//!
//! Receipts are written in Finnish, so text goes out in code page 1252
//! (ESC/POS page 16, StarPRNT page 32) where ä, ö, å and € are single bytes.
//! This module provides:
//! - Printed widths of strings (one column per character)
//! - Truncating/padding strings to a column width
//! - Converting UTF-8 text to 1252 bytes

use encoding_rs::WINDOWS_1252;

/// Byte printed for characters the code page cannot represent
const REPLACEMENT: u8 = b'?';

/// Trailing marker for truncated text
pub const ELLIPSIS: &str = "...";

/// Printed width of a string
///
/// Every character occupies one column in a single-byte code page.
pub fn text_width(s: &str) -> usize {
    s.chars().count()
}

/// Truncate a string to fit within `max_width` columns
pub fn truncate(s: &str, max_width: usize) -> String {
    s.chars().take(max_width).collect()
}

/// Truncate to `max_width` columns, marking the cut with a trailing ellipsis
pub fn ellipsize(s: &str, max_width: usize) -> String {
    if text_width(s) <= max_width {
        return s.to_string();
    }
    let marker = text_width(ELLIPSIS);
    if max_width <= marker {
        return truncate(ELLIPSIS, max_width);
    }
    let mut out = truncate(s, max_width - marker).trim_end().to_string();
    out.push_str(ELLIPSIS);
    out
}

/// Convert UTF-8 text to Windows-1252 bytes
///
/// ASCII passes through untouched; unmappable characters become `?`.
pub fn encode_cp1252(s: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(s.len());
    let mut char_buf = [0u8; 4];

    for c in s.chars() {
        if c.is_ascii() {
            result.push(c as u8);
            continue;
        }
        let (bytes, _, had_errors) = WINDOWS_1252.encode(c.encode_utf8(&mut char_buf));
        if had_errors || bytes.len() != 1 {
            result.push(REPLACEMENT);
        } else {
            result.extend_from_slice(&bytes);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("hello"), 5);
        assert_eq!(text_width("Yhteensä"), 8);
        assert_eq!(text_width("12,50 €"), 7);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello world", 5), "hello");
        assert_eq!(truncate("äöåäö", 3), "äöå");
    }

    #[test]
    fn test_ellipsize() {
        assert_eq!(ellipsize("short", 10), "short");
        assert_eq!(ellipsize("Quattro Formaggi", 10), "Quattro...");
        assert_eq!(text_width(&ellipsize(&"x".repeat(60), 42)), 42);
        assert_eq!(ellipsize("abcdef", 2), "..");
    }

    #[test]
    fn test_encode_cp1252() {
        assert_eq!(encode_cp1252("abc"), b"abc".to_vec());
        assert_eq!(encode_cp1252("ä"), vec![0xE4]);
        assert_eq!(encode_cp1252("Ö"), vec![0xD6]);
        assert_eq!(encode_cp1252("€"), vec![0x80]);
        assert_eq!(encode_cp1252("中"), vec![b'?']);
        assert_eq!(encode_cp1252("12,50 €"), vec![b'1', b'2', b',', b'5', b'0', b' ', 0x80]);
    }
}
