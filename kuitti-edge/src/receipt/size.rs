//! Size recovery
//!
//! Orders do not carry a size field. The size hides in the item name
//! (`"Bolognese (perhe)"`, `"perhe Bolognese"`) or in the notes
//! (`"Size: large"`). Lookup order: parenthesized suffix, known prefix
//! token, `Size:`/`Koko:` note token, then `"normal"`.

use shared::NORMAL_SIZE;

/// Pricing class of a size name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Normal,
    Large,
    Family,
}

const FAMILY_WORDS: &[&str] = &["perhe", "perhekoko", "family", "familj"];
const LARGE_WORDS: &[&str] = &["large", "iso", "suuri", "xl"];
const NORMAL_WORDS: &[&str] = &["normal", "normaali", "norm"];

/// Keys that introduce a size inside the notes
const NOTE_KEYS: &[&str] = &["size:", "koko:"];

impl SizeClass {
    pub fn of(size: &str) -> Self {
        let size = size.trim().to_lowercase();
        if FAMILY_WORDS.contains(&size.as_str()) {
            SizeClass::Family
        } else if LARGE_WORDS.contains(&size.as_str()) {
            SizeClass::Large
        } else {
            SizeClass::Normal
        }
    }
}

fn is_size_word(token: &str) -> bool {
    let token = token.to_lowercase();
    [FAMILY_WORDS, LARGE_WORDS, NORMAL_WORDS]
        .iter()
        .any(|words| words.contains(&token.as_str()))
}

/// Result of size extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSize {
    /// Item name without the size decoration
    pub name: String,
    /// Lowercase size name, `"normal"` when nothing matched
    pub size: String,
    /// Notes with a consumed `Size:` token removed
    pub notes: Option<String>,
}

/// Recover the size of an order item; never fails
pub fn extract_size(name: &str, notes: Option<&str>) -> ExtractedSize {
    let name = name.trim();
    let notes = notes.map(str::trim).filter(|n| !n.is_empty());

    if let Some((base, size)) = paren_suffix(name) {
        return ExtractedSize {
            name: base,
            size,
            notes: notes.map(str::to_string),
        };
    }

    if let Some((size, rest)) = name.split_once(char::is_whitespace)
        && is_size_word(size)
        && !rest.trim().is_empty()
    {
        return ExtractedSize {
            name: rest.trim().to_string(),
            size: size.to_lowercase(),
            notes: notes.map(str::to_string),
        };
    }

    if let Some(text) = notes
        && let Some((size, remaining)) = note_token(text)
    {
        return ExtractedSize {
            name: name.to_string(),
            size,
            notes: remaining,
        };
    }

    ExtractedSize {
        name: name.to_string(),
        size: NORMAL_SIZE.to_string(),
        notes: notes.map(str::to_string),
    }
}

/// `"Bolognese (perhe)"` -> `("Bolognese", "perhe")`
fn paren_suffix(name: &str) -> Option<(String, String)> {
    let inner = name.strip_suffix(')')?;
    let open = inner.rfind('(')?;
    let size = inner[open + 1..].trim();
    let base = inner[..open].trim();
    if size.is_empty() || base.is_empty() {
        return None;
    }
    Some((base.to_string(), size.to_lowercase()))
}

/// Find `Size: large` in free text; returns the size and the notes without it
fn note_token(notes: &str) -> Option<(String, Option<String>)> {
    let lower = notes.to_ascii_lowercase();
    let (start, key) = NOTE_KEYS
        .iter()
        .filter_map(|key| lower.find(key).map(|pos| (pos, *key)))
        .min_by_key(|(pos, _)| *pos)?;

    let value_start = start + key.len();
    let after = &notes[value_start..];
    let value_offset = after.len() - after.trim_start().len();
    let value: String = after
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '-')
        .collect();
    if value.is_empty() {
        return None;
    }
    let end = value_start + value_offset + value.len();

    let before = notes[..start].trim_end_matches(|c: char| c.is_whitespace() || c == ',' || c == ';');
    let after = notes[end..].trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == ';');
    let remaining = match (before.is_empty(), after.is_empty()) {
        (true, true) => None,
        (false, true) => Some(before.to_string()),
        (true, false) => Some(after.to_string()),
        (false, false) => Some(format!("{}, {}", before, after)),
    };
    Some((value.to_lowercase(), remaining))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paren_suffix_wins() {
        let got = extract_size("Bolognese (perhe)", Some("Size: large"));
        assert_eq!(got.name, "Bolognese");
        assert_eq!(got.size, "perhe");
        assert_eq!(got.notes.as_deref(), Some("Size: large"));
    }

    #[test]
    fn test_prefix_token() {
        let got = extract_size("perhe Bolognese", None);
        assert_eq!(got.name, "Bolognese");
        assert_eq!(got.size, "perhe");

        let got = extract_size("Iso Kebab", None);
        assert_eq!(got.size, "iso");
        assert_eq!(SizeClass::of(&got.size), SizeClass::Large);
    }

    #[test]
    fn test_unknown_prefix_is_part_of_name() {
        let got = extract_size("Quattro Stagioni", None);
        assert_eq!(got.name, "Quattro Stagioni");
        assert_eq!(got.size, "normal");
    }

    #[test]
    fn test_notes_token_is_consumed() {
        let got = extract_size("Kebab", Some("Ei sipulia, Size: large, extra kastike"));
        assert_eq!(got.size, "large");
        assert_eq!(got.notes.as_deref(), Some("Ei sipulia, extra kastike"));

        let got = extract_size("Kebab", Some("koko: perhe"));
        assert_eq!(got.size, "perhe");
        assert_eq!(got.notes, None);
    }

    #[test]
    fn test_defaults_to_normal() {
        let got = extract_size("Margherita", Some("Size:"));
        assert_eq!(got.size, "normal");
        assert_eq!(got.notes.as_deref(), Some("Size:"));

        let got = extract_size("()", None);
        assert_eq!(got.size, "normal");
        assert_eq!(SizeClass::of("medium"), SizeClass::Normal);
    }

    #[test]
    fn test_size_classes() {
        assert_eq!(SizeClass::of("Perhe"), SizeClass::Family);
        assert_eq!(SizeClass::of("family"), SizeClass::Family);
        assert_eq!(SizeClass::of("LARGE"), SizeClass::Large);
        assert_eq!(SizeClass::of("normal"), SizeClass::Normal);
    }
}
