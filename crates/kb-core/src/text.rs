//! Text normalization and tokenization shared by indexing and querying.
//!
//! Both sides of the lexical match go through [`normalize`], so a query term
//! and an indexed token are comparable byte for byte.

use unicode_normalization::UnicodeNormalization;

/// Lowercase, decompose (NFD) and drop combining diacritical marks.
///
/// `"Körömvirág"` becomes `"koromvirag"`. Empty input yields an empty string.
pub fn normalize(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    s.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Combining Diacritical Marks block (U+0300..U+036F).
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// Split normalized text into maximal runs of `[a-z0-9]`.
pub fn tokenize(normalized: &str) -> impl Iterator<Item = &str> {
    normalized
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_diacritics() {
        assert_eq!(normalize("Körömvirág"), "koromvirag");
        assert_eq!(normalize("Árvíztűrő tükörfúrógép"), "arvizturo tukorfurogep");
        assert_eq!(normalize("Crème Brûlée"), "creme brulee");
    }

    #[test]
    fn test_normalize_decomposed_input() {
        // 'e' followed by U+0301 COMBINING ACUTE ACCENT
        assert_eq!(normalize("Ame\u{0301}lie"), "amelie");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        for s in ["Körömvirág", "GINGER root", "Ünnepi Ő", "naïve café", "İstanbul", "plain"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_normalize_case_insensitive() {
        assert_eq!(normalize("CALENDULA"), normalize("calendula"));
        assert_eq!(normalize("ÉDES"), normalize("édes"));
    }

    #[test]
    fn test_normalize_leaves_no_combining_marks() {
        let out = normalize("ǘ ȫ ṩ ḗ ő ű");
        assert!(!out.chars().any(is_combining_mark));
    }

    #[test]
    fn test_tokenize() {
        let tokens: Vec<_> = tokenize("calendula-ointment, 2x daily; (wound)").collect();
        assert_eq!(tokens, vec!["calendula", "ointment", "2x", "daily", "wound"]);
    }

    #[test]
    fn test_tokenize_skips_non_ascii_letters() {
        let tokens: Vec<_> = tokenize("straße").collect();
        assert_eq!(tokens, vec!["stra", "e"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert_eq!(tokenize("  --  ").count(), 0);
    }
}
