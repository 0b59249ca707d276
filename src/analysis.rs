//! Text analysis shared by the query model and the index.
//!
//! Full-text terms are produced by the same normalization on both sides:
//! Unicode word segmentation followed by lowercasing. Query-side
//! expressions and index-side postings must stay in lockstep or full-text
//! predicates silently stop matching.

use unicode_segmentation::UnicodeSegmentation;

/// Tokenize text into normalized full-text terms.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(|word| word.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_normalizes_case_and_whitespace() {
        assert_eq!(tokenize("  Hello,   WORLD! "), vec!["hello", "world"]);
        assert_eq!(tokenize(""), Vec::<String>::new());
    }

    #[test]
    fn test_tokenize_splits_punctuation() {
        assert_eq!(tokenize("quick-look v2.0"), vec!["quick", "look", "v2.0"]);
    }
}
