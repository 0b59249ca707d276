//! Index lookup fragments, the target language of constraint translation.
//!
//! A selector's constraint subtree is lowered into one [`IndexLookup`]
//! tree, which segments evaluate to a set of entry ids. Negation is
//! expressed as a set difference against the selector's type universe, so
//! evaluation stays pure set algebra.

use regex::Regex;

use crate::error::{Result, XiphosError};
use crate::query::{Literal, Operator};

/// One translated lookup against the index.
#[derive(Debug, Clone)]
pub enum IndexLookup {
    /// Every entry of a content type.
    MatchType {
        /// The content-type name.
        type_name: String,
    },
    /// Entries whose property compares against a literal.
    PropertyCompare {
        /// Property name.
        property: String,
        /// Comparison operator (never `Like`; LIKE lowers to
        /// [`IndexLookup::PropertyLike`]).
        operator: Operator,
        /// Literal operand.
        value: Literal,
    },
    /// Entries whose text property matches a compiled LIKE pattern.
    PropertyLike {
        /// Property name.
        property: String,
        /// The compiled, anchored pattern.
        pattern: Regex,
    },
    /// Entries containing every term, optionally scoped to one property.
    FullText {
        /// Property to search in; `None` searches all text properties.
        property: Option<String>,
        /// Normalized search terms.
        terms: Vec<String>,
    },
    /// Intersection of the child lookups.
    And(Vec<IndexLookup>),
    /// Union of the child lookups.
    Or(Vec<IndexLookup>),
    /// Entries of the first lookup minus those of the second.
    Difference(Box<IndexLookup>, Box<IndexLookup>),
}

impl IndexLookup {
    /// Build a LIKE lookup, compiling the SQL pattern (`%` matches any run,
    /// `_` one character, `\` escapes) into an anchored regex.
    pub fn like(property: impl Into<String>, pattern: &str) -> Result<IndexLookup> {
        Ok(IndexLookup::PropertyLike {
            property: property.into(),
            pattern: compile_like_pattern(pattern)?,
        })
    }
}

/// Compile a SQL LIKE pattern into an anchored regex.
fn compile_like_pattern(pattern: &str) -> Result<Regex> {
    let mut regex_pattern = String::with_capacity(pattern.len() + 2);
    regex_pattern.push('^');

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => regex_pattern.push_str(".*"),
            '_' => regex_pattern.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => regex_pattern.push_str(&regex::escape(&escaped.to_string())),
                None => {
                    return Err(XiphosError::invalid_query(
                        "LIKE pattern ends with a dangling escape",
                    ));
                }
            },
            c => regex_pattern.push_str(&regex::escape(&c.to_string())),
        }
    }

    regex_pattern.push('$');
    Regex::new(&regex_pattern)
        .map_err(|e| XiphosError::invalid_query(format!("invalid LIKE pattern: {e}")))
}
