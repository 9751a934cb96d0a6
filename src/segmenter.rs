//! Clause segmentation.
//!
//! Splits contract text into ordered clause units on paragraph boundaries
//! (runs of two or more line breaks). A document with no such boundaries
//! is treated as a single clause, so non-empty input always yields at
//! least one clause.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::Clause;

lazy_static! {
    static ref PARAGRAPH_BREAK: Regex = Regex::new(r"(\r?\n){2,}").expect("static regex");
}

/// Split `text` into trimmed, 1-indexed clauses in document order.
///
/// Whitespace-only input yields an empty vec; callers reject that as
/// missing input before reaching here.
pub fn segment(text: &str) -> Vec<Clause> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let parts: Vec<&str> = PARAGRAPH_BREAK
        .split(trimmed)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() {
        // Single unbroken block: the whole document is one clause.
        return vec![Clause::new(1, trimmed)];
    }

    parts
        .into_iter()
        .enumerate()
        .map(|(i, p)| Clause::new(i + 1, p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(clauses: &[Clause]) -> Vec<&str> {
        clauses.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn single_block_is_one_clause() {
        let clauses = segment("Hello world.");
        assert_eq!(texts(&clauses), vec!["Hello world."]);
        assert_eq!(clauses[0].number, 1);
    }

    #[test]
    fn blank_line_separates_clauses_in_order() {
        let clauses = segment("Clause A text.\n\nClause B text.");
        assert_eq!(texts(&clauses), vec!["Clause A text.", "Clause B text."]);
        assert_eq!(clauses[0].number, 1);
        assert_eq!(clauses[1].number, 2);
    }

    #[test]
    fn longer_break_runs_are_one_boundary() {
        let clauses = segment("first\n\n\n\nsecond\n\nthird");
        assert_eq!(texts(&clauses), vec!["first", "second", "third"]);
    }

    #[test]
    fn windows_line_endings() {
        let clauses = segment("alpha\r\n\r\nbeta");
        assert_eq!(texts(&clauses), vec!["alpha", "beta"]);
    }

    #[test]
    fn clause_text_is_trimmed() {
        let clauses = segment("  padded clause  \n\n  another  ");
        assert_eq!(texts(&clauses), vec!["padded clause", "another"]);
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        assert!(segment("").is_empty());
        assert!(segment("   \n\n \t ").is_empty());
    }

    #[test]
    fn single_newlines_do_not_split() {
        let clauses = segment("line one\nline two");
        assert_eq!(texts(&clauses), vec!["line one\nline two"]);
    }

    #[test]
    fn numbering_is_one_indexed_and_dense() {
        let clauses = segment("a\n\nb\n\n\nc\n\nd");
        let numbers: Vec<usize> = clauses.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }
}
