use crate::error::Result;
use crate::tokenizer::tokenize;
use std::collections::{BTreeSet, HashMap};

pub type DocId = u32;

/// All occurrences of one term in one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocInfo {
    pub doc_name: String,
    /// Token offsets, strictly increasing.
    positions: Vec<u32>,
}

impl DocInfo {
    /// A document reference without positions, as produced by the boolean merges.
    pub fn new(doc_name: impl Into<String>) -> Self {
        Self { doc_name: doc_name.into(), positions: Vec::new() }
    }

    pub fn with_positions(doc_name: impl Into<String>, positions: Vec<u32>) -> Self {
        debug_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        Self { doc_name: doc_name.into(), positions }
    }

    pub fn positions(&self) -> &[u32] { &self.positions }

    pub fn term_frequency(&self) -> usize { self.positions.len() }

    /// Returns false (and leaves the list untouched) if `pos` would break the ordering.
    pub(crate) fn push_position(&mut self, pos: u32) -> bool {
        match self.positions.last() {
            Some(&last) if pos <= last => false,
            _ => {
                self.positions.push(pos);
                true
            }
        }
    }
}

/// Anything that can hand out a postings list for a term.
///
/// Implementations return an empty list for unknown terms.
pub trait PostingsSource {
    fn postings(&self, term: &str) -> Result<Vec<DocInfo>>;
}

/// Build-time index: term -> postings sorted by document name.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    index: HashMap<String, Vec<DocInfo>>,
    doc_names: BTreeSet<String>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Records one occurrence of `term` at `pos` in `doc_name`.
    pub fn add_term(&mut self, term: &str, doc_name: &str, pos: u32) {
        if !self.doc_names.contains(doc_name) {
            self.doc_names.insert(doc_name.to_string());
        }
        if !self.index.contains_key(term) {
            self.index.insert(term.to_string(), Vec::new());
        }
        let Some(postings) = self.index.get_mut(term) else { return };
        match postings.binary_search_by(|d| d.doc_name.as_str().cmp(doc_name)) {
            Ok(i) => {
                if !postings[i].push_position(pos) {
                    tracing::debug!(term, doc_name, pos, "ignoring out-of-order position");
                }
            }
            Err(i) => postings.insert(i, DocInfo::with_positions(doc_name, vec![pos])),
        }
    }

    /// Tokenizes `text` and records every term. The document is registered even if it yields no terms.
    pub fn add_document(&mut self, doc_name: &str, text: &str) {
        self.doc_names.insert(doc_name.to_string());
        for (term, pos) in tokenize(text) {
            self.add_term(&term, doc_name, pos);
        }
    }

    pub fn has_postings(&self, term: &str) -> bool { self.index.contains_key(term) }

    pub fn get_postings(&self, term: &str) -> &[DocInfo] {
        self.index.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_term_count(&self) -> usize { self.index.len() }

    pub fn doc_count(&self) -> usize { self.doc_names.len() }

    pub fn contains_document(&self, doc_name: &str) -> bool { self.doc_names.contains(doc_name) }

    /// Every document seen, in ascending name order.
    pub fn doc_names(&self) -> impl Iterator<Item = &str> {
        self.doc_names.iter().map(String::as_str)
    }

    /// Every term, in ascending byte order.
    pub fn terms(&self) -> Vec<&str> {
        let mut terms: Vec<&str> = self.index.keys().map(String::as_str).collect();
        terms.sort_unstable();
        terms
    }
}

impl PostingsSource for InvertedIndex {
    fn postings(&self, term: &str) -> Result<Vec<DocInfo>> {
        Ok(self.get_postings(term).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence_creates_doc_info() {
        let mut idx = InvertedIndex::new();
        idx.add_term("cat", "doc1", 1);
        idx.add_term("cat", "doc1", 4);
        let p = idx.get_postings("cat");
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].positions(), &[1, 4]);
        assert!(idx.has_postings("cat"));
        assert!(!idx.has_postings("dog"));
        assert!(idx.get_postings("dog").is_empty());
    }

    #[test]
    fn postings_stay_sorted_by_doc_name() {
        let mut idx = InvertedIndex::new();
        idx.add_term("x", "c", 0);
        idx.add_term("x", "a", 0);
        idx.add_term("x", "b", 2);
        let names: Vec<&str> = idx.get_postings("x").iter().map(|d| d.doc_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn out_of_order_position_is_ignored() {
        let mut idx = InvertedIndex::new();
        idx.add_term("x", "a", 5);
        idx.add_term("x", "a", 5);
        idx.add_term("x", "a", 3);
        assert_eq!(idx.get_postings("x")[0].positions(), &[5]);
    }

    #[test]
    fn add_document_counts_terms_and_docs() {
        let mut idx = InvertedIndex::new();
        idx.add_document("doc1", "the cat sat");
        idx.add_document("doc2", "the dog sat");
        idx.add_document("empty", "");
        assert_eq!(idx.doc_count(), 3);
        assert_eq!(idx.terms(), vec!["cat", "dog", "sat"]);
        assert_eq!(idx.get_term_count(), 3);
        assert_eq!(idx.get_postings("sat").len(), 2);
        assert!(idx.contains_document("empty"));
        assert!(!idx.contains_document("doc3"));
    }
}
