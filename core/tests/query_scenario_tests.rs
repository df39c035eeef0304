use searchcore::merge;
use searchcore::{DiskInvertedIndex, Engine, SearchError};
use std::sync::Arc;
use tempfile::tempdir;

fn two_doc_engine(dir: &std::path::Path) -> Engine {
    let mut engine = Engine::new();
    engine
        .create_index(vec![("doc1", "the cat sat"), ("doc2", "the dog sat")], dir)
        .unwrap();
    engine
}

#[test]
fn and_of_disjoint_terms_is_empty() {
    let dir = tempdir().unwrap();
    let engine = two_doc_engine(dir.path());
    assert!(engine.query("cat * dog").unwrap().is_empty());
}

#[test]
fn or_collects_both_documents() {
    let dir = tempdir().unwrap();
    let engine = two_doc_engine(dir.path());
    assert_eq!(engine.query("cat + dog").unwrap(), vec!["doc1", "doc2"]);
}

#[test]
fn and_not_via_merge_and_operator() {
    let dir = tempdir().unwrap();
    let engine = two_doc_engine(dir.path());
    let index: &Arc<DiskInvertedIndex> = engine.index().unwrap();
    let cat = index.get_postings("cat").unwrap();
    let dog = index.get_postings("dog").unwrap();
    let names: Vec<String> = merge::and_not(&cat, &dog).into_iter().map(|d| d.doc_name).collect();
    assert_eq!(names, vec!["doc1"]);
    assert_eq!(engine.query("cat ~ dog").unwrap(), vec!["doc1"]);
}

#[test]
fn phrase_against_disk_positions() {
    let dir = tempdir().unwrap();
    let engine = two_doc_engine(dir.path());
    assert_eq!(engine.query("dog ` sat").unwrap(), vec!["doc2"]);
    assert!(engine.query("sat ` dog").unwrap().is_empty());
}

#[test]
fn malformed_query_reports_syntax_error() {
    let dir = tempdir().unwrap();
    let engine = two_doc_engine(dir.path());
    assert!(matches!(engine.query("cat *"), Err(SearchError::QuerySyntax(_))));
    assert!(matches!(engine.query("cat dog"), Err(SearchError::QuerySyntax(_))));
}

#[test]
fn reopened_index_is_independent() {
    let dir = tempdir().unwrap();
    let engine = two_doc_engine(dir.path());
    let other = DiskInvertedIndex::open(dir.path()).unwrap();
    assert_eq!(
        other.get_postings("sat").unwrap(),
        engine.index().unwrap().get_postings("sat").unwrap()
    );
}
