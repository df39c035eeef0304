//! Sorted-postings merges shared by the query engine and the classifier.
//!
//! Every input must be sorted ascending by document name with no duplicates.
//! All merges are linear in the combined input length.

use crate::DocInfo;
use std::cmp::Ordering;

fn smaller_first<'a>(left: &'a [DocInfo], right: &'a [DocInfo]) -> (&'a [DocInfo], &'a [DocInfo]) {
    if left.len() < right.len() { (left, right) } else { (right, left) }
}

/// Documents present in both lists. Positions are not carried over.
pub fn and(left: &[DocInfo], right: &[DocInfo]) -> Vec<DocInfo> {
    let (min, max) = smaller_first(left, right);
    let mut result = Vec::with_capacity(min.len());
    let (mut i, mut j) = (0, 0);
    while i < min.len() && j < max.len() {
        match min[i].doc_name.cmp(&max[j].doc_name) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                result.push(DocInfo::new(min[i].doc_name.as_str()));
                i += 1;
                j += 1;
            }
        }
    }
    result
}

/// Documents present in either list, each once. Positions are not carried over.
pub fn or(left: &[DocInfo], right: &[DocInfo]) -> Vec<DocInfo> {
    let (min, max) = smaller_first(left, right);
    let mut result = Vec::with_capacity(max.len());
    let (mut i, mut j) = (0, 0);
    while i < min.len() && j < max.len() {
        match min[i].doc_name.cmp(&max[j].doc_name) {
            Ordering::Less => {
                result.push(DocInfo::new(min[i].doc_name.as_str()));
                i += 1;
            }
            Ordering::Greater => {
                result.push(DocInfo::new(max[j].doc_name.as_str()));
                j += 1;
            }
            Ordering::Equal => {
                result.push(DocInfo::new(min[i].doc_name.as_str()));
                i += 1;
                j += 1;
            }
        }
    }
    result.extend(min[i..].iter().map(|d| DocInfo::new(d.doc_name.as_str())));
    result.extend(max[j..].iter().map(|d| DocInfo::new(d.doc_name.as_str())));
    result
}

/// Documents of `left` that do not appear in `right`, in `left`'s order.
pub fn and_not(left: &[DocInfo], right: &[DocInfo]) -> Vec<DocInfo> {
    let mut result = Vec::with_capacity(left.len());
    let mut j = 0;
    for doc in left {
        while j < right.len() && right[j].doc_name < doc.doc_name {
            j += 1;
        }
        if j < right.len() && right[j].doc_name == doc.doc_name {
            j += 1;
            continue;
        }
        result.push(DocInfo::new(doc.doc_name.as_str()));
    }
    result
}

/// Documents where some occurrence in `right` directly follows one in `left`.
///
/// The result keeps the matching `right` positions, so a phrase can be extended
/// one term at a time.
pub fn phrase(left: &[DocInfo], right: &[DocInfo]) -> Vec<DocInfo> { phrase_at(left, right, 1) }

/// Like [`phrase`], but the `right` occurrence must sit exactly `distance` positions after the `left` one.
pub fn phrase_at(left: &[DocInfo], right: &[DocInfo], distance: u32) -> Vec<DocInfo> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].doc_name.cmp(&right[j].doc_name) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                let positions = adjacent(left[i].positions(), right[j].positions(), distance);
                if !positions.is_empty() {
                    result.push(DocInfo::with_positions(right[j].doc_name.as_str(), positions));
                }
                i += 1;
                j += 1;
            }
        }
    }
    result
}

/// Positions `q` in `next` such that `q - distance` is in `prev`.
fn adjacent(prev: &[u32], next: &[u32], distance: u32) -> Vec<u32> {
    let mut out = Vec::new();
    let (mut a, mut b) = (0, 0);
    while a < prev.len() && b < next.len() {
        let want = u64::from(prev[a]) + u64::from(distance);
        match want.cmp(&u64::from(next[b])) {
            Ordering::Less => a += 1,
            Ordering::Greater => b += 1,
            Ordering::Equal => {
                out.push(next[b]);
                a += 1;
                b += 1;
            }
        }
    }
    out
}
