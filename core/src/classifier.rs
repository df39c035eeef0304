//! Naive-Bayes feature selection and classification over a disk index.
//!
//! Contingency tables are built from the same AND / AND-NOT merges the query
//! engine uses: the term postings (restricted to training documents) are
//! merged against each class's document list.

use crate::error::{Result, SearchError};
use crate::merge;
use crate::{DiskInvertedIndex, DocId, DocInfo};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};
use std::sync::Arc;

/// Document counts for one (term, class) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Contingency {
    /// term and class
    pub class_term: u32,
    /// term, other class
    pub no_class_term: u32,
    /// class without the term
    pub no_term_class: u32,
    /// neither
    pub no_term_no_class: u32,
}

impl Contingency {
    pub fn score(&self) -> f64 {
        feature_select(
            f64::from(self.class_term),
            f64::from(self.no_class_term),
            f64::from(self.no_term_class),
            f64::from(self.no_term_no_class),
        )
    }
}

/// A term with its feature score. Orders by score, then by reverse term, so the
/// greatest element is the highest score with the alphabetically first term.
#[derive(Debug, Clone)]
pub struct ScoredTerm {
    pub score: f64,
    pub term: String,
}

impl Ord for ScoredTerm {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.total_cmp(&other.score).then_with(|| other.term.cmp(&self.term))
    }
}

impl PartialOrd for ScoredTerm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl PartialEq for ScoredTerm {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for ScoredTerm {}

/// Mutual information (in bits) between term occurrence and class membership.
///
/// Arguments are the four contingency quadrants; empty cells contribute zero.
pub fn feature_select(class_term: f64, no_class_term: f64, no_term_class: f64, no_term_no_class: f64) -> f64 {
    let n = class_term + no_class_term + no_term_class + no_term_no_class;
    if n <= 0.0 {
        return 0.0;
    }
    let with_term = class_term + no_class_term;
    let without_term = no_term_class + no_term_no_class;
    let in_class = class_term + no_term_class;
    let not_in_class = no_class_term + no_term_no_class;

    let part = |cell: f64, row: f64, col: f64| {
        if cell <= 0.0 { 0.0 } else { cell / n * (n * cell / (row * col)).log2() }
    };
    part(class_term, with_term, in_class)
        + part(no_class_term, with_term, not_in_class)
        + part(no_term_class, without_term, in_class)
        + part(no_term_no_class, without_term, not_in_class)
}

pub fn count_class_term(postings: &[DocInfo], class_docs: &[DocInfo]) -> u32 {
    merge::and(postings, class_docs).len() as u32
}

pub fn count_class(postings: &[DocInfo], class_docs: &[DocInfo]) -> u32 {
    merge::and_not(class_docs, postings).len() as u32
}

pub fn count_term(postings: &[DocInfo], class_docs: &[DocInfo]) -> u32 {
    merge::and_not(postings, class_docs).len() as u32
}

/// Builds the table for one class. `postings` must already be restricted to training documents.
pub fn contingency(postings: &[DocInfo], class_docs: &[DocInfo], total_training_docs: u32) -> Contingency {
    let class_term = count_class_term(postings, class_docs);
    let no_term_class = count_class(postings, class_docs);
    let no_class_term = count_term(postings, class_docs);
    Contingency {
        class_term,
        no_class_term,
        no_term_class,
        no_term_no_class: total_training_docs.saturating_sub(class_term + no_term_class + no_class_term),
    }
}

/// Smoothed log-probabilities for the selected features.
#[derive(Debug)]
struct FeatureModel {
    num_features: usize,
    features: Vec<String>,
    log_prior: BTreeMap<String, f64>,
    log_likelihood: BTreeMap<String, HashMap<String, f64>>,
}

pub struct ClassifierEngine {
    index: Arc<DiskInvertedIndex>,
    classes: BTreeMap<String, BTreeSet<DocId>>,
    class_rankings: BTreeMap<String, BinaryHeap<ScoredTerm>>,
    global_ranking: BinaryHeap<ScoredTerm>,
    model: Option<FeatureModel>,
}

impl ClassifierEngine {
    pub fn new(index: Arc<DiskInvertedIndex>) -> Self {
        Self {
            index,
            classes: BTreeMap::new(),
            class_rankings: BTreeMap::new(),
            global_ranking: BinaryHeap::new(),
            model: None,
        }
    }

    pub fn add_training_doc(&mut self, class_name: &str, doc_id: DocId) -> Result<()> {
        if self.index.doc_name(doc_id).is_none() {
            return Err(SearchError::Classifier(format!("document id {doc_id} is not in the index")));
        }
        self.classes.entry(class_name.to_string()).or_default().insert(doc_id);
        self.model = None;
        Ok(())
    }

    pub fn add_training_doc_list(&mut self, class_name: &str, doc_ids: &[DocId]) -> Result<()> {
        for &id in doc_ids {
            self.add_training_doc(class_name, id)?;
        }
        Ok(())
    }

    pub fn class_names(&self) -> Vec<&str> { self.classes.keys().map(String::as_str).collect() }

    pub fn class_docs(&self, class_name: &str) -> Result<Vec<DocId>> {
        self.classes
            .get(class_name)
            .map(|ids| ids.iter().copied().collect())
            .ok_or_else(|| SearchError::UnknownClass(class_name.to_string()))
    }

    /// The class's documents as a postings list sorted by name.
    pub fn class_doc_infos(&self, class_name: &str) -> Result<Vec<DocInfo>> {
        let ids = self
            .classes
            .get(class_name)
            .ok_or_else(|| SearchError::UnknownClass(class_name.to_string()))?;
        Ok(self.doc_infos(ids))
    }

    // Ids ascend in name order, so walking ids in order yields a sorted list.
    fn doc_infos<'a>(&self, ids: impl IntoIterator<Item = &'a DocId>) -> Vec<DocInfo> {
        ids.into_iter()
            .filter_map(|id| self.index.doc_name(*id))
            .map(DocInfo::new)
            .collect()
    }

    fn training_ids(&self) -> BTreeSet<DocId> { self.classes.values().flatten().copied().collect() }

    /// Distinct documents across all classes.
    pub fn count_total_training_docs(&self) -> u32 { self.training_ids().len() as u32 }

    /// Scores every vocabulary term against every class and rebuilds the rankings.
    pub fn generate_features_list(&mut self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(SearchError::Classifier("no training classes".into()));
        }
        let training = self.doc_infos(&self.training_ids());
        let total = training.len() as u32;
        let class_docs: Vec<(String, Vec<DocInfo>)> = self
            .classes
            .iter()
            .map(|(name, ids)| (name.clone(), self.doc_infos(ids)))
            .collect();

        let mut class_rankings: BTreeMap<String, BinaryHeap<ScoredTerm>> = BTreeMap::new();
        let mut global_ranking = BinaryHeap::new();
        let vocab = self.index.get_vocab_list();
        for term in &vocab {
            let postings = merge::and(&self.index.get_postings(term)?, &training);
            for (class_name, docs) in &class_docs {
                let table = contingency(&postings, docs, total);
                let scored = ScoredTerm { score: table.score(), term: term.clone() };
                tracing::trace!(term = term.as_str(), class = class_name.as_str(), ?table, score = scored.score, "scored term");
                global_ranking.push(scored.clone());
                class_rankings.entry(class_name.clone()).or_default().push(scored);
            }
        }

        tracing::info!(terms = vocab.len(), classes = class_docs.len(), training_docs = total, "feature rankings generated");
        self.class_rankings = class_rankings;
        self.global_ranking = global_ranking;
        self.model = None;
        Ok(())
    }

    /// Best `n` terms for one class, highest score first.
    pub fn top_class_features(&self, class_name: &str, n: usize) -> Result<Vec<ScoredTerm>> {
        let ranking = self
            .class_rankings
            .get(class_name)
            .ok_or_else(|| SearchError::UnknownClass(class_name.to_string()))?;
        let mut sorted = ranking.clone().into_sorted_vec();
        sorted.reverse();
        sorted.truncate(n);
        Ok(sorted)
    }

    /// Best `n` distinct terms over all classes, each with its highest score.
    pub fn top_global_features(&self, n: usize) -> Vec<ScoredTerm> {
        let mut sorted = self.global_ranking.clone().into_sorted_vec();
        sorted.reverse();
        let mut seen = BTreeSet::new();
        sorted
            .into_iter()
            .filter(|s| seen.insert(s.term.clone()))
            .take(n)
            .collect()
    }

    pub fn get_num_top_features(&self, num_features: usize) -> BTreeSet<String> {
        self.top_global_features(num_features).into_iter().map(|s| s.term).collect()
    }

    /// Builds the multinomial model over the top `num_features` global features:
    /// `P(t|c) = (T_ct + 1) / (sum_t T_ct + |F|)` and `P(c) = |docs_c| / N`.
    pub fn generate_feature_probability(&mut self, num_features: usize) -> Result<()> {
        let features: Vec<String> = self.top_global_features(num_features).into_iter().map(|s| s.term).collect();
        if features.is_empty() {
            return Err(SearchError::Classifier("no features selected; generate the feature list first".into()));
        }

        let mut counts: BTreeMap<&str, HashMap<&str, u64>> =
            self.classes.keys().map(|c| (c.as_str(), HashMap::new())).collect();
        for term in &features {
            for doc in self.index.get_postings(term)? {
                let Some(id) = self.index.doc_id(&doc.doc_name) else { continue };
                for (class_name, ids) in &self.classes {
                    if ids.contains(&id) {
                        if let Some(per_term) = counts.get_mut(class_name.as_str()) {
                            *per_term.entry(term.as_str()).or_insert(0) += doc.term_frequency() as u64;
                        }
                    }
                }
            }
        }

        let total = self.count_total_training_docs().max(1) as f64;
        let vocab_size = features.len() as f64;
        let mut log_prior = BTreeMap::new();
        let mut log_likelihood = BTreeMap::new();
        for (class_name, ids) in &self.classes {
            log_prior.insert(class_name.clone(), (ids.len() as f64 / total).ln());
            let per_term = &counts[class_name.as_str()];
            let class_total: u64 = per_term.values().sum();
            let likelihood = features
                .iter()
                .map(|t| {
                    let count = per_term.get(t.as_str()).copied().unwrap_or(0) as f64;
                    (t.clone(), ((count + 1.0) / (class_total as f64 + vocab_size)).ln())
                })
                .collect();
            log_likelihood.insert(class_name.clone(), likelihood);
        }

        tracing::debug!(num_features, "feature probabilities generated");
        self.model = Some(FeatureModel { num_features, features, log_prior, log_likelihood });
        Ok(())
    }

    /// Most probable class for `doc_id` using the top `num_features` features.
    /// Ties go to the alphabetically first class.
    pub fn classify_doc(&mut self, num_features: usize, doc_id: DocId) -> Result<String> {
        let doc_name = self
            .index
            .doc_name(doc_id)
            .ok_or_else(|| SearchError::Classifier(format!("document id {doc_id} is not in the index")))?
            .to_string();
        if self.model.as_ref().map(|m| m.num_features) != Some(num_features) {
            self.generate_feature_probability(num_features)?;
        }
        let Some(model) = self.model.as_ref() else {
            return Err(SearchError::Classifier("feature model unavailable".into()));
        };

        let mut tf: HashMap<&str, f64> = HashMap::new();
        for term in &model.features {
            let postings = self.index.get_postings(term)?;
            if let Ok(i) = postings.binary_search_by(|d| d.doc_name.as_str().cmp(&doc_name)) {
                tf.insert(term.as_str(), postings[i].term_frequency() as f64);
            }
        }

        let mut best: Option<(&str, f64)> = None;
        for (class_name, prior) in &model.log_prior {
            let likelihood = &model.log_likelihood[class_name];
            let score = prior + tf.iter().map(|(t, f)| f * likelihood[*t]).sum::<f64>();
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((class_name.as_str(), score));
            }
        }
        let (class_name, score) = best.ok_or_else(|| SearchError::Classifier("no training classes".into()))?;
        tracing::debug!(doc = doc_name.as_str(), class = class_name, score, "classified");
        Ok(class_name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(names: &[&str]) -> Vec<DocInfo> { names.iter().map(|n| DocInfo::new(*n)).collect() }

    #[test]
    fn quadrants_for_single_class() {
        let class = docs(&["doc1", "doc2"]);
        let cat = docs(&["doc1"]);
        let table = contingency(&cat, &class, 2);
        assert_eq!(table, Contingency { class_term: 1, no_class_term: 0, no_term_class: 1, no_term_no_class: 0 });
    }

    #[test]
    fn discriminative_term_scores_higher() {
        let confined = feature_select(2.0, 0.0, 0.0, 2.0);
        let split = feature_select(1.0, 1.0, 1.0, 1.0);
        assert!((confined - 1.0).abs() < 1e-12);
        assert!(split.abs() < 1e-12);
        assert!(confined > split);
        assert_eq!(feature_select(2.0, 0.0, 0.0, 2.0), confined);
    }

    #[test]
    fn empty_table_scores_zero() {
        assert_eq!(feature_select(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn scored_terms_rank_by_score_then_term() {
        let mut heap = BinaryHeap::new();
        heap.push(ScoredTerm { score: 0.5, term: "b".into() });
        heap.push(ScoredTerm { score: 0.9, term: "z".into() });
        heap.push(ScoredTerm { score: 0.5, term: "a".into() });
        let order: Vec<String> = std::iter::from_fn(|| heap.pop()).map(|s| s.term).collect();
        assert_eq!(order, vec!["z", "a", "b"]);
    }
}
