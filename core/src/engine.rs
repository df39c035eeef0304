use crate::error::{Result, SearchError};
use crate::persist::{write_index, IndexPaths, MetaFile};
use crate::query::QEngine;
use crate::tokenizer;
use crate::{ClassifierEngine, DiskInvertedIndex, InvertedIndex};
use std::path::Path;
use std::sync::Arc;

/// Entry points used by command surfaces: build, load, query, stem.
#[derive(Default)]
pub struct Engine {
    query: Option<QEngine<DiskInvertedIndex>>,
}

impl Engine {
    pub fn new() -> Self { Self::default() }

    /// Indexes `(doc_name, text)` pairs, writes the index to `index_dir` and loads it.
    ///
    /// Document names must be unique; nothing is written if one repeats.
    pub fn create_index<I, N, T>(&mut self, docs: I, index_dir: &Path) -> Result<MetaFile>
    where
        I: IntoIterator<Item = (N, T)>,
        N: AsRef<str>,
        T: AsRef<str>,
    {
        let mut index = InvertedIndex::new();
        for (name, text) in docs {
            let name = name.as_ref();
            if index.contains_document(name) {
                return Err(SearchError::DuplicateDocument(name.to_string()));
            }
            index.add_document(name, text.as_ref());
        }
        tracing::info!(docs = index.doc_count(), terms = index.get_term_count(), "corpus indexed in memory");
        let meta = write_index(&IndexPaths::new(index_dir), &index)?;
        self.load_index(index_dir)?;
        Ok(meta)
    }

    /// Replaces the current index with the one stored in `index_dir`.
    pub fn load_index(&mut self, index_dir: &Path) -> Result<()> {
        let index = DiskInvertedIndex::open(index_dir)?;
        self.query = Some(QEngine::new(Arc::new(index)));
        Ok(())
    }

    pub fn index(&self) -> Option<&Arc<DiskInvertedIndex>> { self.query.as_ref().map(QEngine::index) }

    fn engine(&self) -> Result<&QEngine<DiskInvertedIndex>> { self.query.as_ref().ok_or(SearchError::NoIndexLoaded) }

    /// Names of the documents matching a boolean query, in name order.
    pub fn query(&self, text: &str) -> Result<Vec<String>> {
        let docs = self.engine()?.process_query(text)?;
        Ok(docs.into_iter().map(|d| d.doc_name).collect())
    }

    /// Stems each whitespace separated word the way queries and documents are stemmed.
    pub fn stem(&self, text: &str) -> String {
        text.split_whitespace().map(tokenizer::stem).collect::<Vec<_>>().join(" ")
    }

    pub fn vocab(&self) -> Result<Vec<String>> { Ok(self.engine()?.index().get_vocab_list()) }

    /// A classifier sharing the loaded index.
    pub fn classifier(&self) -> Result<ClassifierEngine> { Ok(ClassifierEngine::new(Arc::clone(self.engine()?.index()))) }
}
