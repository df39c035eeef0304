//! Read-only access to an index written by [`crate::persist::write_index`].
//!
//! The vocabulary, vocabulary table and id table are loaded at open time;
//! postings stay on disk and are decoded on demand.

use crate::error::{Result, SearchError};
use crate::persist::{
    eof_as_corrupt, load_id_table, load_meta, load_vocab_strings, load_vocab_table, load_weights, IndexPaths,
    VocabEntry, ID_TABLE_FILE, INDEX_VERSION, POSTINGS_FILE, VOCAB_FILE, VOCAB_TABLE_FILE, WEIGHTS_FILE,
};
use crate::{DocId, DocInfo, PostingsSource};
use byteorder::{BigEndian, ReadBytesExt};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub struct DiskInvertedIndex {
    root: PathBuf,
    vocab: String,
    table: Vec<VocabEntry>,
    postings: Mutex<BufReader<File>>,
    postings_len: u64,
    id_table: HashMap<DocId, String>,
    name_ids: HashMap<String, DocId>,
    /// Ids in ascending order; names are ascending too.
    ids: Vec<DocId>,
}

impl DiskInvertedIndex {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let paths = IndexPaths::new(root);
        let meta = load_meta(&paths)?;
        if meta.version > INDEX_VERSION {
            return Err(SearchError::corrupt("meta.json", format!("unsupported index version {}", meta.version)));
        }

        let vocab = String::from_utf8(load_vocab_strings(&paths)?)
            .map_err(|_| SearchError::corrupt(VOCAB_FILE, "vocabulary is not UTF-8"))?;
        let table = load_vocab_table(&paths)?;
        if table.len() != meta.num_terms as usize {
            return Err(SearchError::corrupt(
                VOCAB_TABLE_FILE,
                format!("{} entries but meta.json declares {} terms", table.len(), meta.num_terms),
            ));
        }

        let postings_file = File::open(paths.postings())?;
        let postings_len = postings_file.metadata()?.len();

        let id_list = load_id_table(&paths)?;
        if id_list.len() != meta.num_docs as usize {
            return Err(SearchError::corrupt(
                ID_TABLE_FILE,
                format!("{} documents but meta.json declares {}", id_list.len(), meta.num_docs),
            ));
        }
        for pair in id_list.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(SearchError::corrupt(ID_TABLE_FILE, format!("duplicate document id {}", pair[0].0)));
            }
            if pair[0].1 >= pair[1].1 {
                return Err(SearchError::corrupt(ID_TABLE_FILE, "document ids are not in document name order"));
            }
        }

        let ids = id_list.iter().map(|(id, _)| *id).collect();
        let name_ids = id_list.iter().map(|(id, name)| (name.clone(), *id)).collect();
        let id_table = id_list.into_iter().collect();

        let index = Self {
            root: paths.root.clone(),
            vocab,
            table,
            postings: Mutex::new(BufReader::new(postings_file)),
            postings_len,
            id_table,
            name_ids,
            ids,
        };
        index.validate_vocabulary()?;

        tracing::info!(root = %index.root.display(), num_docs = index.get_n(), num_terms = index.term_count(), "index opened");
        Ok(index)
    }

    /// Binary search depends on every string being addressable and the table being strictly ascending.
    /// Postings lists must tile `postings.bin` in vocabulary order, each at least a count long.
    fn validate_vocabulary(&self) -> Result<()> {
        let mut prev: Option<&str> = None;
        for i in 0..self.table.len() {
            let (start, end) = self.string_bounds(i);
            if start > end || end > self.vocab.len() {
                return Err(SearchError::corrupt(VOCAB_TABLE_FILE, format!("entry {i} points outside the vocabulary")));
            }
            if !self.vocab.is_char_boundary(start) || !self.vocab.is_char_boundary(end) {
                return Err(SearchError::corrupt(VOCAB_TABLE_FILE, format!("entry {i} splits a character")));
            }
            if i == 0 && self.table[i].postings_position != 0 {
                return Err(SearchError::corrupt(POSTINGS_FILE, "first postings list does not start the file"));
            }
            let (p_start, p_end) = self.postings_extent(i);
            if p_start + 4 > p_end {
                return Err(SearchError::corrupt(
                    POSTINGS_FILE,
                    format!("postings list {i} spans bytes {p_start}..{p_end}, too short for its header"),
                ));
            }
            let term = &self.vocab[start..end];
            if prev.is_some_and(|p| p >= term) {
                return Err(SearchError::corrupt(VOCAB_TABLE_FILE, format!("term {term:?} is out of order")));
            }
            prev = Some(term);
        }
        Ok(())
    }

    fn string_bounds(&self, i: usize) -> (usize, usize) {
        let start = self.table[i].string_position as usize;
        let end = match self.table.get(i + 1) {
            Some(next) => next.string_position as usize,
            None => self.vocab.len(),
        };
        (start, end)
    }

    /// Byte range of the `i`th postings list: up to the next list, or the end of the file.
    fn postings_extent(&self, i: usize) -> (u64, u64) {
        let start = u64::from(self.table[i].postings_position);
        let end = match self.table.get(i + 1) {
            Some(next) => u64::from(next.postings_position),
            None => self.postings_len,
        };
        (start, end)
    }

    fn term_at(&self, i: usize) -> &str {
        let (start, end) = self.string_bounds(i);
        &self.vocab[start..end]
    }

    pub fn binary_search_vocabulary(&self, term: &str) -> Option<VocabEntry> {
        self.find_term(term).map(|i| self.table[i])
    }

    fn find_term(&self, term: &str) -> Option<usize> {
        let (mut lo, mut hi) = (0, self.table.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.term_at(mid).as_bytes().cmp(term.as_bytes()) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Some(mid),
            }
        }
        None
    }

    /// Postings for `term`, sorted by document id (and therefore by name). Empty if the term is unknown.
    pub fn get_postings(&self, term: &str) -> Result<Vec<DocInfo>> {
        let Some(i) = self.find_term(term) else {
            tracing::debug!(term, "term not in vocabulary");
            return Ok(Vec::new());
        };
        let (start, end) = self.postings_extent(i);
        let mut buf = vec![0u8; (end - start) as usize];
        {
            let mut reader = self.postings.lock();
            reader.seek(SeekFrom::Start(start))?;
            reader.read_exact(&mut buf).map_err(eof_as_corrupt(POSTINGS_FILE))?;
        }
        let mut cur = Cursor::new(buf.as_slice());
        let postings = self.read_postings(&mut cur)?;
        if cur.position() != end - start {
            return Err(SearchError::corrupt(
                POSTINGS_FILE,
                format!("postings for {term:?} end before the next list starts"),
            ));
        }
        tracing::debug!(term, docs = postings.len(), "decoded postings");
        Ok(postings)
    }

    fn read_postings<R: Read>(&self, reader: &mut R) -> Result<Vec<DocInfo>> {
        let eof = eof_as_corrupt(POSTINGS_FILE);
        let doc_count = reader.read_u32::<BigEndian>().map_err(&eof)?;
        if doc_count as usize > self.ids.len() {
            return Err(SearchError::corrupt(
                POSTINGS_FILE,
                format!("postings list of {doc_count} documents exceeds the {} indexed", self.ids.len()),
            ));
        }
        let mut postings = Vec::with_capacity(doc_count as usize);
        let mut doc_id: DocId = 0;
        for i in 0..doc_count {
            let gap = reader.read_u32::<BigEndian>().map_err(&eof)?;
            if i > 0 && gap == 0 {
                return Err(SearchError::corrupt(POSTINGS_FILE, format!("repeated document id {doc_id}")));
            }
            doc_id = doc_id
                .checked_add(gap)
                .ok_or_else(|| SearchError::corrupt(POSTINGS_FILE, "document id overflow"))?;
            let name = self
                .id_table
                .get(&doc_id)
                .ok_or_else(|| SearchError::corrupt(POSTINGS_FILE, format!("unknown document id {doc_id}")))?;

            let pos_count = reader.read_u32::<BigEndian>().map_err(&eof)?;
            let mut positions = Vec::with_capacity(pos_count.min(1 << 16) as usize);
            let mut pos = 0u32;
            for j in 0..pos_count {
                let delta = reader.read_u32::<BigEndian>().map_err(&eof)?;
                if j > 0 && delta == 0 {
                    return Err(SearchError::corrupt(POSTINGS_FILE, format!("repeated position in document {doc_id}")));
                }
                pos = pos
                    .checked_add(delta)
                    .ok_or_else(|| SearchError::corrupt(POSTINGS_FILE, "position overflow"))?;
                positions.push(pos);
            }
            tracing::trace!(doc_id, positions = positions.len(), "decoded document");
            postings.push(DocInfo::with_positions(name.clone(), positions));
        }
        Ok(postings)
    }

    /// Number of documents in the id table.
    pub fn get_n(&self) -> u32 { self.ids.len() as u32 }

    pub fn term_count(&self) -> usize { self.table.len() }

    pub fn get_vocab_list(&self) -> Vec<String> {
        (0..self.table.len()).map(|i| self.term_at(i).to_string()).collect()
    }

    pub fn doc_name(&self, id: DocId) -> Option<&str> { self.id_table.get(&id).map(String::as_str) }

    pub fn doc_id(&self, name: &str) -> Option<DocId> { self.name_ids.get(name).copied() }

    /// All document ids in ascending order.
    pub fn doc_ids(&self) -> &[DocId] { &self.ids }

    /// Per-document Euclidean length of the `1 + ln(tf)` term weights, indexed by position in [`Self::doc_ids`].
    pub fn read_weights(&self) -> Result<Vec<f64>> {
        let weights = load_weights(&IndexPaths::new(&self.root))?;
        if weights.len() != self.ids.len() {
            return Err(SearchError::corrupt(
                WEIGHTS_FILE,
                format!("{} weights for {} documents", weights.len(), self.ids.len()),
            ));
        }
        Ok(weights)
    }

    /// Every term with its decoded postings, in vocabulary order.
    pub fn postings_dump(&self) -> Result<Vec<(String, Vec<DocInfo>)>> {
        (0..self.table.len())
            .map(|i| {
                let term = self.term_at(i);
                Ok((term.to_string(), self.get_postings(term)?))
            })
            .collect()
    }

    pub fn root(&self) -> &Path { &self.root }
}

impl PostingsSource for DiskInvertedIndex {
    fn postings(&self, term: &str) -> Result<Vec<DocInfo>> { self.get_postings(term) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::write_index;
    use crate::InvertedIndex;
    use tempfile::tempdir;

    fn build(dir: &Path) -> InvertedIndex {
        let mut idx = InvertedIndex::new();
        idx.add_document("doc1", "the cat sat on the mat");
        idx.add_document("doc2", "the dog sat");
        idx.add_document("doc3", "cat and dog and cat");
        write_index(&IndexPaths::new(dir), &idx).unwrap();
        idx
    }

    #[test]
    fn finds_every_term() {
        let dir = tempdir().unwrap();
        let mem = build(dir.path());
        let disk = DiskInvertedIndex::open(dir.path()).unwrap();
        assert_eq!(disk.get_n(), 3);
        for term in mem.terms() {
            assert!(disk.binary_search_vocabulary(term).is_some(), "{term}");
        }
        assert!(disk.binary_search_vocabulary("zebra").is_none());
        assert!(disk.binary_search_vocabulary("").is_none());
    }

    #[test]
    fn missing_term_is_empty_not_error() {
        let dir = tempdir().unwrap();
        build(dir.path());
        let disk = DiskInvertedIndex::open(dir.path()).unwrap();
        assert!(disk.get_postings("unicorn").unwrap().is_empty());
    }

    #[test]
    fn decodes_positions() {
        let dir = tempdir().unwrap();
        build(dir.path());
        let disk = DiskInvertedIndex::open(dir.path()).unwrap();
        let cat = disk.get_postings("cat").unwrap();
        assert_eq!(cat.len(), 2);
        assert_eq!(cat[0].doc_name, "doc1");
        assert_eq!(cat[0].positions(), &[1]);
        assert_eq!(cat[1].doc_name, "doc3");
        assert_eq!(cat[1].positions(), &[0, 4]);
    }

    #[test]
    fn vocab_list_is_sorted() {
        let dir = tempdir().unwrap();
        build(dir.path());
        let disk = DiskInvertedIndex::open(dir.path()).unwrap();
        assert_eq!(disk.get_vocab_list(), vec!["cat", "dog", "mat", "sat"]);
        assert_eq!(disk.doc_id("doc2"), Some(1));
        assert_eq!(disk.doc_name(2), Some("doc3"));
        assert_eq!(disk.read_weights().unwrap().len(), 3);
    }

    #[test]
    fn truncated_postings_fail_on_lookup() {
        let dir = tempdir().unwrap();
        build(dir.path());
        let paths = IndexPaths::new(dir.path());
        let bytes = std::fs::read(paths.postings()).unwrap();
        std::fs::write(paths.postings(), &bytes[..bytes.len() - 2]).unwrap();
        let disk = DiskInvertedIndex::open(dir.path()).unwrap();
        // "sat" is the last term, its list is the one cut short
        let err = disk.get_postings("sat").unwrap_err();
        assert!(err.is_corruption(), "{err}");
        assert!(disk.get_postings("cat").is_ok());
    }

    #[test]
    fn overlapping_postings_lists_are_rejected_at_open() {
        let dir = tempdir().unwrap();
        build(dir.path());
        let paths = IndexPaths::new(dir.path());
        let mut table = std::fs::read(paths.vocab_table()).unwrap();
        // second entry's postings offset now equals the first one's
        table[4 + 8 + 4..4 + 8 + 8].copy_from_slice(&0u32.to_be_bytes());
        std::fs::write(paths.vocab_table(), &table).unwrap();
        let err = DiskInvertedIndex::open(dir.path()).err().unwrap();
        assert!(err.is_corruption(), "{err}");
    }

    #[test]
    fn interior_list_is_bounded_by_the_next_one() {
        let dir = tempdir().unwrap();
        build(dir.path());
        let paths = IndexPaths::new(dir.path());
        let mut postings = std::fs::read(paths.postings()).unwrap();
        // "cat" is the first list; claim a single document instead of two
        postings[..4].copy_from_slice(&1u32.to_be_bytes());
        std::fs::write(paths.postings(), &postings).unwrap();
        let disk = DiskInvertedIndex::open(dir.path()).unwrap();
        assert!(disk.get_postings("cat").unwrap_err().is_corruption());
        assert_eq!(disk.get_postings("dog").unwrap().len(), 2);
    }

    #[test]
    fn out_of_order_vocabulary_is_rejected() {
        let dir = tempdir().unwrap();
        build(dir.path());
        let paths = IndexPaths::new(dir.path());
        // swap the strings of "cat" and "dog" without touching the table
        std::fs::write(paths.vocab(), b"dogcatmatsat").unwrap();
        let err = DiskInvertedIndex::open(dir.path()).err().unwrap();
        assert!(err.is_corruption(), "{err}");
    }
}
