use crate::error::{Result, SearchError};
use crate::{DocId, InvertedIndex};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};

pub const INDEX_VERSION: u32 = 1;

pub(crate) const VOCAB_FILE: &str = "vocab.bin";
pub(crate) const VOCAB_TABLE_FILE: &str = "vocabTable.bin";
pub(crate) const POSTINGS_FILE: &str = "postings.bin";
pub(crate) const ID_TABLE_FILE: &str = "idTable.bin";
pub(crate) const WEIGHTS_FILE: &str = "docWeights.bin";
const META_FILE: &str = "meta.json";

/// Size of one vocabulary table record on disk.
pub const VOCAB_ENTRY_SIZE: usize = 8;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
}

/// Location of one term: its string in `vocab.bin` and its postings in `postings.bin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocabEntry {
    pub string_position: u32,
    pub postings_position: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn vocab(&self) -> PathBuf { self.root.join(VOCAB_FILE) }
    pub fn vocab_table(&self) -> PathBuf { self.root.join(VOCAB_TABLE_FILE) }
    pub fn postings(&self) -> PathBuf { self.root.join(POSTINGS_FILE) }
    pub fn id_table(&self) -> PathBuf { self.root.join(ID_TABLE_FILE) }
    pub fn weights(&self) -> PathBuf { self.root.join(WEIGHTS_FILE) }
    pub fn meta(&self) -> PathBuf { self.root.join(META_FILE) }
}

fn offset_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        SearchError::Io(io::Error::new(io::ErrorKind::InvalidInput, format!("{what} exceeds the 32-bit index format")))
    })
}

/// Maps a short read to a corruption error for `file`; other IO errors pass through.
pub(crate) fn eof_as_corrupt(file: &'static str) -> impl Fn(io::Error) -> SearchError {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            SearchError::corrupt(file, "unexpected end of file")
        } else {
            SearchError::Io(e)
        }
    }
}

/// Serializes `index` into the binary layout under `paths.root`.
///
/// Document ids are assigned in ascending name order, so decoded postings
/// come back sorted by both id and name.
pub fn write_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<MetaFile> {
    create_dir_all(&paths.root)?;

    let doc_ids: HashMap<&str, DocId> = index
        .doc_names()
        .enumerate()
        .map(|(id, name)| Ok((name, offset_u32(id, "document count")?)))
        .collect::<Result<_>>()?;
    let terms = index.terms();

    let mut vocab = BufWriter::new(File::create(paths.vocab())?);
    let mut postings = BufWriter::new(File::create(paths.postings())?);
    let mut table: Vec<VocabEntry> = Vec::with_capacity(terms.len());
    let mut weights = vec![0f64; doc_ids.len()];
    let mut string_pos = 0usize;
    let mut postings_pos = 0usize;

    for term in &terms {
        table.push(VocabEntry {
            string_position: offset_u32(string_pos, "vocabulary size")?,
            postings_position: offset_u32(postings_pos, "postings size")?,
        });
        vocab.write_all(term.as_bytes())?;
        string_pos += term.len();

        let plist = index.get_postings(term);
        postings.write_u32::<BigEndian>(offset_u32(plist.len(), "document count")?)?;
        postings_pos += 4;
        let mut last_id = 0;
        for doc in plist {
            let id = doc_ids[doc.doc_name.as_str()];
            postings.write_u32::<BigEndian>(id - last_id)?;
            last_id = id;
            postings.write_u32::<BigEndian>(offset_u32(doc.term_frequency(), "position count")?)?;
            let mut last_pos = 0;
            for &pos in doc.positions() {
                postings.write_u32::<BigEndian>(pos - last_pos)?;
                last_pos = pos;
            }
            postings_pos += 8 + 4 * doc.term_frequency();

            let wdt = 1.0 + (doc.term_frequency() as f64).ln();
            weights[id as usize] += wdt * wdt;
        }
    }
    vocab.flush()?;
    postings.flush()?;

    let mut table_out = BufWriter::new(File::create(paths.vocab_table())?);
    table_out.write_u32::<BigEndian>(offset_u32(table.len(), "term count")?)?;
    for entry in &table {
        table_out.write_u32::<BigEndian>(entry.string_position)?;
        table_out.write_u32::<BigEndian>(entry.postings_position)?;
    }
    table_out.flush()?;

    let mut ids_out = BufWriter::new(File::create(paths.id_table())?);
    ids_out.write_u32::<BigEndian>(offset_u32(doc_ids.len(), "document count")?)?;
    for (id, name) in index.doc_names().enumerate() {
        ids_out.write_u32::<BigEndian>(id as u32)?;
        ids_out.write_u32::<BigEndian>(offset_u32(name.len(), "document name")?)?;
        ids_out.write_all(name.as_bytes())?;
    }
    ids_out.flush()?;

    let mut weights_out = BufWriter::new(File::create(paths.weights())?);
    for w in &weights {
        weights_out.write_f64::<BigEndian>(w.sqrt())?;
    }
    weights_out.flush()?;

    let meta = MetaFile {
        num_docs: offset_u32(doc_ids.len(), "document count")?,
        num_terms: offset_u32(terms.len(), "term count")?,
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into()),
        version: INDEX_VERSION,
    };
    save_meta(paths, &meta)?;

    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, num_terms = meta.num_terms, "index written");
    Ok(meta)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

fn read_all(path: &Path) -> Result<Vec<u8>> {
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

pub fn load_vocab_strings(paths: &IndexPaths) -> Result<Vec<u8>> { read_all(&paths.vocab()) }

pub fn load_vocab_table(paths: &IndexPaths) -> Result<Vec<VocabEntry>> {
    let buf = read_all(&paths.vocab_table())?;
    let mut cur = Cursor::new(buf.as_slice());
    let count = cur.read_u32::<BigEndian>().map_err(eof_as_corrupt(VOCAB_TABLE_FILE))? as usize;
    let expected = 4 + count * VOCAB_ENTRY_SIZE;
    if buf.len() != expected {
        return Err(SearchError::corrupt(
            VOCAB_TABLE_FILE,
            format!("header declares {count} entries ({expected} bytes) but file has {} bytes", buf.len()),
        ));
    }
    let mut table = Vec::with_capacity(count);
    for _ in 0..count {
        let string_position = cur.read_u32::<BigEndian>().map_err(eof_as_corrupt(VOCAB_TABLE_FILE))?;
        let postings_position = cur.read_u32::<BigEndian>().map_err(eof_as_corrupt(VOCAB_TABLE_FILE))?;
        table.push(VocabEntry { string_position, postings_position });
    }
    Ok(table)
}

/// Reads the id table, returned sorted by id.
pub fn load_id_table(paths: &IndexPaths) -> Result<Vec<(DocId, String)>> {
    let buf = read_all(&paths.id_table())?;
    let mut cur = Cursor::new(buf.as_slice());
    let eof = eof_as_corrupt(ID_TABLE_FILE);
    let count = cur.read_u32::<BigEndian>().map_err(&eof)?;
    let mut ids = Vec::with_capacity(count.min(1 << 20) as usize);
    for _ in 0..count {
        let id = cur.read_u32::<BigEndian>().map_err(&eof)?;
        let len = cur.read_u32::<BigEndian>().map_err(&eof)? as usize;
        let mut name = vec![0u8; len.min(buf.len())];
        cur.read_exact(&mut name).map_err(&eof)?;
        if name.len() != len {
            return Err(SearchError::corrupt(ID_TABLE_FILE, format!("name of document {id} is truncated")));
        }
        let name = String::from_utf8(name)
            .map_err(|_| SearchError::corrupt(ID_TABLE_FILE, format!("name of document {id} is not UTF-8")))?;
        ids.push((id, name));
    }
    if (cur.position() as usize) != buf.len() {
        return Err(SearchError::corrupt(ID_TABLE_FILE, "trailing bytes after last entry"));
    }
    ids.sort_by_key(|(id, _)| *id);
    Ok(ids)
}

pub fn load_weights(paths: &IndexPaths) -> Result<Vec<f64>> {
    let buf = read_all(&paths.weights())?;
    if buf.len() % 8 != 0 {
        return Err(SearchError::corrupt(WEIGHTS_FILE, format!("length {} is not a multiple of 8", buf.len())));
    }
    let mut cur = Cursor::new(buf.as_slice());
    let mut weights = Vec::with_capacity(buf.len() / 8);
    for _ in 0..buf.len() / 8 {
        weights.push(cur.read_f64::<BigEndian>().map_err(eof_as_corrupt(WEIGHTS_FILE))?);
    }
    Ok(weights)
}
