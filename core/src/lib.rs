pub mod classifier;
pub mod disk;
pub mod engine;
pub mod error;
pub mod index;
pub mod merge;
pub mod persist;
pub mod query;
pub mod tokenizer;

pub use classifier::{ClassifierEngine, Contingency, ScoredTerm};
pub use disk::DiskInvertedIndex;
pub use engine::Engine;
pub use error::{Result, SearchError};
pub use index::{DocId, DocInfo, InvertedIndex, PostingsSource};
pub use persist::{IndexPaths, MetaFile, VocabEntry};
pub use query::{infix_to_rpn, Operator, QEngine, QueryToken};
