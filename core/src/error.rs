use thiserror::Error;

/// Errors surfaced by index reading, query evaluation and classification.
///
/// A term missing from the vocabulary is not an error: lookups return `None`
/// or an empty postings list.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt index file {file}: {detail}")]
    Corrupt { file: &'static str, detail: String },

    #[error("Query syntax error: {0}")]
    QuerySyntax(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Unknown class: {0}")]
    UnknownClass(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Document {0} was given more than once")]
    DuplicateDocument(String),

    #[error("No index loaded")]
    NoIndexLoaded,
}

pub type Result<T> = std::result::Result<T, SearchError>;

impl SearchError {
    pub(crate) fn corrupt(file: &'static str, detail: impl Into<String>) -> Self {
        SearchError::Corrupt { file, detail: detail.into() }
    }

    /// True when the on-disk index itself is unusable, as opposed to a bad request.
    pub fn is_corruption(&self) -> bool {
        matches!(self, SearchError::Corrupt { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_display_names_the_file() {
        let err = SearchError::corrupt("postings.bin", "truncated");
        assert_eq!(err.to_string(), "Corrupt index file postings.bin: truncated");
        assert!(err.is_corruption());
    }

    #[test]
    fn syntax_errors_are_not_corruption() {
        assert!(!SearchError::QuerySyntax("empty".into()).is_corruption());
        assert!(!SearchError::NoIndexLoaded.is_corruption());
    }
}
