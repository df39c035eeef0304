//! Boolean query compilation (infix to RPN) and evaluation.
//!
//! Query syntax is a whitespace separated list of terms and binary operators:
//!
//! | symbol | operator | precedence |
//! |--------|----------|------------|
//! | `` ` ``| PHRASE   | 2 |
//! | `*`    | AND      | 1 |
//! | `~`    | AND-NOT  | 1 |
//! | `+`    | OR       | 0 |
//!
//! Operators of equal precedence associate to the left. There are no parentheses.
//! Operator symbols need no surrounding whitespace, so `cat+dog` is `cat + dog`.
//!
//! Stopwords are never indexed. Inside a phrase a stopword stands for exactly one
//! word, so `` sat ` on ` the ` mat `` matches "sat on the mat"; a stopword at the
//! start of a phrase is dropped. Outside a phrase a stopword has no postings.

use crate::error::{Result, SearchError};
use crate::merge;
use crate::tokenizer::{is_stopword, query_terms};
use crate::{DocInfo, PostingsSource};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    AndNot,
    Phrase,
}

impl Operator {
    pub fn from_symbol(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c),
            _ => None,
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '*' => Some(Operator::And),
            '+' => Some(Operator::Or),
            '~' => Some(Operator::AndNot),
            '`' => Some(Operator::Phrase),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::And => "*",
            Operator::Or => "+",
            Operator::AndNot => "~",
            Operator::Phrase => "`",
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            Operator::Or => 0,
            Operator::And | Operator::AndNot => 1,
            Operator::Phrase => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryToken {
    Term(String),
    Op(Operator),
}

impl QueryToken {
    /// Classifies a raw token without stemming it.
    pub fn parse(raw: &str) -> Self {
        match Operator::from_symbol(raw) {
            Some(op) => QueryToken::Op(op),
            None => QueryToken::Term(raw.to_string()),
        }
    }
}

impl fmt::Display for QueryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryToken::Term(t) => f.write_str(t),
            QueryToken::Op(op) => f.write_str(op.symbol()),
        }
    }
}

/// Splits a user query into operators and stemmed operands.
///
/// A fragment between operators that holds more than one word (`new-york`) is a
/// syntax error; fragments with no word at all (stray punctuation) are skipped.
pub fn parse_query(text: &str) -> Result<Vec<QueryToken>> {
    let mut tokens = Vec::new();
    for fragment in split_operators(text) {
        if let Some(op) = Operator::from_symbol(fragment) {
            tokens.push(QueryToken::Op(op));
            continue;
        }
        let mut words = query_terms(fragment);
        match words.len() {
            0 => tracing::debug!(fragment, "skipping fragment without a word"),
            1 => tokens.extend(words.pop().map(QueryToken::Term)),
            n => {
                return Err(SearchError::QuerySyntax(format!(
                    "{fragment:?} holds {n} words; join them with an operator"
                )))
            }
        }
    }
    Ok(tokens)
}

/// Whitespace separated fragments, with every operator symbol split out as its own fragment.
fn split_operators(text: &str) -> Vec<&str> {
    let mut fragments = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        let is_op = Operator::from_char(c).is_some();
        if is_op || c.is_whitespace() {
            if let Some(s) = start.take() {
                fragments.push(&text[s..i]);
            }
            if is_op {
                fragments.push(&text[i..i + c.len_utf8()]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        fragments.push(&text[s..]);
    }
    fragments
}

/// Shunting-yard reduction of an infix token stream to reverse polish notation.
pub fn infix_to_rpn(infix: &[QueryToken]) -> Vec<QueryToken> {
    let mut rpn = Vec::with_capacity(infix.len());
    let mut ops: Vec<Operator> = Vec::new();
    for token in infix {
        match token {
            QueryToken::Op(op) => {
                while let Some(&top) = ops.last() {
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    rpn.push(QueryToken::Op(top));
                    ops.pop();
                }
                ops.push(*op);
            }
            term => rpn.push(term.clone()),
        }
    }
    rpn.extend(ops.into_iter().rev().map(QueryToken::Op));
    rpn
}

/// One evaluated operand. `positional` is false once a boolean merge has dropped the positions.
struct Operand {
    docs: Vec<DocInfo>,
    positional: bool,
    /// Stopwords matched after the positions in `docs`.
    gap: u32,
    /// A lone stopword.
    stopword: bool,
}

impl Operand {
    fn postings(docs: Vec<DocInfo>) -> Self { Self { docs, positional: true, gap: 0, stopword: false } }

    fn boolean(docs: Vec<DocInfo>) -> Self { Self { docs, positional: false, gap: 0, stopword: false } }

    fn stopword() -> Self { Self { docs: Vec::new(), positional: true, gap: 0, stopword: true } }
}

/// Evaluates boolean queries against a shared, read-only postings source.
pub struct QEngine<S> {
    index: Arc<S>,
}

impl<S: PostingsSource> QEngine<S> {
    pub fn new(index: Arc<S>) -> Self { Self { index } }

    pub fn index(&self) -> &Arc<S> { &self.index }

    /// Parses, compiles and evaluates `query`.
    pub fn process_query(&self, query: &str) -> Result<Vec<DocInfo>> {
        let rpn = infix_to_rpn(&parse_query(query)?);
        tracing::debug!(query, rpn = %rpn.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "), "compiled query");
        self.evaluate(&rpn)
    }

    pub fn evaluate(&self, rpn: &[QueryToken]) -> Result<Vec<DocInfo>> {
        if rpn.is_empty() {
            return Err(SearchError::QuerySyntax("empty query".into()));
        }
        let mut stack: Vec<Operand> = Vec::new();
        for token in rpn {
            match token {
                QueryToken::Term(term) if is_stopword(term) => stack.push(Operand::stopword()),
                QueryToken::Term(term) => stack.push(Operand::postings(self.index.postings(term)?)),
                QueryToken::Op(op) => {
                    let (Some(right), Some(left)) = (stack.pop(), stack.pop()) else {
                        return Err(SearchError::QuerySyntax(format!("operator {} is missing an operand", op.symbol())));
                    };
                    let merged = apply(*op, left, right)?;
                    tracing::debug!(op = op.symbol(), result = merged.docs.len(), "merged");
                    stack.push(merged);
                }
            }
        }
        match stack.len() {
            1 => Ok(stack.pop().map(|o| o.docs).unwrap_or_default()),
            n => Err(SearchError::QuerySyntax(format!("{n} operands left without an operator"))),
        }
    }
}

fn apply(op: Operator, left: Operand, right: Operand) -> Result<Operand> {
    let docs = match op {
        Operator::And => merge::and(&left.docs, &right.docs),
        Operator::Or => merge::or(&left.docs, &right.docs),
        Operator::AndNot => merge::and_not(&left.docs, &right.docs),
        Operator::Phrase => return phrase(left, right),
    };
    Ok(Operand::boolean(docs))
}

fn phrase(left: Operand, right: Operand) -> Result<Operand> {
    if !(left.positional && right.positional) {
        return Err(SearchError::UnsupportedOperator(
            "phrase operands must be terms or phrases, not boolean sub-queries".into(),
        ));
    }
    if left.stopword {
        return Ok(right);
    }
    if right.stopword {
        return Ok(Operand { gap: left.gap + 1, ..left });
    }
    Ok(Operand::postings(merge::phrase_at(&left.docs, &right.docs, left.gap + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InvertedIndex;

    fn tokens(raw: &[&str]) -> Vec<QueryToken> { raw.iter().map(|t| QueryToken::parse(t)).collect() }

    fn render(rpn: &[QueryToken]) -> Vec<String> { rpn.iter().map(ToString::to_string).collect() }

    fn engine() -> QEngine<InvertedIndex> {
        let mut idx = InvertedIndex::new();
        idx.add_document("doc1", "the cat sat");
        idx.add_document("doc2", "the dog sat");
        idx.add_document("doc3", "a dog chased the cat");
        QEngine::new(Arc::new(idx))
    }

    fn names(docs: &[DocInfo]) -> Vec<&str> { docs.iter().map(|d| d.doc_name.as_str()).collect() }

    #[test]
    fn precedence_and_left_associativity() {
        let rpn = infix_to_rpn(&tokens(&["A", "+", "B", "*", "C", "+", "D"]));
        assert_eq!(render(&rpn), vec!["A", "B", "C", "*", "+", "D", "+"]);
    }

    #[test]
    fn equal_precedence_evaluates_left_first() {
        let rpn = infix_to_rpn(&tokens(&["A", "*", "B", "~", "C"]));
        assert_eq!(render(&rpn), vec!["A", "B", "*", "C", "~"]);
    }

    #[test]
    fn phrase_binds_tightest() {
        let rpn = infix_to_rpn(&tokens(&["A", "*", "B", "`", "C"]));
        assert_eq!(render(&rpn), vec!["A", "B", "C", "`", "*"]);
    }

    #[test]
    fn operand_only_input_is_unchanged() {
        let infix = tokens(&["A", "B", "C"]);
        assert_eq!(infix_to_rpn(&infix), infix);
        assert!(infix_to_rpn(&[]).is_empty());
    }

    #[test]
    fn parse_query_stems_operands() {
        assert_eq!(render(&parse_query("Cats * running").unwrap()), vec!["cat", "*", "run"]);
    }

    #[test]
    fn operators_split_glued_terms() {
        assert_eq!(render(&parse_query("cat+dog").unwrap()), vec!["cat", "+", "dog"]);
        assert_eq!(render(&parse_query("cats*dogs~`birds").unwrap()), vec!["cat", "*", "dog", "~", "`", "bird"]);
        assert_eq!(render(&parse_query("\"cat\" , + dog").unwrap()), vec!["cat", "+", "dog"]);
    }

    #[test]
    fn multi_word_fragment_is_a_syntax_error() {
        assert!(matches!(parse_query("new-york"), Err(SearchError::QuerySyntax(_))));
        assert!(matches!(parse_query("new-york + boston"), Err(SearchError::QuerySyntax(_))));
    }

    #[test]
    fn boolean_operators() {
        let q = engine();
        assert_eq!(names(&q.process_query("cat * dog").unwrap()), vec!["doc3"]);
        assert_eq!(names(&q.process_query("cat + dog").unwrap()), vec!["doc1", "doc2", "doc3"]);
        assert_eq!(names(&q.process_query("cat ~ dog").unwrap()), vec!["doc1"]);
        assert_eq!(names(&q.process_query("sat * cat + chased").unwrap()), vec!["doc1", "doc3"]);
        assert_eq!(names(&q.process_query("cat+dog").unwrap()), vec!["doc1", "doc2", "doc3"]);
        assert_eq!(names(&q.process_query("sat*dog").unwrap()), vec!["doc2"]);
    }

    #[test]
    fn phrase_operator() {
        let q = engine();
        assert_eq!(names(&q.process_query("cat ` sat").unwrap()), vec!["doc1"]);
        assert_eq!(names(&q.process_query("dog ` chased ` cat").unwrap()), Vec::<&str>::new());
        assert_eq!(names(&q.process_query("dog ` chased").unwrap()), vec!["doc3"]);
    }

    #[test]
    fn stopwords_inside_a_phrase_hold_one_position() {
        let mut idx = InvertedIndex::new();
        idx.add_document("mat", "the cat sat on the mat");
        idx.add_document("rug", "the cat sat on a big mat");
        let q = QEngine::new(Arc::new(idx));
        assert_eq!(names(&q.process_query("sat ` on ` the ` mat").unwrap()), vec!["mat"]);
        assert_eq!(names(&q.process_query("the ` cat ` sat").unwrap()), vec!["mat", "rug"]);
        assert!(q.process_query("cat ` the ` mat").unwrap().is_empty());
        assert!(q.process_query("the").unwrap().is_empty());
    }

    #[test]
    fn phrase_over_boolean_result_is_rejected() {
        let q = engine();
        let rpn = tokens(&["cat", "dog", "+", "sat", "`"]);
        assert!(matches!(q.evaluate(&rpn), Err(SearchError::UnsupportedOperator(_))));
    }

    #[test]
    fn malformed_programs_are_syntax_errors() {
        let q = engine();
        assert!(matches!(q.evaluate(&tokens(&["cat", "*"])), Err(SearchError::QuerySyntax(_))));
        assert!(matches!(q.evaluate(&tokens(&["cat", "dog"])), Err(SearchError::QuerySyntax(_))));
        assert!(matches!(q.process_query("   "), Err(SearchError::QuerySyntax(_))));
        assert!(matches!(q.process_query("+ cat"), Err(SearchError::QuerySyntax(_))));
    }

    #[test]
    fn unknown_term_yields_empty_result() {
        let q = engine();
        assert!(q.process_query("unicorn").unwrap().is_empty());
        assert_eq!(names(&q.process_query("unicorn + cat").unwrap()), vec!["doc1", "doc3"]);
    }
}
