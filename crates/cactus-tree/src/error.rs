use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TreeError {
    #[error("Newick text is empty")]
    EmptyNewick,

    #[error("Unexpected '{found}' at byte {offset} in newick text; expected {expected}")]
    UnexpectedChar {
        offset: usize,
        found: char,
        expected: &'static str,
    },

    #[error("Newick text ended early; expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("Invalid branch length '{text}' at byte {offset} in newick text")]
    InvalidBranchLength { offset: usize, text: String },

    #[error("Unterminated quoted label starting at byte {offset} in newick text")]
    UnterminatedQuote { offset: usize },

    #[error("Unterminated comment starting at byte {offset} in newick text")]
    UnterminatedComment { offset: usize },

    #[error("Unexpected input after ';' at byte {offset} in newick text")]
    TrailingInput { offset: usize },

    #[error("Subtree root '{0}' does not name any node of the tree")]
    UnknownSubtreeRoot(String),

    #[error("Subtree root '{0}' names a leaf; only internal nodes can root a subtree")]
    LeafSubtreeRoot(String),

    #[error("Subtree root '{0}' matches more than one node of the tree")]
    AmbiguousName(String),

    #[error("Tree root '{0}' is not among the subtree root names")]
    RootNotSubtreeRoot(String),
}
