//! Guide trees for progressive alignment projects.
//!
//! A [`Tree`] is rooted, ordered and optionally labeled. Internal nodes that
//! root an alignment sub-problem are marked as subtree roots with
//! [`Tree::with_subtree_roots`].

pub mod error;
pub mod newick;
pub mod tree;

pub use error::TreeError;
pub use newick::{parse_newick, write_newick};
pub use tree::{DEFAULT_ANCESTOR_PREFIX, NodeId, Tree};
