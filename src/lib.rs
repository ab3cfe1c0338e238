//! Project manifests for progressive, multi-step genome alignment.
//!
//! A project ties a guide tree to one experiment per sub-problem and to the
//! input sequences of the tree's leaves. See [`ProjectManifest`].

pub mod error;
pub mod experiment;
pub mod input_sequences;
pub mod project;
pub mod project_xml;
pub mod resolver;

pub use cactus_tree::{NodeId, Tree, TreeError};
pub use error::{ErrorKind, ManifestError};
pub use experiment::{ConfigRef, ExperimentDescriptor};
pub use input_sequences::{InputSequence, InputSequences};
pub use project::{DEFAULT_PROJECT_FILE_NAME, ProjectManifest};
pub use resolver::{FileStoreResolver, ResolveError, SequenceResolver, StaticResolver};
