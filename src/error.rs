use crate::resolver::ResolveError;
use cactus_tree::TreeError;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of [`ManifestError`], for callers that decide
/// between retrying and aborting without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    MissingField,
    Configuration,
    Resolution,
    Io,
    Consistency,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Could not {action} '{}': {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {context}: {message}")]
    Parse { context: String, message: String },

    #[error("Invalid guide tree: {0}")]
    InvalidTree(#[source] TreeError),

    #[error("Required field '{0}' is missing or empty")]
    MissingField(&'static str),

    #[error("Experiment '{0}' is listed more than once")]
    DuplicateExperiment(String),

    #[error("Input sequence identifiers are present but no sequence resolver was configured")]
    NoResolver,

    #[error("No experiments are referenced by this project")]
    NoExperiments,

    #[error("Experiment '{0}' is not referenced by this project")]
    UnknownExperiment(String),

    #[error("Could not resolve input sequence '{id}': {source}")]
    Resolution {
        id: String,
        #[source]
        source: ResolveError,
    },

    #[error("Experiment names do not match the guide tree: {0}")]
    SubtreeRoots(#[source] TreeError),

    #[error(
        "Subtree roots {found:?} of the guide tree differ from the experiment names {expected:?}"
    )]
    SubtreeRootMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Guide tree has {leaves} leaves but {sequences} input sequences are listed")]
    LeafCountMismatch { leaves: usize, sequences: usize },

    #[error("Leaf #{0} of the guide tree has no name")]
    UnnamedLeaf(usize),

    #[error("Leaf name '{0}' occurs more than once in the guide tree")]
    DuplicateLeafName(String),

    #[error("Value '{value}' for '{field}' is empty or contains whitespace and cannot be stored")]
    InvalidListValue { field: &'static str, value: String },

    #[error(
        "Experiments '{first}' and '{other}' use different configurations ('{first_config}' vs '{other_config}')"
    )]
    InconsistentConfig {
        first: String,
        first_config: String,
        other: String,
        other_config: String,
    },

    #[error("Could not serialize project: {0}")]
    Serialize(String),
}

impl ManifestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::Serialize(_) => ErrorKind::Io,
            Self::Parse { .. } | Self::InvalidTree(_) | Self::DuplicateExperiment(_) => {
                ErrorKind::Parse
            }
            Self::MissingField(_) => ErrorKind::MissingField,
            Self::NoResolver
            | Self::NoExperiments
            | Self::UnknownExperiment(_)
            | Self::InconsistentConfig { .. } => ErrorKind::Configuration,
            Self::Resolution { .. } => ErrorKind::Resolution,
            Self::SubtreeRoots(_)
            | Self::SubtreeRootMismatch { .. }
            | Self::LeafCountMismatch { .. }
            | Self::UnnamedLeaf(_)
            | Self::DuplicateLeafName(_)
            | Self::InvalidListValue { .. } => ErrorKind::Consistency,
        }
    }

    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }
}
