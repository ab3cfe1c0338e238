use crate::error::ManifestError;
use crate::resolver::{ResolveError, SequenceResolver};
use log::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputSequence {
    id: Option<String>,
    path: String,
}

impl InputSequence {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Input sequences in post-order leaf order.
///
/// Either every entry carries the identifier it was resolved from or none
/// does, so identifiers and paths cannot drift apart.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputSequences {
    entries: Vec<InputSequence>,
}

impl InputSequences {
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: paths
                .into_iter()
                .map(|path| InputSequence {
                    id: None,
                    path: path.into(),
                })
                .collect(),
        }
    }

    /// Resolves every identifier, all or nothing.
    pub fn resolve<I, S>(ids: I, resolver: &dyn SequenceResolver) -> Result<Self, ManifestError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = ids
            .into_iter()
            .map(|id| {
                let id: String = id.into();
                let path = resolver
                    .resolve(&id)
                    .map_err(|source| ManifestError::Resolution {
                        id: id.clone(),
                        source,
                    })?;
                debug!("Resolved input sequence '{id}' to {}", path.display());
                let path = path
                    .into_os_string()
                    .into_string()
                    .map_err(|raw| ManifestError::Resolution {
                        id: id.clone(),
                        source: ResolveError::NonUtf8Path(raw.into()),
                    })?;
                Ok(InputSequence {
                    path,
                    id: Some(id),
                })
            })
            .collect::<Result<Vec<_>, ManifestError>>()?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputSequence> {
        self.entries.iter()
    }

    pub fn has_ids(&self) -> bool {
        self.entries.first().is_some_and(|entry| entry.id.is_some())
    }

    pub fn ids(&self) -> Option<Vec<&str>> {
        if !self.has_ids() {
            return None;
        }
        self.entries.iter().map(InputSequence::id).collect()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(InputSequence::path).collect()
    }
}
