//! The project manifest: guide tree, per-sub-problem experiments and the
//! input sequences of the tree's leaves.

use crate::error::ManifestError;
use crate::experiment::{ConfigRef, ExperimentDescriptor};
use crate::input_sequences::InputSequences;
use crate::project_xml::{
    ATTR_INPUT_SEQUENCE_IDS, ATTR_INPUT_SEQUENCES, ATTR_OUTPUT_SEQUENCE_DIR, ELEM_TREE,
    ExperimentRefXml, ProjectXml, nonempty, split_list,
};
use crate::resolver::SequenceResolver;
use cactus_tree::{Tree, parse_newick, write_newick};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROJECT_FILE_NAME: &str = "project.xml";

/// Manifest of a progressive alignment project.
///
/// Built empty and filled by [`load_xml_file`](Self::load_xml_file) or
/// [`from_parts`](Self::from_parts). A sequence resolver, when one is needed,
/// is supplied at construction time with [`with_resolver`](Self::with_resolver).
#[derive(Default)]
pub struct ProjectManifest {
    tree: Option<Tree>,
    experiment_references: BTreeMap<String, String>,
    input_sequences: InputSequences,
    output_sequence_dir: Option<String>,
    base_dir: Option<PathBuf>,
    resolver: Option<Box<dyn SequenceResolver>>,
}

// Everything `load` decodes, assigned to the manifest in one step.
struct DecodedProject {
    tree: Tree,
    experiment_references: BTreeMap<String, String>,
    input_sequences: InputSequences,
    output_sequence_dir: String,
}

impl fmt::Debug for ProjectManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectManifest")
            .field("tree", &self.tree.as_ref().map(write_newick))
            .field("experiment_references", &self.experiment_references)
            .field("input_sequences", &self.input_sequences)
            .field("output_sequence_dir", &self.output_sequence_dir)
            .field("base_dir", &self.base_dir)
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}

impl ProjectManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver<R: SequenceResolver + 'static>(resolver: R) -> Self {
        Self {
            resolver: Some(Box::new(resolver)),
            ..Self::default()
        }
    }

    /// Builds a manifest programmatically, checking the same invariants
    /// `load` establishes.
    pub fn from_parts<I, K, V>(
        tree: Tree,
        experiment_references: I,
        input_sequences: InputSequences,
        output_sequence_dir: &str,
    ) -> Result<Self, ManifestError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut references = BTreeMap::new();
        for (name, path) in experiment_references {
            let name: String = name.into();
            if references.contains_key(&name) {
                return Err(ManifestError::DuplicateExperiment(name));
            }
            references.insert(name, path.into());
        }
        let output_sequence_dir = nonempty(Some(output_sequence_dir))
            .ok_or(ManifestError::MissingField(ATTR_OUTPUT_SEQUENCE_DIR))?
            .to_string();
        let tree = tree
            .with_subtree_roots(references.keys())
            .map_err(ManifestError::SubtreeRoots)?;
        check_leaf_count(&tree, &input_sequences)?;
        check_leaf_names(&tree)?;
        Ok(Self {
            tree: Some(tree),
            experiment_references: references,
            input_sequences,
            output_sequence_dir: Some(output_sequence_dir),
            base_dir: None,
            resolver: None,
        })
    }

    /// Replaces this manifest's contents with the project stored at `path`.
    /// On error the manifest is left as it was.
    pub fn load_xml_file(&mut self, path: impl AsRef<Path>) -> Result<(), ManifestError> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).map_err(|e| ManifestError::io("read project", path, e))?;
        let decoded = self.decode(&text, &format!("project file '{}'", path.display()))?;
        self.assign(decoded);
        self.base_dir = path.parent().map(Path::to_path_buf);
        info!(
            "Loaded project '{}': {} experiments, {} input sequences",
            path.display(),
            self.experiment_references.len(),
            self.input_sequences.len()
        );
        Ok(())
    }

    /// Like [`load_xml_file`](Self::load_xml_file) for an in-memory document.
    /// Relative experiment paths then resolve against the working directory.
    pub fn load_xml_str(&mut self, xml: &str) -> Result<(), ManifestError> {
        let decoded = self.decode(xml, "project XML")?;
        self.assign(decoded);
        self.base_dir = None;
        Ok(())
    }

    fn assign(&mut self, decoded: DecodedProject) {
        self.tree = Some(decoded.tree);
        self.experiment_references = decoded.experiment_references;
        self.input_sequences = decoded.input_sequences;
        self.output_sequence_dir = Some(decoded.output_sequence_dir);
    }

    fn decode(&self, xml: &str, context: &str) -> Result<DecodedProject, ManifestError> {
        let record = ProjectXml::from_xml_str(xml, context)?;

        let tree_text =
            nonempty(record.tree.as_deref()).ok_or(ManifestError::MissingField(ELEM_TREE))?;
        let tree = parse_newick(tree_text, false).map_err(ManifestError::InvalidTree)?;

        let mut experiment_references = BTreeMap::new();
        for ExperimentRefXml {
            name,
            experiment_path,
        } in record.experiments
        {
            let name = nonempty(name.as_deref())
                .ok_or(ManifestError::MissingField("name"))?
                .to_string();
            let experiment_path = nonempty(experiment_path.as_deref())
                .ok_or(ManifestError::MissingField("experiment_path"))?
                .to_string();
            if experiment_references.contains_key(&name) {
                return Err(ManifestError::DuplicateExperiment(name));
            }
            experiment_references.insert(name, experiment_path);
        }

        let paths = record
            .input_sequences
            .as_deref()
            .map(split_list)
            .ok_or(ManifestError::MissingField(ATTR_INPUT_SEQUENCES))?;
        let input_sequences = match record.input_sequence_ids.as_deref() {
            Some(raw_ids) => {
                let resolver = self.resolver.as_deref().ok_or(ManifestError::NoResolver)?;
                let ids = split_list(raw_ids);
                debug!("Resolving {} input sequence identifiers", ids.len());
                InputSequences::resolve(ids, resolver)?
            }
            None => InputSequences::from_paths(paths),
        };

        let output_sequence_dir = nonempty(record.output_sequence_dir.as_deref())
            .ok_or(ManifestError::MissingField(ATTR_OUTPUT_SEQUENCE_DIR))?
            .to_string();

        let tree = tree
            .with_subtree_roots(experiment_references.keys())
            .map_err(ManifestError::SubtreeRoots)?;
        check_leaf_count(&tree, &input_sequences)?;
        check_leaf_names(&tree)?;

        Ok(DecodedProject {
            tree,
            experiment_references,
            input_sequences,
            output_sequence_dir,
        })
    }

    /// Writes the manifest to `path`, replacing any existing file.
    pub fn store_xml_file(&self, path: impl AsRef<Path>) -> Result<(), ManifestError> {
        let path = path.as_ref();
        let text = self.to_xml_string()?;
        fs::write(path, text).map_err(|e| ManifestError::io("write project", path, e))?;
        info!("Stored project '{}'", path.display());
        Ok(())
    }

    /// Serializes the manifest. When identifiers are present both they and
    /// the resolved paths are written; loading prefers the identifiers.
    pub fn to_xml_string(&self) -> Result<String, ManifestError> {
        let tree = self.tree.as_ref().ok_or(ManifestError::MissingField(ELEM_TREE))?;
        let output_sequence_dir = self
            .output_sequence_dir
            .as_deref()
            .ok_or(ManifestError::MissingField(ATTR_OUTPUT_SEQUENCE_DIR))?;

        let paths = self.input_sequences.paths();
        check_list_values(ATTR_INPUT_SEQUENCES, &paths)?;
        let ids = self.input_sequences.ids();
        if let Some(ids) = &ids {
            check_list_values(ATTR_INPUT_SEQUENCE_IDS, ids)?;
        }

        let record = ProjectXml {
            input_sequences: Some(paths.join(" ")),
            input_sequence_ids: ids.map(|ids| ids.join(" ")),
            output_sequence_dir: Some(output_sequence_dir.to_string()),
            tree: Some(write_newick(tree)),
            experiments: self
                .experiment_references
                .iter()
                .map(|(name, path)| ExperimentRefXml {
                    name: Some(name.clone()),
                    experiment_path: Some(path.clone()),
                })
                .collect(),
        };
        record.to_xml_string()
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn experiment_references(&self) -> &BTreeMap<String, String> {
        &self.experiment_references
    }

    /// Location of the experiment descriptor for `name`; relative locations
    /// are taken relative to the directory of the loaded project file.
    pub fn experiment_path(&self, name: &str) -> Result<PathBuf, ManifestError> {
        let raw = self
            .experiment_references
            .get(name)
            .ok_or_else(|| ManifestError::UnknownExperiment(name.to_string()))?;
        let path = Path::new(raw);
        Ok(match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        })
    }

    pub fn input_sequences(&self) -> &InputSequences {
        &self.input_sequences
    }

    pub fn input_sequence_ids(&self) -> Option<Vec<&str>> {
        self.input_sequences.ids()
    }

    pub fn input_sequence_paths(&self) -> Vec<&str> {
        self.input_sequences.paths()
    }

    pub fn output_sequence_dir(&self) -> Option<&str> {
        self.output_sequence_dir.as_deref()
    }

    /// Leaf name to input sequence, pairing post-order leaves with the
    /// sequence list. A count mismatch means the manifest is corrupt.
    pub fn input_sequence_map(&self) -> Result<BTreeMap<String, String>, ManifestError> {
        let tree = self.tree.as_ref().ok_or(ManifestError::MissingField(ELEM_TREE))?;
        check_leaf_count(tree, &self.input_sequences)?;
        let mut map = BTreeMap::new();
        for (idx, (leaf, seq)) in tree
            .leaves()
            .into_iter()
            .zip(self.input_sequences.iter())
            .enumerate()
        {
            let name = tree.name(leaf).ok_or(ManifestError::UnnamedLeaf(idx))?;
            map.insert(name.to_string(), seq.path().to_string());
        }
        Ok(map)
    }

    /// Resolves `ids` with the configured resolver and replaces the input
    /// sequences with the result. Nothing changes if any step fails.
    pub fn set_input_sequence_ids<I, S>(&mut self, ids: I) -> Result<(), ManifestError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let resolver = self.resolver.as_deref().ok_or(ManifestError::NoResolver)?;
        let input_sequences = InputSequences::resolve(ids, resolver)?;
        if let Some(tree) = &self.tree {
            check_leaf_count(tree, &input_sequences)?;
        }
        self.input_sequences = input_sequences;
        Ok(())
    }

    /// Replaces the input sequences with plain paths, dropping identifiers.
    pub fn set_input_sequence_paths<I, S>(&mut self, paths: I) -> Result<(), ManifestError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let input_sequences = InputSequences::from_paths(paths);
        if let Some(tree) = &self.tree {
            check_leaf_count(tree, &input_sequences)?;
        }
        self.input_sequences = input_sequences;
        Ok(())
    }

    pub fn subtree_root_names(&self) -> Vec<&str> {
        self.tree
            .as_ref()
            .map(Tree::subtree_root_names)
            .unwrap_or_default()
    }

    pub fn leaf_names(&self) -> Vec<&str> {
        let Some(tree) = &self.tree else {
            return vec![];
        };
        tree.leaves()
            .into_iter()
            .filter_map(|id| tree.name(id))
            .collect()
    }

    /// Names of the inputs to the sub-problem rooted at `name`: leaf genomes
    /// and the roots of nested sub-problems.
    pub fn subproblem_inputs(&self, name: &str) -> Result<Vec<String>, ManifestError> {
        if !self.experiment_references.contains_key(name) {
            return Err(ManifestError::UnknownExperiment(name.to_string()));
        }
        let tree = self.tree.as_ref().ok_or(ManifestError::MissingField(ELEM_TREE))?;
        let id = tree
            .find_by_name(name)
            .ok_or_else(|| ManifestError::UnknownExperiment(name.to_string()))?;
        tree.subproblem_inputs(id)
            .into_iter()
            .enumerate()
            .map(|(idx, child)| {
                tree.name(child)
                    .map(str::to_string)
                    .ok_or(ManifestError::UnnamedLeaf(idx))
            })
            .collect()
    }

    /// Configuration used by the experiment of sub-problem `name`.
    pub fn config_path_for(&self, name: &str) -> Result<ConfigRef, ManifestError> {
        let path = self.experiment_path(name)?;
        Ok(ExperimentDescriptor::from_xml_file(&path)?
            .config_path()
            .clone())
    }

    /// The configuration shared by every experiment of the project.
    ///
    /// All descriptors are read; differing configurations are an error rather
    /// than an arbitrary pick.
    pub fn config_path(&self) -> Result<ConfigRef, ManifestError> {
        let mut shared: Option<(&str, ConfigRef)> = None;
        for name in self.experiment_references.keys() {
            let config = self.config_path_for(name)?;
            if let Some((first, first_config)) = &shared {
                if *first_config != config {
                    return Err(ManifestError::InconsistentConfig {
                        first: first.to_string(),
                        first_config: first_config.label(),
                        other: name.clone(),
                        other_config: config.label(),
                    });
                }
                continue;
            }
            shared = Some((name.as_str(), config));
        }
        shared
            .map(|(_, config)| config)
            .ok_or(ManifestError::NoExperiments)
    }

    /// Re-checks every manifest invariant.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let tree = self.tree.as_ref().ok_or(ManifestError::MissingField(ELEM_TREE))?;
        if nonempty(self.output_sequence_dir.as_deref()).is_none() {
            return Err(ManifestError::MissingField(ATTR_OUTPUT_SEQUENCE_DIR));
        }
        let expected: BTreeSet<&str> = self
            .experiment_references
            .keys()
            .map(String::as_str)
            .collect();
        let found: BTreeSet<&str> = tree.subtree_root_names().into_iter().collect();
        if expected != found || tree.subtree_roots().len() != found.len() {
            return Err(ManifestError::SubtreeRootMismatch {
                expected: expected.into_iter().map(str::to_string).collect(),
                found: found.into_iter().map(str::to_string).collect(),
            });
        }
        check_leaf_count(tree, &self.input_sequences)?;
        check_leaf_names(tree)
    }
}

fn check_leaf_count(tree: &Tree, input_sequences: &InputSequences) -> Result<(), ManifestError> {
    let leaves = tree.leaf_count();
    if leaves != input_sequences.len() {
        return Err(ManifestError::LeafCountMismatch {
            leaves,
            sequences: input_sequences.len(),
        });
    }
    Ok(())
}

/// Leaves key the sequence map, so each needs a distinct name.
fn check_leaf_names(tree: &Tree) -> Result<(), ManifestError> {
    let mut seen = BTreeSet::new();
    for (idx, leaf) in tree.leaves().into_iter().enumerate() {
        let name = tree.name(leaf).ok_or(ManifestError::UnnamedLeaf(idx))?;
        if !seen.insert(name) {
            return Err(ManifestError::DuplicateLeafName(name.to_string()));
        }
    }
    Ok(())
}

fn check_list_values(field: &'static str, values: &[&str]) -> Result<(), ManifestError> {
    match values
        .iter()
        .find(|value| value.is_empty() || value.chars().any(char::is_whitespace))
    {
        Some(value) => Err(ManifestError::InvalidListValue {
            field,
            value: value.to_string(),
        }),
        None => Ok(()),
    }
}
