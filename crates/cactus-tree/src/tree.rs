use crate::error::TreeError;
use log::debug;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

pub const DEFAULT_ANCESTOR_PREFIX: &str = "Anc";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Node {
    name: Option<String>,
    branch_length: Option<f64>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    subtree_root: bool,
}

/// Rooted tree with optionally named nodes, stored as an arena.
///
/// Child order is significant: it fixes the post-order traversal, which in turn
/// fixes which input sequence belongs to which leaf.
#[derive(Clone, Debug, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub fn with_root(name: Option<&str>) -> Self {
        Self {
            nodes: vec![Node {
                name: name.map(str::to_string),
                ..Node::default()
            }],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: Option<&str>,
        branch_length: Option<f64>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.map(str::to_string),
            branch_length,
            parent: Some(parent),
            children: vec![],
            subtree_root: false,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].name.as_deref()
    }

    pub fn set_name(&mut self, id: NodeId, name: &str) {
        self.nodes[id.0].name = Some(name.to_string());
    }

    pub fn branch_length(&self, id: NodeId) -> Option<f64> {
        self.nodes[id.0].branch_length
    }

    pub fn set_branch_length(&mut self, id: NodeId, length: Option<f64>) {
        self.nodes[id.0].branch_length = length;
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id.0].children.is_empty()
    }

    /// Children before parents, siblings left to right.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        // (node, children already pushed)
        let mut stack = vec![(self.root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            stack.push((id, true));
            for child in self.children(id).iter().rev() {
                stack.push((*child, false));
            }
        }
        out
    }

    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    pub fn breadth_first(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::from([self.root]);
        while let Some(id) = queue.pop_front() {
            out.push(id);
            queue.extend(self.children(id).iter().copied());
        }
        out
    }

    /// Leaves in post-order, the order input sequences are listed in.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.post_order()
            .into_iter()
            .filter(|id| self.is_leaf(*id))
            .collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.children.is_empty()).count()
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.pre_order()
            .into_iter()
            .find(|id| self.name(*id) == Some(name))
    }

    /// Names every unnamed internal node `{prefix}{n}` in pre-order, skipping
    /// names that are already taken. Returns how many nodes were named.
    pub fn name_unlabeled_internal_nodes(&mut self, prefix: &str) -> usize {
        let taken: HashSet<String> = self.nodes.iter().filter_map(|n| n.name.clone()).collect();
        let mut counter = 0usize;
        let mut named = 0usize;
        for id in self.pre_order() {
            if self.is_leaf(id) || self.name(id).is_some() {
                continue;
            }
            let name = loop {
                let candidate = format!("{prefix}{counter}");
                counter += 1;
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            self.nodes[id.0].name = Some(name);
            named += 1;
        }
        named
    }

    /// Marks exactly the nodes named in `names` as subtree roots and returns
    /// the updated tree.
    ///
    /// Every candidate must name exactly one internal node, and the root must
    /// be among them. On success the set of subtree root names equals the
    /// candidate set.
    pub fn with_subtree_roots<I, S>(mut self, names: I) -> Result<Self, TreeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let candidates: BTreeSet<String> = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();

        let mut by_name: HashMap<&str, Vec<NodeId>> = HashMap::new();
        for id in self.pre_order() {
            if let Some(name) = self.name(id) {
                by_name.entry(name).or_default().push(id);
            }
        }

        let mut marked = Vec::with_capacity(candidates.len());
        for name in &candidates {
            let id = match by_name.get(name.as_str()).map(Vec::as_slice) {
                None | Some([]) => return Err(TreeError::UnknownSubtreeRoot(name.clone())),
                Some([id]) => *id,
                Some(_) => return Err(TreeError::AmbiguousName(name.clone())),
            };
            if self.is_leaf(id) {
                return Err(TreeError::LeafSubtreeRoot(name.clone()));
            }
            marked.push(id);
        }
        if !marked.contains(&self.root) {
            return Err(TreeError::RootNotSubtreeRoot(
                self.name(self.root).unwrap_or("<unnamed>").to_string(),
            ));
        }

        for node in &mut self.nodes {
            node.subtree_root = false;
        }
        for id in &marked {
            self.nodes[id.0].subtree_root = true;
        }
        debug!("Assigned {} subtree roots", marked.len());
        Ok(self)
    }

    pub fn is_subtree_root(&self, id: NodeId) -> bool {
        self.nodes[id.0].subtree_root
    }

    /// Subtree roots in pre-order; the tree root comes first once assigned.
    pub fn subtree_roots(&self) -> Vec<NodeId> {
        self.pre_order()
            .into_iter()
            .filter(|id| self.is_subtree_root(*id))
            .collect()
    }

    pub fn subtree_root_names(&self) -> Vec<&str> {
        self.subtree_roots()
            .into_iter()
            .filter_map(|id| self.name(id))
            .collect()
    }

    /// The inputs of the sub-problem rooted at `id`: descendants reached
    /// without passing through another subtree root, stopping at leaves and
    /// at the child subtree roots themselves.
    pub fn subproblem_inputs(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            if self.is_leaf(current) || self.is_subtree_root(current) {
                out.push(current);
            } else {
                stack.extend(self.children(current).iter().rev());
            }
        }
        out
    }

    /// Same topology, names and branch lengths, with child order significant.
    /// Subtree root marks are not compared.
    pub fn structurally_eq(&self, other: &Tree) -> bool {
        let mut stack = vec![(self.root, other.root)];
        while let Some((a, b)) = stack.pop() {
            if self.name(a) != other.name(b) || self.branch_length(a) != other.branch_length(b) {
                return false;
            }
            let (ca, cb) = (self.children(a), other.children(b));
            if ca.len() != cb.len() {
                return false;
            }
            stack.extend(ca.iter().copied().zip(cb.iter().copied()));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ((A,B)AB,C)root
    fn toy_tree() -> Tree {
        let mut tree = Tree::with_root(Some("root"));
        let root = tree.root();
        let ab = tree.add_child(root, Some("AB"), Some(1.0));
        tree.add_child(ab, Some("A"), Some(1.0));
        tree.add_child(ab, Some("B"), Some(1.0));
        tree.add_child(root, Some("C"), Some(1.0));
        tree
    }

    fn names(tree: &Tree, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|id| tree.name(*id).unwrap_or("-").to_string())
            .collect()
    }

    #[test]
    fn test_traversal_orders() {
        let tree = toy_tree();
        assert_eq!(
            names(&tree, &tree.post_order()),
            vec!["A", "B", "AB", "C", "root"]
        );
        assert_eq!(
            names(&tree, &tree.pre_order()),
            vec!["root", "AB", "A", "B", "C"]
        );
        assert_eq!(
            names(&tree, &tree.breadth_first()),
            vec!["root", "AB", "C", "A", "B"]
        );
        assert_eq!(names(&tree, &tree.leaves()), vec!["A", "B", "C"]);
        assert_eq!(tree.leaf_count(), 3);
    }

    #[test]
    fn test_with_subtree_roots_marks_named_nodes() {
        let tree = toy_tree().with_subtree_roots(["root", "AB"]).unwrap();
        assert_eq!(tree.subtree_root_names(), vec!["root", "AB"]);
        let ab = tree.find_by_name("AB").unwrap();
        assert!(tree.is_subtree_root(ab));
        assert!(!tree.is_subtree_root(tree.find_by_name("A").unwrap()));
    }

    #[test]
    fn test_with_subtree_roots_replaces_previous_marks() {
        let tree = toy_tree()
            .with_subtree_roots(["root", "AB"])
            .unwrap()
            .with_subtree_roots(["root"])
            .unwrap();
        assert_eq!(tree.subtree_root_names(), vec!["root"]);
    }

    #[test]
    fn test_with_subtree_roots_rejects_bad_candidates() {
        assert_eq!(
            toy_tree().with_subtree_roots(["root", "XY"]).unwrap_err(),
            TreeError::UnknownSubtreeRoot("XY".to_string())
        );
        assert_eq!(
            toy_tree().with_subtree_roots(["root", "A"]).unwrap_err(),
            TreeError::LeafSubtreeRoot("A".to_string())
        );
        assert_eq!(
            toy_tree().with_subtree_roots(["AB"]).unwrap_err(),
            TreeError::RootNotSubtreeRoot("root".to_string())
        );

        let mut dup = toy_tree();
        let c = dup.find_by_name("C").unwrap();
        dup.add_child(c, Some("C1"), None);
        dup.add_child(c, Some("C2"), None);
        dup.set_name(c, "AB");
        assert_eq!(
            dup.with_subtree_roots(["root", "AB"]).unwrap_err(),
            TreeError::AmbiguousName("AB".to_string())
        );
    }

    #[test]
    fn test_subproblem_inputs_stop_at_child_subtree_roots() {
        let tree = toy_tree().with_subtree_roots(["root", "AB"]).unwrap();
        let root_inputs = tree.subproblem_inputs(tree.root());
        assert_eq!(names(&tree, &root_inputs), vec!["AB", "C"]);
        let ab = tree.find_by_name("AB").unwrap();
        assert_eq!(names(&tree, &tree.subproblem_inputs(ab)), vec!["A", "B"]);

        let flat = toy_tree().with_subtree_roots(["root"]).unwrap();
        assert_eq!(
            names(&flat, &flat.subproblem_inputs(flat.root())),
            vec!["A", "B", "C"]
        );
    }

    #[test]
    fn test_name_unlabeled_internal_nodes_skips_taken_names() {
        let mut tree = Tree::with_root(None);
        let root = tree.root();
        let inner = tree.add_child(root, None, None);
        tree.add_child(inner, Some("Anc0"), None);
        tree.add_child(inner, Some("x"), None);
        tree.add_child(root, Some("y"), None);

        assert_eq!(tree.name_unlabeled_internal_nodes(DEFAULT_ANCESTOR_PREFIX), 2);
        assert_eq!(tree.name(root), Some("Anc1"));
        assert_eq!(tree.name(inner), Some("Anc2"));
        assert_eq!(tree.name_unlabeled_internal_nodes(DEFAULT_ANCESTOR_PREFIX), 0);
    }

    #[test]
    fn test_structurally_eq() {
        let a = toy_tree();
        let b = toy_tree().with_subtree_roots(["root"]).unwrap();
        assert!(a.structurally_eq(&b));

        let mut c = toy_tree();
        let leaf = c.find_by_name("C").unwrap();
        c.set_branch_length(leaf, Some(2.0));
        assert!(!a.structurally_eq(&c));
    }
}
