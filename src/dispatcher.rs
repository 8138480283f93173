//! Dispatcher tree: routes submitted parameters to typed bindings
//!
//! Nodes live in an arena and refer to each other by `NodeId`:
//! - `children`: links added by `attach_child`, in attach order
//! - `parents`: back-links, used only to clear unresolved names upward
//!
//! A submission walks the subtree below the node it was submitted to. Every
//! binding named like the parameter applies it (no first-match-wins). Names
//! nobody consumed stay in the node's unresolved set until some later
//! attachment or submission consumes them.
//!
//! The last submission of each node is kept as a snapshot and replayed into
//! children attached afterwards, so late subhandlers still see the values.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, instrument, trace, warn};

use crate::error::ParamError;
use crate::setter::{ParameterOwner, Setter};

/// Flat name → value mapping, in submission order
pub type ParamMap = IndexMap<String, String>;

/// Handle of a node inside one `DispatcherTree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct DispatcherNode {
    /// Owner label for diagnostics
    owner: String,
    /// Parameter name -> setter (registration order)
    bindings: IndexMap<String, Setter>,
    children: Vec<NodeId>,
    parents: Vec<NodeId>,
    /// Last submission, replayed into late children
    snapshot: Option<Rc<ParamMap>>,
    unresolved: BTreeSet<String>,
}

impl DispatcherNode {
    fn new(owner: String) -> Self {
        Self {
            owner,
            bindings: IndexMap::new(),
            children: Vec::new(),
            parents: Vec::new(),
            snapshot: None,
            unresolved: BTreeSet::new(),
        }
    }
}

/// Arena of dispatcher nodes
#[derive(Debug, Default)]
pub struct DispatcherTree {
    nodes: Vec<DispatcherNode>,
}

impl DispatcherTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node bound to `owner`
    pub fn add_node(&mut self, owner: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(DispatcherNode::new(owner.into()));
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First node whose owner label equals `owner`
    pub fn find(&self, owner: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.owner == owner).map(NodeId)
    }

    pub fn owner(&self, id: NodeId) -> Result<&str, ParamError> {
        Ok(&self.node(id)?.owner)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], ParamError> {
        Ok(&self.node(id)?.children)
    }

    pub fn parents(&self, id: NodeId) -> Result<&[NodeId], ParamError> {
        Ok(&self.node(id)?.parents)
    }

    /// Bindings registered directly on `id`
    pub fn bindings(&self, id: NodeId) -> Result<&IndexMap<String, Setter>, ParamError> {
        Ok(&self.node(id)?.bindings)
    }

    /// Last mapping submitted (or replayed) to `id`
    pub fn snapshot(&self, id: NodeId) -> Result<Option<&ParamMap>, ParamError> {
        Ok(self.node(id)?.snapshot.as_deref())
    }

    // ─────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────

    /// Bind `name` on this node only, replacing any earlier binding
    pub fn register(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        setter: Setter,
    ) -> Result<(), ParamError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ParamError::InvalidParameterName {
                name,
                reason: "cannot be empty".into(),
            });
        }

        let node = self.node_mut(id)?;
        debug!(node = %node.owner, name = %name, kind = %setter.declared_kind(), "binding registered");
        node.bindings.insert(name, setter);
        Ok(())
    }

    /// Bind `name` to the setter `setter_name` from the owner's table
    pub fn register_setter<O>(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        owner: &O,
        setter_name: &str,
    ) -> Result<(), ParamError>
    where
        O: ParameterOwner + ?Sized,
    {
        let setter = owner
            .setter(setter_name)
            .ok_or_else(|| ParamError::BindingNotFound {
                owner: owner.owner_name().to_string(),
                setter: setter_name.to_string(),
            })?;
        self.register(id, name, setter)
    }

    // ─────────────────────────────────────────────────────────────
    // Linking
    // ─────────────────────────────────────────────────────────────

    /// Add `child` below `parent` and replay the parent's last submission
    ///
    /// Replay is never strict: names still unresolved may be consumed by a
    /// later attachment. Coercion errors raised during replay are returned,
    /// the link itself stays in place.
    #[instrument(skip(self))]
    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), ParamError> {
        self.node(parent)?;
        self.node(child)?;

        if self.has_path(child, parent) {
            return Err(ParamError::CycleDetected {
                parent: self.nodes[parent.0].owner.clone(),
                child: self.nodes[child.0].owner.clone(),
            });
        }

        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parents.push(parent);

        if let Some(snapshot) = self.nodes[parent.0].snapshot.clone() {
            debug!(names = snapshot.len(), "replaying submission into attached child");
            let names: Vec<String> = snapshot.keys().cloned().collect();
            self.submit_snapshot(child, snapshot, &names, false)?;
        }
        Ok(())
    }

    /// Check if `to` is reachable from `from` through child links (BFS)
    fn has_path(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return true;
        }

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();

        queue.push_back(from);
        visited.insert(from);

        while let Some(current) = queue.pop_front() {
            for &next in &self.nodes[current.0].children {
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        false
    }

    // ─────────────────────────────────────────────────────────────
    // Submission
    // ─────────────────────────────────────────────────────────────

    /// Submit every name in `values`
    pub fn submit(&mut self, id: NodeId, values: &ParamMap, strict: bool) -> Result<(), ParamError> {
        let names: Vec<String> = values.keys().cloned().collect();
        self.submit_names(id, values, &names, strict)
    }

    /// Submit the subset `names` of `values`
    ///
    /// `values` becomes this node's snapshot either way. With `strict`, any
    /// name left in the unresolved set afterwards fails the call; values
    /// applied before the failure stay applied.
    ///
    /// Every entry of `names` must have a value in `values`. A name without
    /// one fails with `MissingValue` before any binding is looked up for it,
    /// so it is never recorded as unresolved.
    #[instrument(skip(self, values, names), fields(count = names.len()))]
    pub fn submit_names<S: AsRef<str>>(
        &mut self,
        id: NodeId,
        values: &ParamMap,
        names: &[S],
        strict: bool,
    ) -> Result<(), ParamError> {
        self.node(id)?;
        self.submit_snapshot(id, Rc::new(values.clone()), names, strict)
    }

    fn submit_snapshot<S: AsRef<str>>(
        &mut self,
        id: NodeId,
        snapshot: Rc<ParamMap>,
        names: &[S],
        strict: bool,
    ) -> Result<(), ParamError> {
        self.nodes[id.0].snapshot = Some(Rc::clone(&snapshot));

        for name in names {
            let name = name.as_ref();
            let value = snapshot.get(name).ok_or_else(|| ParamError::MissingValue {
                name: name.to_string(),
            })?;
            self.dispatch(id, name, value)?;
        }

        let node = &self.nodes[id.0];
        if strict && !node.unresolved.is_empty() {
            let names = node.unresolved.clone();
            warn!(node = %node.owner, unresolved = ?names, "strict submission left parameters unhandled");
            let mut handled = Vec::new();
            self.collect_handled(id, &mut handled);
            return Err(ParamError::UnresolvedParameters { names, handled });
        }
        Ok(())
    }

    /// Apply `name` here and in every child; returns whether anything took it
    fn dispatch(&mut self, id: NodeId, name: &str, value: &str) -> Result<bool, ParamError> {
        let mut handled = false;

        if let Some(setter) = self.nodes[id.0].bindings.get(name) {
            setter.apply(name, value)?;
            debug!(node = %self.nodes[id.0].owner, name, value, "parameter applied");
            handled = true;
        }

        let children = self.nodes[id.0].children.clone();
        for child in children {
            if self.dispatch(child, name, value)? {
                handled = true;
            }
        }

        if handled {
            self.mark_resolved(id, name);
        } else {
            self.nodes[id.0].unresolved.insert(name.to_string());
        }
        Ok(handled)
    }

    /// Clear `name` here and in every ancestor
    fn mark_resolved(&mut self, id: NodeId, name: &str) {
        if self.nodes[id.0].unresolved.remove(name) {
            trace!(node = %self.nodes[id.0].owner, name, "unresolved parameter cleared");
        }
        let parents = self.nodes[id.0].parents.clone();
        for parent in parents {
            self.mark_resolved(parent, name);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────

    /// Every name this subtree can bind: own bindings first, then each
    /// child depth-first. Duplicates across nodes are kept.
    pub fn list_handled_names(&self, id: NodeId) -> Result<Vec<String>, ParamError> {
        self.node(id)?;
        let mut names = Vec::new();
        self.collect_handled(id, &mut names);
        Ok(names)
    }

    fn collect_handled(&self, id: NodeId, out: &mut Vec<String>) {
        let node = &self.nodes[id.0];
        out.extend(node.bindings.keys().cloned());
        for &child in &node.children {
            self.collect_handled(child, out);
        }
    }

    /// This node's own unresolved names (descendants not included)
    pub fn unresolved(&self, id: NodeId) -> Result<&BTreeSet<String>, ParamError> {
        Ok(&self.node(id)?.unresolved)
    }

    fn node(&self, id: NodeId) -> Result<&DispatcherNode, ParamError> {
        self.nodes
            .get(id.0)
            .ok_or(ParamError::UnknownNode { index: id.0 })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut DispatcherNode, ParamError> {
        self.nodes
            .get_mut(id.0)
            .ok_or(ParamError::UnknownNode { index: id.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Model {
        alpha: f64,
        steps: i32,
        verbose: bool,
        label: String,
    }

    /// Setter table over a shared `Model`
    struct ModelOwner {
        name: &'static str,
        state: Rc<RefCell<Model>>,
    }

    impl ModelOwner {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                state: Rc::new(RefCell::new(Model::default())),
            }
        }

        fn get(&self) -> Model {
            self.state.borrow().clone()
        }
    }

    impl ParameterOwner for ModelOwner {
        fn owner_name(&self) -> &str {
            self.name
        }

        fn setter(&self, setter_name: &str) -> Option<Setter> {
            let state = Rc::clone(&self.state);
            match setter_name {
                "set_alpha" => Some(Setter::float(move |v| state.borrow_mut().alpha = v)),
                "set_steps" => Some(Setter::int(move |v| state.borrow_mut().steps = v)),
                "set_verbose" => Some(Setter::bool(move |v| state.borrow_mut().verbose = v)),
                "set_label" => Some(Setter::text(move |v| state.borrow_mut().label = v)),
                _ => None,
            }
        }
    }

    fn params(pairs: &[(&str, &str)]) -> ParamMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    /// Node bound to all four setters of a fresh owner
    fn full_node(tree: &mut DispatcherTree, name: &'static str) -> (NodeId, ModelOwner) {
        let owner = ModelOwner::new(name);
        let id = tree.add_node(name);
        tree.register_setter(id, "alpha", &owner, "set_alpha").unwrap();
        tree.register_setter(id, "steps", &owner, "set_steps").unwrap();
        tree.register_setter(id, "verbose", &owner, "set_verbose").unwrap();
        tree.register_setter(id, "label", &owner, "set_label").unwrap();
        (id, owner)
    }

    // ═══════════════════════════════════════════════════════════════
    // Registration
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn register_setter_unknown_name_fails() {
        let mut tree = DispatcherTree::new();
        let owner = ModelOwner::new("model");
        let id = tree.add_node("model");

        let err = tree
            .register_setter(id, "alpha", &owner, "set_gamma")
            .unwrap_err();
        assert!(matches!(err, ParamError::BindingNotFound { ref setter, .. } if setter == "set_gamma"));
        assert!(tree.bindings(id).unwrap().is_empty());
    }

    #[test]
    fn register_rejects_empty_name() {
        let mut tree = DispatcherTree::new();
        let id = tree.add_node("model");
        let err = tree.register(id, "", Setter::text(|_| {})).unwrap_err();
        assert!(matches!(err, ParamError::InvalidParameterName { .. }));
    }

    #[test]
    fn later_binding_overwrites_silently() {
        let mut tree = DispatcherTree::new();
        let owner = ModelOwner::new("model");
        let id = tree.add_node("model");
        tree.register_setter(id, "x", &owner, "set_alpha").unwrap();
        tree.register_setter(id, "x", &owner, "set_steps").unwrap();

        tree.submit(id, &params(&[("x", "9")]), true).unwrap();
        assert_eq!(owner.get().steps, 9);
        assert_eq!(owner.get().alpha, 0.0);
        assert_eq!(tree.list_handled_names(id).unwrap(), vec!["x"]);
    }

    #[test]
    fn unknown_node_is_rejected() {
        let mut tree = DispatcherTree::new();
        let mut other = DispatcherTree::new();
        other.add_node("a");
        let foreign = other.add_node("b");

        assert!(matches!(
            tree.submit(foreign, &ParamMap::new(), false),
            Err(ParamError::UnknownNode { index: 1 })
        ));
    }

    // ═══════════════════════════════════════════════════════════════
    // Coercion per kind
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn applies_each_kind_to_owner_state() {
        let mut tree = DispatcherTree::new();
        let (id, owner) = full_node(&mut tree, "model");

        tree.submit(
            id,
            &params(&[("alpha", "0.75"), ("steps", "-12"), ("verbose", "TRUE"), ("label", "run a")]),
            true,
        )
        .unwrap();

        assert_eq!(
            owner.get(),
            Model {
                alpha: 0.75,
                steps: -12,
                verbose: true,
                label: "run a".into(),
            }
        );

        tree.submit(id, &params(&[("verbose", "false")]), true).unwrap();
        assert!(!owner.get().verbose);
    }

    #[test]
    fn unrecognized_boolean_text_reads_as_false() {
        let mut tree = DispatcherTree::new();
        let (id, owner) = full_node(&mut tree, "model");
        owner.state.borrow_mut().verbose = true;

        tree.submit(id, &params(&[("verbose", "yes")]), true).unwrap();
        assert!(!owner.get().verbose);
        assert!(tree.unresolved(id).unwrap().is_empty());
    }

    #[test]
    fn resubmission_overwrites_previous_value() {
        let mut tree = DispatcherTree::new();
        let (id, owner) = full_node(&mut tree, "model");

        tree.submit(id, &params(&[("alpha", "1.5")]), true).unwrap();
        assert_eq!(owner.get().alpha, 1.5);
        tree.submit(id, &params(&[("alpha", "2.5")]), true).unwrap();
        assert_eq!(owner.get().alpha, 2.5);
    }

    #[test]
    fn coercion_error_keeps_earlier_applications() {
        let mut tree = DispatcherTree::new();
        let (id, owner) = full_node(&mut tree, "model");

        let err = tree
            .submit(
                id,
                &params(&[("alpha", "0.5"), ("steps", "many"), ("label", "never")]),
                false,
            )
            .unwrap_err();

        assert!(matches!(err, ParamError::Coercion { ref name, .. } if name == "steps"));
        assert_eq!(owner.get().alpha, 0.5);
        assert_eq!(owner.get().label, "");
    }

    #[test]
    fn unsupported_kind_fails_when_applied() {
        let mut tree = DispatcherTree::new();
        let id = tree.add_node("model");
        tree.register(id, "items", Setter::dynamic("list", |_| {})).unwrap();

        tree.submit(id, &params(&[("other", "1")]), false).unwrap();
        let err = tree.submit(id, &params(&[("items", "a,b")]), false).unwrap_err();
        assert!(matches!(err, ParamError::UnsupportedValueKind { ref kind, .. } if kind == "list"));
    }

    // ═══════════════════════════════════════════════════════════════
    // Unresolved bookkeeping
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn unbound_name_stays_unresolved_when_lenient() {
        let mut tree = DispatcherTree::new();
        let (id, _owner) = full_node(&mut tree, "model");

        tree.submit(id, &params(&[("alpha", "1"), ("gamma", "2")]), false).unwrap();
        assert_eq!(names(tree.unresolved(id).unwrap()), vec!["gamma"]);
    }

    #[test]
    fn strict_submission_reports_offending_and_known_names() {
        let mut tree = DispatcherTree::new();
        let (id, owner) = full_node(&mut tree, "model");

        let err = tree
            .submit(id, &params(&[("alpha", "1"), ("gamma", "2")]), true)
            .unwrap_err();

        match err {
            ParamError::UnresolvedParameters { names, handled } => {
                assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["gamma"]);
                assert_eq!(handled, vec!["alpha", "steps", "verbose", "label"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        // applied before the strict check
        assert_eq!(owner.get().alpha, 1.0);
    }

    #[test]
    fn submit_names_processes_only_requested_subset() {
        let mut tree = DispatcherTree::new();
        let (id, owner) = full_node(&mut tree, "model");
        let values = params(&[("alpha", "3"), ("steps", "4"), ("gamma", "5")]);

        tree.submit_names(id, &values, &["steps"], true).unwrap();
        assert_eq!(owner.get().steps, 4);
        assert_eq!(owner.get().alpha, 0.0);
        assert!(tree.unresolved(id).unwrap().is_empty());
        assert_eq!(tree.snapshot(id).unwrap(), Some(&values));
    }

    #[test]
    fn submit_names_missing_value_fails() {
        let mut tree = DispatcherTree::new();
        let (id, _owner) = full_node(&mut tree, "model");

        let err = tree
            .submit_names(id, &params(&[("alpha", "3")]), &["steps"], false)
            .unwrap_err();
        assert!(matches!(err, ParamError::MissingValue { ref name } if name == "steps"));
        assert!(tree.unresolved(id).unwrap().is_empty());
    }

    #[test]
    fn strict_check_covers_names_left_from_earlier_submissions() {
        let mut tree = DispatcherTree::new();
        let (id, _owner) = full_node(&mut tree, "model");

        tree.submit(id, &params(&[("gamma", "1")]), false).unwrap();
        let err = tree.submit(id, &params(&[("alpha", "1")]), true).unwrap_err();
        assert!(matches!(err, ParamError::UnresolvedParameters { ref names, .. } if names.contains("gamma")));
    }

    // ═══════════════════════════════════════════════════════════════
    // Propagation through the tree
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn every_matching_binding_receives_the_value() {
        let mut tree = DispatcherTree::new();
        let root = tree.add_node("root");
        let (left, left_owner) = full_node(&mut tree, "left");
        let (right, right_owner) = full_node(&mut tree, "right");
        tree.attach_child(root, left).unwrap();
        tree.attach_child(root, right).unwrap();

        tree.submit(root, &params(&[("steps", "8")]), true).unwrap();
        assert_eq!(left_owner.get().steps, 8);
        assert_eq!(right_owner.get().steps, 8);
        assert!(tree.unresolved(root).unwrap().is_empty());
    }

    #[test]
    fn own_binding_does_not_stop_descent() {
        let mut tree = DispatcherTree::new();
        let (root, root_owner) = full_node(&mut tree, "root");
        let (child, child_owner) = full_node(&mut tree, "child");
        tree.attach_child(root, child).unwrap();

        tree.submit(root, &params(&[("label", "shared")]), true).unwrap();
        assert_eq!(root_owner.get().label, "shared");
        assert_eq!(child_owner.get().label, "shared");
    }

    #[test]
    fn child_without_binding_records_name_locally() {
        let mut tree = DispatcherTree::new();
        let (root, _root_owner) = full_node(&mut tree, "root");
        let child = tree.add_node("child");
        tree.attach_child(root, child).unwrap();

        tree.submit(root, &params(&[("alpha", "1")]), true).unwrap();
        assert!(tree.unresolved(root).unwrap().is_empty());
        assert_eq!(names(tree.unresolved(child).unwrap()), vec!["alpha"]);
    }

    // ═══════════════════════════════════════════════════════════════
    // Late attachment and replay
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn late_child_resolves_parent_without_resubmission() {
        let mut tree = DispatcherTree::new();
        let root = tree.add_node("root");
        tree.submit(root, &params(&[("alpha", "0.1")]), false).unwrap();
        assert_eq!(names(tree.unresolved(root).unwrap()), vec!["alpha"]);

        let (child, child_owner) = full_node(&mut tree, "child");
        tree.attach_child(root, child).unwrap();

        assert_eq!(child_owner.get().alpha, 0.1);
        assert!(tree.unresolved(root).unwrap().is_empty());
        assert!(tree.unresolved(child).unwrap().is_empty());
    }

    #[test]
    fn resolution_clears_all_ancestors() {
        let mut tree = DispatcherTree::new();
        let root = tree.add_node("root");
        let middle = tree.add_node("middle");
        tree.attach_child(root, middle).unwrap();

        tree.submit(root, &params(&[("steps", "3")]), false).unwrap();
        assert_eq!(names(tree.unresolved(root).unwrap()), vec!["steps"]);
        assert_eq!(names(tree.unresolved(middle).unwrap()), vec!["steps"]);

        // middle never got a snapshot of its own: resubmit there, then attach
        tree.submit(middle, &params(&[("steps", "3")]), false).unwrap();
        let (leaf, leaf_owner) = full_node(&mut tree, "leaf");
        tree.attach_child(middle, leaf).unwrap();

        assert_eq!(leaf_owner.get().steps, 3);
        assert!(tree.unresolved(middle).unwrap().is_empty());
        assert!(tree.unresolved(root).unwrap().is_empty());
    }

    #[test]
    fn replayed_child_keeps_snapshot_for_its_own_late_children() {
        let mut tree = DispatcherTree::new();
        let root = tree.add_node("root");
        tree.submit(root, &params(&[("label", "deep")]), false).unwrap();

        let middle = tree.add_node("middle");
        tree.attach_child(root, middle).unwrap();
        assert_eq!(names(tree.unresolved(root).unwrap()), vec!["label"]);

        let (leaf, leaf_owner) = full_node(&mut tree, "leaf");
        tree.attach_child(middle, leaf).unwrap();

        assert_eq!(leaf_owner.get().label, "deep");
        assert!(tree.unresolved(middle).unwrap().is_empty());
        assert!(tree.unresolved(root).unwrap().is_empty());
    }

    #[test]
    fn resolution_reaches_every_parent() {
        let mut tree = DispatcherTree::new();
        let a = tree.add_node("a");
        let b = tree.add_node("b");
        let shared = tree.add_node("shared");
        tree.attach_child(a, shared).unwrap();
        tree.attach_child(b, shared).unwrap();

        tree.submit(a, &params(&[("alpha", "1")]), false).unwrap();
        tree.submit(b, &params(&[("alpha", "1")]), false).unwrap();
        assert!(tree.unresolved(a).unwrap().contains("alpha"));
        assert!(tree.unresolved(b).unwrap().contains("alpha"));

        tree.submit(shared, &params(&[("alpha", "1")]), false).unwrap();
        let (leaf, _owner) = full_node(&mut tree, "leaf");
        tree.attach_child(shared, leaf).unwrap();

        assert!(tree.unresolved(a).unwrap().is_empty());
        assert!(tree.unresolved(b).unwrap().is_empty());
    }

    #[test]
    fn replay_is_never_strict() {
        let mut tree = DispatcherTree::new();
        let root = tree.add_node("root");
        tree.submit(root, &params(&[("alpha", "1"), ("gamma", "2")]), false).unwrap();

        let (child, _owner) = full_node(&mut tree, "child");
        tree.attach_child(root, child).unwrap();
        assert_eq!(names(tree.unresolved(root).unwrap()), vec!["gamma"]);
    }

    #[test]
    fn replay_surfaces_coercion_errors_but_keeps_link() {
        let mut tree = DispatcherTree::new();
        let root = tree.add_node("root");
        tree.submit(root, &params(&[("steps", "lots")]), false).unwrap();

        let (child, _owner) = full_node(&mut tree, "child");
        assert!(matches!(
            tree.attach_child(root, child),
            Err(ParamError::Coercion { .. })
        ));
        assert_eq!(tree.children(root).unwrap(), &[child]);
        assert_eq!(tree.parents(child).unwrap(), &[root]);
    }

    #[test]
    fn attach_without_snapshot_only_links() {
        let mut tree = DispatcherTree::new();
        let root = tree.add_node("root");
        let (child, owner) = full_node(&mut tree, "child");
        tree.attach_child(root, child).unwrap();

        assert_eq!(owner.get(), Model::default());
        assert!(tree.snapshot(child).unwrap().is_none());
    }

    #[test]
    fn cycles_are_refused() {
        let mut tree = DispatcherTree::new();
        let a = tree.add_node("a");
        let b = tree.add_node("b");
        let c = tree.add_node("c");
        tree.attach_child(a, b).unwrap();
        tree.attach_child(b, c).unwrap();

        assert!(matches!(tree.attach_child(c, a), Err(ParamError::CycleDetected { .. })));
        assert!(matches!(tree.attach_child(a, a), Err(ParamError::CycleDetected { .. })));
        assert!(tree.children(c).unwrap().is_empty());
    }

    // ═══════════════════════════════════════════════════════════════
    // Handled-name enumeration
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn handled_names_keep_order_and_duplicates() {
        let mut tree = DispatcherTree::new();
        let root = tree.add_node("root");
        let child = tree.add_node("child");
        tree.register(root, "x", Setter::text(|_| {})).unwrap();
        tree.register(child, "y", Setter::text(|_| {})).unwrap();
        tree.register(child, "x", Setter::text(|_| {})).unwrap();
        tree.attach_child(root, child).unwrap();

        assert_eq!(tree.list_handled_names(root).unwrap(), vec!["x", "y", "x"]);
        assert_eq!(tree.list_handled_names(child).unwrap(), vec!["y", "x"]);
    }

    #[test]
    fn handled_names_are_depth_first() {
        let mut tree = DispatcherTree::new();
        let root = tree.add_node("root");
        let a = tree.add_node("a");
        let a1 = tree.add_node("a1");
        let b = tree.add_node("b");
        for (id, name) in [(root, "r"), (a, "a"), (a1, "a1"), (b, "b")] {
            tree.register(id, name, Setter::text(|_| {})).unwrap();
        }
        tree.attach_child(root, a).unwrap();
        tree.attach_child(root, b).unwrap();
        tree.attach_child(a, a1).unwrap();

        assert_eq!(tree.list_handled_names(root).unwrap(), vec!["r", "a", "a1", "b"]);
    }

    #[test]
    fn find_by_owner() {
        let mut tree = DispatcherTree::new();
        tree.add_node("a");
        let b = tree.add_node("b");
        assert_eq!(tree.find("b"), Some(b));
        assert_eq!(tree.find("zzz"), None);
        assert_eq!(tree.owner(b).unwrap(), "b");
        assert_eq!(tree.len(), 2);
    }
}
