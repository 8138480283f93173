//! Dispatcher tree descriptions (YAML)
//!
//! ```yaml
//! root: model
//! nodes:
//!   - id: model
//!     bindings:
//!       alpha: float
//!       verbose: bool
//!   - id: sampler
//!     bindings:
//!       steps: int
//!       alpha: float
//! links:
//!   - parent: model
//!     child: sampler
//!     late: true        # attached after the submission
//! ```
//!
//! Every node gets a recording owner: applied values land in a shared
//! `AppliedLog` so hosts can report what went where.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dispatcher::{DispatcherTree, NodeId};
use crate::error::ParamError;
use crate::setter::Setter;
use crate::value::{ParamValue, ValueKind};

/// Tree description parsed from YAML
#[derive(Debug, Clone, Deserialize)]
pub struct TreeConfig {
    /// Node that receives submissions
    pub root: String,
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    /// Parameter name → kind name (`float`, `int`, `bool`, `string`, ...)
    #[serde(default)]
    pub bindings: IndexMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    pub parent: String,
    pub child: String,
    /// Attach only after the first submission (exercises replay)
    #[serde(default)]
    pub late: bool,
}

impl TreeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ParamError> {
        let config: TreeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ParamError> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }

    /// Check ids, endpoints and the root; cycles surface when linking
    pub fn validate(&self) -> Result<(), ParamError> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            validate_node_id(&node.id)?;
            if !seen.insert(node.id.as_str()) {
                return Err(config_error(format!("duplicate node id '{}'", node.id)));
            }
            if node.bindings.keys().any(|name| name.is_empty()) {
                return Err(config_error(format!("node '{}' binds an empty parameter name", node.id)));
            }
        }

        if !seen.contains(self.root.as_str()) {
            return Err(config_error(format!("root '{}' is not a declared node", self.root)));
        }

        for link in &self.links {
            for end in [&link.parent, &link.child] {
                if !seen.contains(end.as_str()) {
                    return Err(config_error(format!(
                        "link {} -> {} references unknown node '{}'",
                        link.parent, link.child, end
                    )));
                }
            }
        }

        Ok(())
    }

    /// Kinds declared in the description that no binding can apply
    pub fn unsupported_kinds(&self) -> Vec<(&str, &str, &str)> {
        self.nodes
            .iter()
            .flat_map(|node| {
                node.bindings
                    .iter()
                    .filter(|(_, kind)| kind.parse::<ValueKind>().is_err())
                    .map(move |(name, kind)| (node.id.as_str(), name.as_str(), kind.as_str()))
            })
            .collect()
    }

    /// Build the tree with all non-late links attached
    ///
    /// Validates first, so configs deserialized directly are checked too.
    pub fn build(&self) -> Result<BuiltTree, ParamError> {
        self.validate()?;

        let log = AppliedLog::default();
        let mut tree = DispatcherTree::new();
        let mut ids = IndexMap::with_capacity(self.nodes.len());

        for node in &self.nodes {
            let id = tree.add_node(node.id.as_str());
            for (name, kind) in &node.bindings {
                tree.register(id, name.as_str(), log.setter(&node.id, name, kind))?;
            }
            ids.insert(node.id.clone(), id);
        }

        let mut late = Vec::new();
        for link in &self.links {
            let (parent, child) = (lookup(&ids, &link.parent)?, lookup(&ids, &link.child)?);
            if link.late {
                late.push((parent, child));
            } else {
                tree.attach_child(parent, child)?;
            }
        }

        let root = lookup(&ids, &self.root)?;
        debug!(nodes = ids.len(), late = late.len(), "dispatcher tree built");
        Ok(BuiltTree {
            tree,
            root,
            ids,
            late,
            log,
        })
    }
}

/// A tree built from a `TreeConfig`
#[derive(Debug)]
pub struct BuiltTree {
    pub tree: DispatcherTree,
    pub root: NodeId,
    /// Node id (config) → arena handle
    pub ids: IndexMap<String, NodeId>,
    /// Links deferred until `attach_late`
    pub late: Vec<(NodeId, NodeId)>,
    pub log: AppliedLog,
}

impl BuiltTree {
    pub fn node(&self, id: &str) -> Result<NodeId, ParamError> {
        lookup(&self.ids, id)
    }

    /// Attach the deferred links in declaration order
    pub fn attach_late(&mut self) -> Result<(), ParamError> {
        for (parent, child) in std::mem::take(&mut self.late) {
            self.tree.attach_child(parent, child)?;
        }
        Ok(())
    }
}

/// One value applied by a recording owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedValue {
    pub node: String,
    pub name: String,
    pub value: ParamValue,
}

/// Shared, ordered record of applied values
#[derive(Debug, Clone, Default)]
pub struct AppliedLog {
    entries: Rc<RefCell<Vec<AppliedValue>>>,
}

impl AppliedLog {
    /// Setter that records into this log under `node`/`name`
    pub fn setter(&self, node: &str, name: &str, kind: &str) -> Setter {
        let entries = Rc::clone(&self.entries);
        let (node, name) = (node.to_string(), name.to_string());
        Setter::dynamic(kind, move |value| {
            entries.borrow_mut().push(AppliedValue {
                node: node.clone(),
                name: name.clone(),
                value,
            })
        })
    }

    pub fn entries(&self) -> Vec<AppliedValue> {
        self.entries.borrow().clone()
    }

    /// Latest value applied to `name` on `node`
    pub fn latest(&self, node: &str, name: &str) -> Option<ParamValue> {
        self.entries
            .borrow()
            .iter()
            .rev()
            .find(|e| e.node == node && e.name == name)
            .map(|e| e.value.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

fn lookup(ids: &IndexMap<String, NodeId>, id: &str) -> Result<NodeId, ParamError> {
    ids.get(id)
        .copied()
        .ok_or_else(|| config_error(format!("unknown node '{id}'")))
}

fn config_error(details: String) -> ParamError {
    ParamError::Config { details }
}

/// Validate a node id
///
/// Node ids follow snake_case: `[a-z][a-z0-9_]*`. Manual single-pass
/// check, no regex.
pub fn validate_node_id(id: &str) -> Result<(), ParamError> {
    let invalid = |reason: &str| config_error(format!("invalid node id '{id}': {reason}"));

    let Some(&first) = id.as_bytes().first() else {
        return Err(invalid("cannot be empty"));
    };
    if !first.is_ascii_lowercase() {
        return Err(invalid("must start with a lowercase letter (a-z)"));
    }
    if id.bytes().skip(1).any(|b| !(b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')) {
        return Err(invalid("only lowercase letters, digits and underscores are allowed"));
    }
    Ok(())
}
