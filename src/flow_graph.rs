//! Dependency graph view (Arc<str> optimized)
//!
//! Uses Arc<str> for zero-cost cloning of node IDs. Dependencies must be
//! declared before their dependents, so the graph stays acyclic and has no
//! dangling edges by construction.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Serialize, Serializer};

use crate::error::{LensError, Result};
use crate::types::{validate_node_id, NodeId, NodeSpec};

/// Outcome of a successful declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declared {
    Inserted,
    /// Same id, same dependency set: nothing changed
    Unchanged,
}

/// Graph of node dependencies built from `node_declared` events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowGraph {
    /// node_id -> declared dependencies (predecessors)
    nodes: BTreeMap<NodeId, NodeSpec>,
    /// node_id -> nodes that depend on it (successors)
    dependents: HashMap<NodeId, Vec<NodeId>>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a declaration without applying it
    pub fn check(&self, id: &str, depends_on: &[NodeId]) -> Result<Declared> {
        validate_node_id(id)?;

        let mut seen: HashSet<&str> = HashSet::with_capacity(depends_on.len());
        let requested: Vec<&str> = depends_on
            .iter()
            .map(|dep| &**dep)
            .filter(|dep| seen.insert(*dep))
            .collect();

        if let Some(existing) = self.nodes.get(id) {
            let existing_set: HashSet<&str> =
                existing.depends_on.iter().map(|dep| &**dep).collect();
            if existing_set == seen {
                return Ok(Declared::Unchanged);
            }
            return Err(LensError::DuplicateNode {
                id: id.to_string(),
                existing: existing.depends_on.iter().map(|d| d.to_string()).collect(),
                requested: requested.iter().map(|d| d.to_string()).collect(),
            });
        }

        for &dep in &requested {
            if self.has_path(id, dep) {
                return Err(LensError::CyclicDependency {
                    id: id.to_string(),
                    dependency: dep.to_string(),
                });
            }
            if !self.contains(dep) {
                return Err(LensError::DanglingDependency {
                    id: id.to_string(),
                    dependency: dep.to_string(),
                });
            }
        }

        Ok(Declared::Inserted)
    }

    /// Declare a node, validating before anything is mutated
    pub fn declare(&mut self, id: &str, depends_on: &[NodeId]) -> Result<Declared> {
        if self.check(id, depends_on)? == Declared::Unchanged {
            return Ok(Declared::Unchanged);
        }

        // Reuse the Arc<str> already stored for each dependency
        let mut deps: Vec<NodeId> = Vec::with_capacity(depends_on.len());
        for dep in depends_on {
            if let Some(key) = self.key(dep) {
                if !deps.contains(key) {
                    deps.push(NodeId::clone(key));
                }
            }
        }
        let id: NodeId = NodeId::from(id);

        for dep in &deps {
            self.dependents
                .entry(NodeId::clone(dep))
                .or_default()
                .push(NodeId::clone(&id));
        }
        self.dependents.entry(NodeId::clone(&id)).or_default();
        self.nodes.insert(id, NodeSpec { depends_on: deps });

        Ok(Declared::Inserted)
    }

    /// Get dependencies of a node (empty if unknown)
    #[inline]
    pub fn dependencies(&self, id: &str) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|spec| spec.depends_on.as_slice())
            .unwrap_or(&[])
    }

    /// Get nodes that depend on `id`
    #[inline]
    pub fn dependents(&self, id: &str) -> &[NodeId] {
        self.dependents
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Stored Arc for `id`, if declared
    #[inline]
    pub fn key(&self, id: &str) -> Option<&NodeId> {
        self.nodes.get_key_value(id).map(|(k, _)| k)
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in id order
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeSpec)> {
        self.nodes.iter()
    }

    /// Nodes with no dependencies
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, spec)| spec.depends_on.is_empty())
            .map(|(id, _)| NodeId::clone(id))
            .collect()
    }

    /// Nodes nothing depends on (final steps)
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .filter(|id| self.dependents(id).is_empty())
            .cloned()
            .collect()
    }

    /// Check if there's a path from `from` to `to` along dependents (BFS)
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        queue.push_back(from);
        visited.insert(from);

        while let Some(current) = queue.pop_front() {
            for next in self.dependents(current) {
                if next.as_ref() == to {
                    return true;
                }
                if visited.insert(next.as_ref()) {
                    queue.push_back(next.as_ref());
                }
            }
        }

        false
    }

    /// Group nodes by depth: layer 0 holds the roots, layer n holds nodes
    /// whose deepest dependency sits in layer n-1. Ids are sorted per layer.
    pub fn layers(&self) -> Vec<Vec<NodeId>> {
        let mut pending: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|(id, spec)| (id.as_ref(), spec.depends_on.len()))
            .collect();
        let mut depth: HashMap<&str, usize> = HashMap::with_capacity(self.nodes.len());
        let mut queue: VecDeque<&NodeId> = self
            .nodes
            .iter()
            .filter(|(_, spec)| spec.depends_on.is_empty())
            .map(|(id, _)| id)
            .collect();

        let mut layers: Vec<Vec<NodeId>> = Vec::new();
        while let Some(id) = queue.pop_front() {
            let level = self
                .dependencies(id)
                .iter()
                .filter_map(|dep| depth.get(&**dep))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(id.as_ref(), level);
            if layers.len() <= level {
                layers.resize_with(level + 1, Vec::new);
            }
            layers[level].push(NodeId::clone(id));

            for next in self.dependents(id) {
                if let Some(count) = pending.get_mut(&**next) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }

        for layer in &mut layers {
            layer.sort();
        }
        layers
    }
}

/// Serializes as `{ id: { depends_on: [id] } }`
impl Serialize for FlowGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.nodes.serialize(serializer)
    }
}
