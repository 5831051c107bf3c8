//! Plan graph assembly.
//!
//! Nodes are appended in generation order. Every dependency must point at a
//! node that is already in the graph, which keeps the edge set acyclic by
//! construction.

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::plan::{Dependency, NodeId, ResourceNode};
use crate::error::{PlanError, Result};

/// Builds the ordered node list of one plan.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    /// Nodes in insertion order.
    nodes: Vec<ResourceNode>,
    /// Identifiers already present.
    seen: HashSet<NodeId>,
    /// Tags applied to every node.
    tags: BTreeMap<String, String>,
}

impl GraphBuilder {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets tags applied to every node pushed afterwards.
    #[must_use]
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// Appends a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the node id is already taken or a dependency
    /// targets a node that is not in the graph yet.
    pub fn push(&mut self, mut node: ResourceNode) -> Result<()> {
        if self.seen.contains(&node.id) {
            return Err(PlanError::DuplicateNode {
                node: node.id.to_string(),
            }
            .into());
        }

        if let Some(missing) = node
            .depends_on
            .iter()
            .map(Dependency::target)
            .find(|target| !self.seen.contains(*target))
        {
            return Err(PlanError::DependencyResolutionFailed {
                message: format!("{} depends on {missing}, which is not planned before it", node.id),
            }
            .into());
        }

        for (key, value) in &self.tags {
            node.tags.entry(key.clone()).or_insert_with(|| value.clone());
        }

        debug!("Planned {node}");
        self.seen.insert(node.id.clone());
        self.nodes.push(node);
        Ok(())
    }

    /// Returns the number of nodes pushed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no node has been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Consumes the builder and returns the ordered nodes.
    #[must_use]
    pub fn finish(self) -> Vec<ResourceNode> {
        self.nodes
    }
}
