use std::collections::HashMap;

use tracelens_protocol::{Observation, SharedStr, TraceContext};
use tracing::{debug, warn};

/// Index of a node inside an [`ObservationTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIdx(pub usize);

/// One observation plus its position in the tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub observation: Observation,
    pub parent: Option<NodeIdx>,
    pub children: Vec<NodeIdx>,
    /// Own cost plus the cost of every descendant, `None` when nothing in the
    /// subtree reports a cost.
    pub subtree_cost: Option<f64>,
}

/// The observations of one trace arranged as a strict tree.
///
/// Nodes live in an arena ordered by start time; `roots` are the children of
/// the synthetic trace row. Every node has at most one parent and the
/// parent links are acyclic.
#[derive(Debug, Clone)]
pub struct ObservationTree {
    trace: TraceContext,
    nodes: Vec<TreeNode>,
    roots: Vec<NodeIdx>,
    index: HashMap<SharedStr, NodeIdx>,
}

impl ObservationTree {
    /// Build the tree from the flat list the backend serves.
    ///
    /// Siblings are ordered by start time (stable, so ties keep input
    /// order). Unknown parents make a node top-level, duplicate ids keep the
    /// first occurrence, and parent cycles are cut so no observation is lost.
    pub fn build(trace: TraceContext, mut observations: Vec<Observation>) -> Self {
        observations.sort_by_key(|o| o.start_time);

        let mut index = HashMap::with_capacity(observations.len());
        let mut nodes = Vec::with_capacity(observations.len());
        for observation in observations {
            if index.contains_key(&observation.id) {
                warn!(id = %observation.id, "dropping observation with duplicate id");
                continue;
            }
            index.insert(observation.id.clone(), NodeIdx(nodes.len()));
            nodes.push(TreeNode {
                observation,
                parent: None,
                children: Vec::new(),
                subtree_cost: None,
            });
        }

        let mut roots = Vec::new();
        for i in 0..nodes.len() {
            let parent = nodes[i]
                .observation
                .parent_observation_id
                .as_ref()
                .and_then(|pid| {
                    let found = index.get(pid).copied();
                    if found.is_none() {
                        debug!(id = %nodes[i].observation.id, parent = %pid, "parent not in trace, attaching to root");
                    }
                    found
                })
                .filter(|p| p.0 != i);
            match parent {
                Some(p) => {
                    nodes[i].parent = Some(p);
                    nodes[p.0].children.push(NodeIdx(i));
                }
                None => roots.push(NodeIdx(i)),
            }
        }

        let mut tree = Self {
            trace,
            nodes,
            roots,
            index,
        };
        tree.break_cycles();
        tree.compute_subtree_costs();
        tree
    }

    /// Detach nodes that no root can reach; only parent cycles produce them.
    fn break_cycles(&mut self) {
        let mut reachable = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeIdx> = self.roots.clone();
        let mut detached = 0usize;

        loop {
            while let Some(idx) = stack.pop() {
                reachable[idx.0] = true;
                stack.extend(self.nodes[idx.0].children.iter().copied());
            }
            let Some(orphan) = reachable.iter().position(|r| !r) else {
                break;
            };
            if let Some(parent) = self.nodes[orphan].parent.take() {
                self.nodes[parent.0].children.retain(|c| c.0 != orphan);
            }
            self.roots.push(NodeIdx(orphan));
            stack.push(NodeIdx(orphan));
            detached += 1;
        }

        if detached > 0 {
            warn!(detached, "parent cycle in trace, detached nodes to root");
            self.roots.sort();
        }
    }

    fn compute_subtree_costs(&mut self) {
        // Children before parents: reverse pre-order.
        let order: Vec<NodeIdx> = self.preorder().collect();
        for idx in order.into_iter().rev() {
            let node = &self.nodes[idx.0];
            let own = node.observation.cost();
            let children_cost = node
                .children
                .iter()
                .filter_map(|c| self.nodes[c.0].subtree_cost)
                .fold(None, |acc: Option<f64>, c| Some(acc.unwrap_or(0.0) + c));
            let total = match (own, children_cost) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
            };
            self.nodes[idx.0].subtree_cost = total;
        }
    }

    pub fn trace(&self) -> &TraceContext {
        &self.trace
    }

    pub fn roots(&self) -> &[NodeIdx] {
        &self.roots
    }

    pub fn node(&self, idx: NodeIdx) -> &TreeNode {
        &self.nodes[idx.0]
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn children(&self, idx: NodeIdx) -> &[NodeIdx] {
        &self.nodes[idx.0].children
    }

    pub fn find(&self, id: &str) -> Option<NodeIdx> {
        self.index.get(id).copied()
    }

    /// Number of observations, excluding the synthetic trace row.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of every node that has children, i.e. every node collapsing
    /// would affect.
    pub fn ids_with_children(&self) -> impl Iterator<Item = &SharedStr> {
        self.nodes
            .iter()
            .filter(|n| !n.children.is_empty())
            .map(|n| &n.observation.id)
    }

    /// All nodes in pre-order, ignoring any collapse or filter state.
    pub fn preorder(&self) -> impl Iterator<Item = NodeIdx> + '_ {
        let mut stack: Vec<NodeIdx> = self.roots.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let idx = stack.pop()?;
            stack.extend(self.nodes[idx.0].children.iter().rev().copied());
            Some(idx)
        })
    }
}
