use std::collections::HashMap;
use std::sync::Arc;

use tracelens_protocol::trace::seconds_between;
use tracelens_protocol::{ObservationLevel, SharedStr};
use tracing::debug;

use crate::model::{CollapsedSet, NodeIdx, ObservationTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKind {
    Trace,
    Observation(NodeIdx),
}

/// Where a row sits on the trace's time axis, in seconds from the trace
/// timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineOffsets {
    pub start: f64,
    /// `None` while the observation has not ended.
    pub duration: Option<f64>,
}

/// One visible row.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    pub id: SharedStr,
    pub kind: RowKind,
    pub depth: u32,
    /// Whether expanding this row would show anything.
    pub has_children: bool,
    pub collapsed: bool,
    pub timeline: TimelineOffsets,
}

/// The visible rows plus what the severity filter removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened {
    pub rows: Vec<FlatRow>,
    /// Observations hidden by the minimum-level filter, across the whole
    /// tree regardless of collapse state.
    pub hidden_count: usize,
    positions: HashMap<SharedStr, usize>,
}

impl Flattened {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&FlatRow> {
        self.rows.get(index)
    }

    /// Row index of the trace or observation with this id.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }
}

/// Observations below `min_level` are elided; their visible descendants move
/// up to the nearest visible ancestor.
pub fn flatten(
    tree: &ObservationTree,
    collapsed: &CollapsedSet,
    min_level: Option<ObservationLevel>,
) -> Flattened {
    let trace = tree.trace();
    let passes = |idx: NodeIdx| tree.node(idx).observation.level.passes(min_level);

    let hidden_count = tree
        .nodes()
        .iter()
        .filter(|n| !n.observation.level.passes(min_level))
        .count();
    let visible_below = if min_level.is_some() {
        Some(visible_descendants(tree, &passes))
    } else {
        None
    };

    let mut rows = Vec::with_capacity(tree.node_count() + 1 - hidden_count);
    rows.push(FlatRow {
        id: trace.id.clone(),
        kind: RowKind::Trace,
        depth: 0,
        has_children: !tree.roots().is_empty(),
        collapsed: false,
        timeline: TimelineOffsets {
            start: 0.0,
            duration: trace.latency,
        },
    });

    let mut stack: Vec<(NodeIdx, u32)> = tree.roots().iter().rev().map(|&r| (r, 1)).collect();
    while let Some((idx, depth)) = stack.pop() {
        let node = tree.node(idx);
        if !passes(idx) {
            // Elided: children take this node's place.
            stack.extend(node.children.iter().rev().map(|&c| (c, depth)));
            continue;
        }

        let has_children = match &visible_below {
            Some(below) => below[idx.0],
            None => !node.children.is_empty(),
        };
        let is_collapsed = has_children && collapsed.contains(&node.observation.id);
        let observation = &node.observation;
        rows.push(FlatRow {
            id: observation.id.clone(),
            kind: RowKind::Observation(idx),
            depth,
            has_children,
            collapsed: is_collapsed,
            timeline: TimelineOffsets {
                start: seconds_between(trace.timestamp, observation.start_time),
                duration: observation.latency(),
            },
        });

        if !is_collapsed {
            stack.extend(node.children.iter().rev().map(|&c| (c, depth + 1)));
        }
    }

    let positions = rows
        .iter()
        .enumerate()
        .map(|(i, row)| (row.id.clone(), i))
        .collect();
    Flattened {
        rows,
        hidden_count,
        positions,
    }
}

/// For each node: does any descendant pass the filter?
fn visible_descendants(tree: &ObservationTree, passes: &impl Fn(NodeIdx) -> bool) -> Vec<bool> {
    let mut below = vec![false; tree.node_count()];
    let order: Vec<NodeIdx> = tree.preorder().collect();
    for &idx in order.iter().rev() {
        below[idx.0] = tree
            .children(idx)
            .iter()
            .any(|&c| passes(c) || below[c.0]);
    }
    below
}

/// Last-input cache in front of [`flatten`].
///
/// Returns the same `Arc` while the tree allocation, the collapsed set and
/// the minimum level are unchanged, so consumers can compare outputs with
/// `Arc::ptr_eq`.
#[derive(Debug, Default)]
pub struct FlattenMemo {
    last: Option<MemoEntry>,
    recomputes: usize,
}

#[derive(Debug)]
struct MemoEntry {
    tree: Arc<ObservationTree>,
    collapsed: CollapsedSet,
    min_level: Option<ObservationLevel>,
    output: Arc<Flattened>,
}

impl FlattenMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &mut self,
        tree: &Arc<ObservationTree>,
        collapsed: &CollapsedSet,
        min_level: Option<ObservationLevel>,
    ) -> Arc<Flattened> {
        if let Some(last) = &self.last
            && Arc::ptr_eq(&last.tree, tree)
            && last.min_level == min_level
            && last.collapsed == *collapsed
        {
            return Arc::clone(&last.output);
        }

        let output = Arc::new(flatten(tree, collapsed, min_level));
        self.recomputes += 1;
        debug!(
            rows = output.len(),
            hidden = output.hidden_count,
            collapsed = collapsed.len(),
            "flattened trace tree"
        );
        self.last = Some(MemoEntry {
            tree: Arc::clone(tree),
            collapsed: collapsed.clone(),
            min_level,
            output: Arc::clone(&output),
        });
        output
    }

    /// How many times the tree was actually flattened.
    pub fn recompute_count(&self) -> usize {
        self.recomputes
    }
}
