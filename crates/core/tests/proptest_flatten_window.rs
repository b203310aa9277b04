//! Property-based invariant tests for flattening and windowing.
//!
//! 1. Flatten output is the pre-order of the tree with collapsed subtrees cut.
//! 2. Flatten is idempotent.
//! 3. Flatten does not depend on the order the collapsed set was built in.
//! 4. The severity filter removes exactly the failing nodes and counts them.
//! 5. The window is one contiguous, duplicate-free range covering every row
//!    that overlaps the viewport and nothing past the overscan.

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use tracelens_core::model::{CollapsedSet, NodeIdx, ObservationTree};
use tracelens_core::views::{RowHeights, Virtualizer, flatten};
use tracelens_protocol::{Observation, ObservationLevel, ObservationType, TraceContext, Usage};

// ── Helpers ─────────────────────────────────────────────────────────────

fn ts(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Node `i` may only point at an earlier node, so the input is acyclic.
fn node_strategy() -> impl Strategy<Value = Vec<(Option<usize>, u8, u16)>> {
    prop::collection::vec((any::<Option<prop::sample::Index>>(), 0u8..4, any::<u16>()), 0..40)
        .prop_map(|nodes| {
            nodes
                .into_iter()
                .enumerate()
                .map(|(i, (parent, level, start))| {
                    let parent = parent.filter(|_| i > 0).map(|p| p.index(i));
                    (parent, level, start)
                })
                .collect()
        })
}

fn build(nodes: &[(Option<usize>, u8, u16)]) -> ObservationTree {
    let observations = nodes
        .iter()
        .enumerate()
        .map(|(i, &(parent, level, start))| Observation {
            id: format!("n{i}").into(),
            parent_observation_id: parent.map(|p| format!("n{p}").into()),
            observation_type: ObservationType::Span,
            name: None,
            level: ObservationLevel::ALL[usize::from(level)],
            status_message: None,
            start_time: ts(i64::from(start)),
            end_time: Some(ts(i64::from(start) + 10)),
            completion_start_time: None,
            model: None,
            usage: Usage::default(),
            input_cost: None,
            output_cost: None,
            total_cost: None,
        })
        .collect();
    let trace = TraceContext {
        id: "trace".into(),
        name: None,
        timestamp: ts(0),
        latency: Some(70.0),
        total_cost: None,
        user_id: None,
        session_id: None,
        tags: Vec::new(),
    };
    ObservationTree::build(trace, observations)
}

/// Straightforward recursive pre-order, skipping below collapsed nodes.
fn reference_order(tree: &ObservationTree, collapsed: &CollapsedSet) -> Vec<(String, u32)> {
    fn walk(
        tree: &ObservationTree,
        collapsed: &CollapsedSet,
        idx: NodeIdx,
        depth: u32,
        out: &mut Vec<(String, u32)>,
    ) {
        let node = tree.node(idx);
        out.push((node.observation.id.to_string(), depth));
        if collapsed.contains(&node.observation.id) {
            return;
        }
        for &child in &node.children {
            walk(tree, collapsed, child, depth + 1, out);
        }
    }

    let mut out = vec![("trace".to_string(), 0)];
    for &root in tree.roots() {
        walk(tree, collapsed, root, 1, &mut out);
    }
    out
}

fn collapsed_subset(nodes: usize, picks: &[prop::sample::Index]) -> Vec<String> {
    if nodes == 0 {
        return Vec::new();
    }
    picks.iter().map(|p| format!("n{}", p.index(nodes))).collect()
}

// ═════════════════════════════════════════════════════════════════════════
// 1-3. Flatten structure
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn flatten_matches_reference_preorder(
        nodes in node_strategy(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let tree = build(&nodes);
        let collapsed: CollapsedSet = collapsed_subset(nodes.len(), &picks)
            .iter()
            .map(String::as_str)
            .collect();
        let flat = flatten(&tree, &collapsed, None);
        let actual: Vec<(String, u32)> = flat
            .rows
            .iter()
            .map(|r| (r.id.to_string(), r.depth))
            .collect();
        prop_assert_eq!(&actual, &reference_order(&tree, &collapsed));
        prop_assert_eq!(flat.rows[0].depth, 0);
        prop_assert_eq!(flat.hidden_count, 0);
    }

    #[test]
    fn flatten_is_idempotent(
        nodes in node_strategy(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
        level in prop::option::of(0usize..4),
    ) {
        let tree = build(&nodes);
        let collapsed: CollapsedSet = collapsed_subset(nodes.len(), &picks)
            .iter()
            .map(String::as_str)
            .collect();
        let min_level = level.map(|l| ObservationLevel::ALL[l]);
        prop_assert_eq!(
            flatten(&tree, &collapsed, min_level),
            flatten(&tree, &collapsed, min_level)
        );
    }

    #[test]
    fn collapsed_set_order_is_irrelevant(
        nodes in node_strategy(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let tree = build(&nodes);
        let ids = collapsed_subset(nodes.len(), &picks);
        let forward: CollapsedSet = ids.iter().map(String::as_str).collect();
        let backward: CollapsedSet = ids.iter().rev().map(String::as_str).collect();
        prop_assert_eq!(
            flatten(&tree, &forward, None),
            flatten(&tree, &backward, None)
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Severity filter
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn filter_removes_exactly_failing_nodes(
        nodes in node_strategy(),
        level in 0usize..4,
    ) {
        let tree = build(&nodes);
        let min_level = ObservationLevel::ALL[level];
        let flat = flatten(&tree, &CollapsedSet::new(), Some(min_level));

        let failing = nodes.iter().filter(|n| usize::from(n.1) < level).count();
        prop_assert_eq!(flat.hidden_count, failing);
        prop_assert_eq!(flat.len(), 1 + nodes.len() - failing);

        for row in &flat.rows[1..] {
            let idx = tree.find(&row.id).expect("row refers to a tree node");
            prop_assert!(tree.node(idx).observation.level >= min_level);
        }
        // Depth never jumps by more than one between consecutive rows.
        for pair in flat.rows.windows(2) {
            prop_assert!(pair[1].depth <= pair[0].depth + 1);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Windowing
// ═════════════════════════════════════════════════════════════════════════

fn check_window(v: &Virtualizer) -> Result<(), TestCaseError> {
    let n = v.row_count();
    let w = v.window();
    let s = v.scroll_offset();
    let h = v.viewport_height();

    let indices: Vec<usize> = w.items.iter().map(|item| item.index).collect();
    prop_assert_eq!(&indices, &w.range.clone().collect::<Vec<_>>());
    prop_assert!(w.range.end <= n);

    let overlapping: Vec<usize> = (0..n)
        .filter(|&i| {
            let top = v.heights().offset_of(i);
            top < s + h && top + v.heights().size_of(i) > s
        })
        .collect();
    for i in &overlapping {
        prop_assert!(w.range.contains(i), "row {} overlaps but is not rendered", i);
    }
    if let (Some(&first), Some(&last)) = (overlapping.first(), overlapping.last()) {
        prop_assert!(w.range.start >= first.saturating_sub(v.overscan()));
        prop_assert!(w.range.end <= (last + 1 + v.overscan()).min(n));
    } else {
        prop_assert_eq!(n, 0);
    }
    Ok(())
}

proptest! {
    #[test]
    fn fixed_window_is_contiguous_and_covering(
        rows in 0usize..2_000,
        height in 1u32..100,
        viewport in 1u32..2_000,
        overscan in 0usize..20,
        scroll in 0u32..1_000_000,
    ) {
        let mut v = Virtualizer::fixed(f64::from(height), overscan);
        v.set_row_count(rows);
        v.set_viewport_height(f64::from(viewport));
        v.set_scroll_offset(f64::from(scroll));
        check_window(&v)?;
    }

    #[test]
    fn measured_window_is_contiguous_and_covering(
        sizes in prop::collection::vec(1u32..80, 0..300),
        viewport in 1u32..1_000,
        overscan in 0usize..10,
        scroll in 0u32..30_000,
    ) {
        let mut v = Virtualizer::new(RowHeights::measured(20.0), overscan);
        v.set_row_count(sizes.len());
        for (i, size) in sizes.iter().enumerate() {
            v.measure(i, f64::from(*size));
        }
        v.set_viewport_height(f64::from(viewport));
        v.set_scroll_offset(f64::from(scroll));
        check_window(&v)?;
    }
}
