//! The trace tree view: flatten → pick mode → window → rows → commands.
//!
//! Host-owned state (collapsed set, selection, minimum level) comes in through
//! [`TreeProps`] on every render; the view owns only derived state: the
//! flatten memo, the scroll position and the per-row command cache.
//!
//! Output layout, in content coordinates:
//!
//! ```text
//! PushTransform(0, -scroll)
//! SetClip(0, scroll, width, height)
//!   BeginGroup(row id)  PushTransform(0, row top)  ...row...  PopTransform  EndGroup
//!   ...
//! ClearClip
//! PopTransform
//! ```

use std::ops::Range;
use std::sync::Arc;

use tracelens_protocol::{ObservationLevel, Point, RenderCommand, SharedStr, Viewport};
use tracing::{debug, trace};

use crate::callback::{StableCallback, callback_id};
use crate::config::{ViewConfig, ViewMode};
use crate::model::{CollapsedSet, Selection, TraceDocument, TreeCallbacks};

use super::flatten::{FlattenMemo, Flattened, RowKind};
use super::mode::{RenderMode, RenderPlan, select_mode};
use super::row_cache::{RowCache, RowProps};
use super::rows::{RowContext, render_row};
use super::window::{Align, RowHeights, Virtualizer};

/// Host state for one render.
pub struct TreeProps<'a> {
    pub document: &'a Arc<TraceDocument>,
    pub collapsed: &'a CollapsedSet,
    pub selection: &'a Selection,
    pub min_level: Option<ObservationLevel>,
    pub callbacks: &'a TreeCallbacks,
    /// Visible extent; the scroll offset is owned by the view.
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub commands: Vec<RenderCommand>,
    pub mode: RenderMode,
    /// Flattened row indices that produced commands.
    pub rendered_range: Range<usize>,
    /// Visible rows after collapse and filtering, trace row included.
    pub row_count: usize,
    /// Observations removed by the minimum-level filter.
    pub hidden_count: usize,
    pub total_height: f64,
    /// The visible region in content coordinates.
    pub viewport: Viewport,
}

pub struct TraceTreeView {
    config: ViewConfig,
    memo: FlattenMemo,
    virtualizer: Virtualizer,
    on_select: StableCallback<Selection>,
    on_toggle: StableCallback<SharedStr>,
    rows: RowCache,
    document: Option<Arc<TraceDocument>>,
    flattened: Option<Arc<Flattened>>,
    last_mode: Option<RenderMode>,
    /// Requested offset, clamped once the next render has sized the list.
    pending_scroll: Option<f64>,
}

impl TraceTreeView {
    pub fn new(config: ViewConfig) -> Self {
        let virtualizer = Virtualizer::fixed(config.row_height(), config.overscan_count);
        Self {
            config,
            memo: FlattenMemo::new(),
            virtualizer,
            on_select: StableCallback::new(),
            on_toggle: StableCallback::new(),
            rows: RowCache::new(),
            document: None,
            flattened: None,
            last_mode: None,
            pending_scroll: None,
        }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ViewConfig) {
        self.virtualizer
            .set_heights(RowHeights::Fixed(config.row_height()));
        self.virtualizer.set_overscan(config.overscan_count);
        self.config = config;
        self.rows.clear();
    }

    pub fn view_mode(&self) -> ViewMode {
        self.config.view_mode
    }

    /// Switch between tree and timeline layout.
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if mode != self.config.view_mode {
            let mut config = self.config.clone();
            config.view_mode = mode;
            self.set_config(config);
        }
    }

    pub fn render(&mut self, props: &TreeProps<'_>) -> RenderOutput {
        let document = props.document;
        let is_new_document = self
            .document
            .as_ref()
            .is_none_or(|last| !Arc::ptr_eq(last, document));
        if is_new_document {
            debug!(nodes = document.node_count(), "tree view received new trace");
            self.rows.clear();
            self.document = Some(Arc::clone(document));
        }

        let flattened = self
            .memo
            .get(&document.tree, props.collapsed, props.min_level);
        self.flattened = Some(Arc::clone(&flattened));

        let mode = select_mode(document.node_count(), self.config.virtualization_threshold);
        if self.last_mode != Some(mode) {
            debug!(?mode, nodes = document.node_count(), "render mode selected");
            self.last_mode = Some(mode);
        }

        self.virtualizer.set_row_count(flattened.len());
        self.virtualizer.set_viewport_height(props.height);
        if let Some(offset) = self.pending_scroll.take() {
            self.virtualizer.set_scroll_offset(offset);
        }
        let plan = match mode {
            RenderMode::Plain => RenderPlan::Plain {
                range: 0..flattened.len(),
            },
            RenderMode::Windowed => RenderPlan::Windowed(self.virtualizer.window()),
        };

        let scroll = self.virtualizer.scroll_offset();
        let viewport = Viewport::new(props.width, props.height).with_scroll(scroll);
        let on_select = self.on_select.get(&props.callbacks.on_select);
        self.on_toggle.get(&props.callbacks.on_toggle_collapse);

        let row_height = self.config.row_height();
        let ctx = RowContext {
            tree: &document.tree,
            scores: &document.scores,
            comment_counts: &document.comment_counts,
            selection: props.selection,
            toggles: self.config.toggles,
            view_mode: self.config.view_mode,
            width: props.width,
            row_height,
        };

        let skip_rows = self.config.view_mode == ViewMode::Timeline
            && document.tree.trace().timeline_span().is_none();
        let range = if skip_rows { 0..0 } else { plan.range() };

        let mut commands = Vec::with_capacity(range.len() * 12 + 4);
        if !range.is_empty() {
            commands.push(RenderCommand::PushTransform {
                translate: Point::new(0.0, -scroll),
            });
            commands.push(RenderCommand::SetClip {
                rect: viewport.rect(),
            });
        }
        for index in range.clone() {
            let row = &flattened.rows[index];
            let top = self.virtualizer.heights().offset_of(index);
            let row_props = RowProps {
                row: row.clone(),
                selected: ctx.is_selected(row),
                toggles: ctx.toggles,
                view_mode: ctx.view_mode,
                width: ctx.width,
                row_height,
                on_select: callback_id(&on_select),
            };
            let body = self.rows.get_or_render(row_props, || render_row(&ctx, row));

            commands.push(RenderCommand::BeginGroup {
                id: row.id.clone(),
                label: row_label(&ctx, row.kind),
            });
            commands.push(RenderCommand::PushTransform {
                translate: Point::new(0.0, top),
            });
            commands.extend_from_slice(body);
            commands.push(RenderCommand::PopTransform);
            commands.push(RenderCommand::EndGroup);
        }
        if !range.is_empty() {
            commands.push(RenderCommand::ClearClip);
            commands.push(RenderCommand::PopTransform);
        }
        self.rows.finish_pass();

        trace!(
            ?range,
            rows = flattened.len(),
            renders = self.rows.render_count(),
            "tree view rendered"
        );
        RenderOutput {
            commands,
            mode,
            rendered_range: range,
            row_count: flattened.len(),
            hidden_count: flattened.hidden_count,
            total_height: self.virtualizer.total_height(),
            viewport,
        }
    }

    /// The rows from the last render.
    pub fn rows(&self) -> Option<&Flattened> {
        self.flattened.as_deref()
    }

    /// Selection a click on row `index` produces.
    pub fn selection_for_row(&self, index: usize) -> Option<Selection> {
        let row = self.flattened.as_ref()?.row(index)?;
        Some(match row.kind {
            RowKind::Trace => Selection::Trace,
            RowKind::Observation(_) => Selection::Observation(row.id.clone()),
        })
    }

    /// Select row `index` through the host's select callback.
    pub fn click_row(&self, index: usize) -> Option<Selection> {
        let selection = self.selection_for_row(index)?;
        if let Some(on_select) = self.on_select.current() {
            on_select(selection.clone());
        }
        Some(selection)
    }

    /// Toggle row `index` through the host's collapse callback. Rows without
    /// visible children and the trace row are not collapsible.
    pub fn toggle_row(&self, index: usize) -> Option<SharedStr> {
        let row = self.flattened.as_ref()?.row(index)?;
        if row.kind == RowKind::Trace || !row.has_children {
            return None;
        }
        if let Some(on_toggle) = self.on_toggle.current() {
            on_toggle(row.id.clone());
        }
        Some(row.id.clone())
    }

    /// Row under a point `y` units below the top of the visible region.
    pub fn row_at(&self, y: f64) -> Option<usize> {
        self.virtualizer.row_at(self.virtualizer.scroll_offset() + y)
    }

    /// Row index of `selection` in the last render, `None` when it is hidden.
    pub fn position_of(&self, selection: &Selection) -> Option<usize> {
        let rows = self.flattened.as_ref()?;
        match selection {
            Selection::Trace => Some(0),
            Selection::Observation(id) => rows.position(id),
        }
    }

    /// The selection `delta` rows away, clamped to the list. A hidden
    /// selection starts from the trace row.
    pub fn step_selection(&self, selection: &Selection, delta: isize) -> Option<Selection> {
        let len = self.flattened.as_ref()?.len();
        let from = self.position_of(selection).unwrap_or(0);
        let to = from.saturating_add_signed(delta).min(len.saturating_sub(1));
        self.selection_for_row(to)
    }

    /// Scroll so the selected row is visible. Returns the new offset, or
    /// `None` when the selection is not among the visible rows.
    pub fn scroll_to_selection(&mut self, selection: &Selection, align: Align) -> Option<f64> {
        let index = self.position_of(selection)?;
        self.pending_scroll = None;
        Some(self.virtualizer.scroll_to_index(index, align))
    }

    pub fn scroll_offset(&self) -> f64 {
        self.virtualizer.scroll_offset()
    }

    /// Takes effect immediately as far as the current rows allow and in
    /// full on the next render.
    pub fn set_scroll_offset(&mut self, offset: f64) {
        self.pending_scroll = Some(offset);
        self.virtualizer.set_scroll_offset(offset);
    }

    pub fn scroll_by(&mut self, delta: f64) {
        let from = self
            .pending_scroll
            .unwrap_or_else(|| self.virtualizer.scroll_offset());
        self.set_scroll_offset(from + delta);
    }

    /// Scroll by whole viewports.
    pub fn scroll_pages(&mut self, pages: f64) {
        let page = self.virtualizer.viewport_height();
        self.scroll_by(page * pages);
    }

    /// Row renders so far; cache hits excluded.
    pub fn render_count(&self) -> usize {
        self.rows.render_count()
    }

    pub fn flatten_count(&self) -> usize {
        self.memo.recompute_count()
    }
}

fn row_label(ctx: &RowContext<'_>, kind: RowKind) -> Option<SharedStr> {
    match kind {
        RowKind::Trace => ctx.tree.trace().name.clone(),
        RowKind::Observation(idx) => ctx.tree.node(idx).observation.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::model::TreeAction;
    use crate::model::tree::tests::{obs, sample_tree, trace};
    use tracelens_protocol::TraceData;

    fn document() -> Arc<TraceDocument> {
        Arc::new(TraceDocument {
            tree: Arc::new(sample_tree()),
            scores: Default::default(),
            comment_counts: Default::default(),
        })
    }

    fn config(threshold: usize) -> ViewConfig {
        ViewConfig {
            virtualization_threshold: threshold,
            overscan_count: 1,
            estimated_row_height: Some(1.0),
            ..ViewConfig::default()
        }
    }

    fn sink() -> (TreeCallbacks, Rc<RefCell<Vec<TreeAction>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink_log = Rc::clone(&log);
        let callbacks = TreeCallbacks::from_sink(move |a| sink_log.borrow_mut().push(a));
        (callbacks, log)
    }

    fn group_ids(commands: &[RenderCommand]) -> Vec<String> {
        commands
            .iter()
            .filter_map(|c| match c {
                RenderCommand::BeginGroup { id, .. } => Some(id.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn small_tree_renders_every_row() {
        let doc = document();
        let (callbacks, _) = sink();
        let mut view = TraceTreeView::new(config(300));
        let out = view.render(&TreeProps {
            document: &doc,
            collapsed: &CollapsedSet::new(),
            selection: &Selection::Trace,
            min_level: None,
            callbacks: &callbacks,
            width: 80.0,
            height: 2.0,
        });
        assert_eq!(out.mode, RenderMode::Plain);
        assert_eq!(out.rendered_range, 0..6);
        assert_eq!(
            group_ids(&out.commands),
            ["trace-1", "node1", "node2", "child2a", "child2b", "node3"]
        );
        assert_eq!(out.total_height, 6.0);
    }

    #[test]
    fn large_tree_is_windowed() {
        let doc = document();
        let (callbacks, _) = sink();
        let mut view = TraceTreeView::new(config(3));
        let out = view.render(&TreeProps {
            document: &doc,
            collapsed: &CollapsedSet::new(),
            selection: &Selection::Trace,
            min_level: None,
            callbacks: &callbacks,
            width: 80.0,
            height: 2.0,
        });
        assert_eq!(out.mode, RenderMode::Windowed);
        // Two visible rows plus one overscan row below.
        assert_eq!(out.rendered_range, 0..3);
        assert_eq!(out.row_count, 6);
    }

    #[test]
    fn rows_are_translated_to_their_offset() {
        let doc = document();
        let (callbacks, _) = sink();
        let mut view = TraceTreeView::new(config(300));
        let out = view.render(&TreeProps {
            document: &doc,
            collapsed: &CollapsedSet::new(),
            selection: &Selection::Trace,
            min_level: None,
            callbacks: &callbacks,
            width: 80.0,
            height: 10.0,
        });
        let tops: Vec<f64> = out
            .commands
            .iter()
            .filter_map(|c| match c {
                RenderCommand::PushTransform { translate } if translate.y >= 0.0 => {
                    Some(translate.y)
                }
                _ => None,
            })
            .collect();
        // Leading transform is the (zero) scroll offset.
        assert_eq!(tops, [0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn click_and_toggle_go_through_callbacks() {
        let doc = document();
        let (callbacks, log) = sink();
        let mut view = TraceTreeView::new(config(300));
        view.render(&TreeProps {
            document: &doc,
            collapsed: &CollapsedSet::new(),
            selection: &Selection::Trace,
            min_level: None,
            callbacks: &callbacks,
            width: 80.0,
            height: 10.0,
        });

        assert_eq!(view.click_row(2), Some(Selection::Observation("node2".into())));
        assert_eq!(view.toggle_row(2), Some("node2".into()));
        // Leaves and the trace row do not toggle.
        assert_eq!(view.toggle_row(1), None);
        assert_eq!(view.toggle_row(0), None);
        assert_eq!(view.click_row(99), None);

        assert_eq!(
            *log.borrow(),
            [
                TreeAction::Select(Selection::Observation("node2".into())),
                TreeAction::ToggleCollapse("node2".into()),
            ]
        );
    }

    #[test]
    fn scroll_to_selection_and_hidden_selection() {
        let doc = document();
        let (callbacks, _) = sink();
        let mut view = TraceTreeView::new(config(0));
        let collapsed: CollapsedSet = ["node2"].into_iter().collect();
        view.render(&TreeProps {
            document: &doc,
            collapsed: &collapsed,
            selection: &Selection::Trace,
            min_level: None,
            callbacks: &callbacks,
            width: 80.0,
            height: 2.0,
        });
        let node3 = Selection::Observation("node3".into());
        assert_eq!(view.scroll_to_selection(&node3, Align::Start), Some(2.0));
        let hidden = Selection::Observation("child2a".into());
        assert_eq!(view.scroll_to_selection(&hidden, Align::Start), None);
        assert_eq!(view.scroll_offset(), 2.0);
    }

    #[test]
    fn step_selection_clamps() {
        let doc = document();
        let (callbacks, _) = sink();
        let mut view = TraceTreeView::new(config(300));
        view.render(&TreeProps {
            document: &doc,
            collapsed: &CollapsedSet::new(),
            selection: &Selection::Trace,
            min_level: None,
            callbacks: &callbacks,
            width: 80.0,
            height: 10.0,
        });
        assert_eq!(
            view.step_selection(&Selection::Trace, 1),
            Some(Selection::Observation("node1".into()))
        );
        assert_eq!(view.step_selection(&Selection::Trace, -1), Some(Selection::Trace));
        assert_eq!(
            view.step_selection(&Selection::Observation("node3".into()), 5),
            Some(Selection::Observation("node3".into()))
        );
    }

    #[test]
    fn timeline_without_latency_renders_no_rows() {
        let mut t = trace();
        t.latency = None;
        let doc = Arc::new(TraceDocument::new(TraceData {
            trace: t,
            observations: vec![obs("a", None, 0)],
            scores: Vec::new(),
            comment_counts: Default::default(),
        }));
        let (callbacks, _) = sink();
        let mut view = TraceTreeView::new(config(300));
        view.set_view_mode(ViewMode::Timeline);
        let out = view.render(&TreeProps {
            document: &doc,
            collapsed: &CollapsedSet::new(),
            selection: &Selection::Trace,
            min_level: None,
            callbacks: &callbacks,
            width: 80.0,
            height: 10.0,
        });
        assert!(out.commands.is_empty());
        assert_eq!(out.row_count, 2);
    }

    #[test]
    fn row_at_accounts_for_scroll() {
        let doc = document();
        let (callbacks, _) = sink();
        let mut view = TraceTreeView::new(config(300));
        view.render(&TreeProps {
            document: &doc,
            collapsed: &CollapsedSet::new(),
            selection: &Selection::Trace,
            min_level: None,
            callbacks: &callbacks,
            width: 80.0,
            height: 2.0,
        });
        view.set_scroll_offset(3.0);
        assert_eq!(view.row_at(0.5), Some(3));
        assert_eq!(view.row_at(10.0), None);
    }

    #[test]
    fn scroll_before_first_render_is_kept() {
        let doc = document();
        let (callbacks, _) = sink();
        let mut view = TraceTreeView::new(config(300));
        view.set_scroll_offset(3.0);
        let out = view.render(&TreeProps {
            document: &doc,
            collapsed: &CollapsedSet::new(),
            selection: &Selection::Trace,
            min_level: None,
            callbacks: &callbacks,
            width: 80.0,
            height: 2.0,
        });
        assert_eq!(out.viewport.y, 3.0);
        assert_eq!(view.scroll_offset(), 3.0);
        assert_eq!(view.row_at(0.5), Some(3));
    }
}
