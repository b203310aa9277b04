use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracelens_protocol::{RenderCommand, SharedStr};

use crate::config::{DisplayToggles, ViewMode};

use super::flatten::FlatRow;

/// Everything a rendered row depends on. Two equal props render equal rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RowProps {
    pub row: FlatRow,
    pub selected: bool,
    pub toggles: DisplayToggles,
    pub view_mode: ViewMode,
    pub width: f64,
    pub row_height: f64,
    /// Identity of the select callback handed to the row.
    pub on_select: usize,
}

#[derive(Debug)]
struct CachedRow {
    props: RowProps,
    commands: Vec<RenderCommand>,
    pass: u64,
}

/// Per-row memo of rendered commands, keyed by row id.
///
/// Entries not touched during a pass are dropped by [`RowCache::finish_pass`],
/// so the cache holds at most one window's worth of rows.
#[derive(Debug, Default)]
pub struct RowCache {
    entries: HashMap<SharedStr, CachedRow>,
    pass: u64,
    renders: usize,
}

impl RowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached commands for `props`, rendering only when the props changed.
    pub fn get_or_render(
        &mut self,
        props: RowProps,
        render: impl FnOnce() -> Vec<RenderCommand>,
    ) -> &[RenderCommand] {
        let pass = self.pass;
        match self.entries.entry(props.row.id.clone()) {
            Entry::Occupied(slot) => {
                let cached = slot.into_mut();
                if cached.props != props {
                    cached.commands = render();
                    cached.props = props;
                    self.renders += 1;
                }
                cached.pass = pass;
                &cached.commands
            }
            Entry::Vacant(slot) => {
                self.renders += 1;
                let cached = slot.insert(CachedRow {
                    props,
                    commands: render(),
                    pass,
                });
                &cached.commands
            }
        }
    }

    /// End a render pass: evict rows that were not requested during it.
    pub fn finish_pass(&mut self) {
        let pass = self.pass;
        self.entries.retain(|_, cached| cached.pass == pass);
        self.pass += 1;
    }

    /// Drop everything, e.g. when the underlying trace changed.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total row renders since creation. Cache hits do not count.
    pub fn render_count(&self) -> usize {
        self.renders
    }
}
