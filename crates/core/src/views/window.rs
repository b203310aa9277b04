use std::ops::Range;

use tracing::trace;

/// Per-row height source.
#[derive(Debug, Clone, PartialEq)]
pub enum RowHeights {
    /// Every row has the same height.
    Fixed(f64),
    /// Individual heights, defaulting to an estimate until measured.
    Measured(MeasuredHeights),
}

/// Measured row sizes plus their prefix sums.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredHeights {
    estimate: f64,
    sizes: Vec<f64>,
    /// `prefix[i]` is the top of row `i`; `prefix[len]` the total. Always one
    /// longer than `sizes`.
    prefix: Vec<f64>,
}

impl MeasuredHeights {
    fn resize(&mut self, row_count: usize) {
        let kept = self.sizes.len().min(row_count);
        self.sizes.resize(row_count, self.estimate);
        self.prefix.truncate(kept + 1);
        for i in kept..row_count {
            let next = self.prefix[i] + self.sizes[i];
            self.prefix.push(next);
        }
    }

    fn set_size(&mut self, index: usize, size: f64) {
        if index >= self.sizes.len() || self.sizes[index] == size {
            return;
        }
        self.sizes[index] = size;
        for i in index..self.sizes.len() {
            self.prefix[i + 1] = self.prefix[i] + self.sizes[i];
        }
    }
}

impl RowHeights {
    pub fn measured(estimate: f64) -> Self {
        Self::Measured(MeasuredHeights {
            estimate,
            sizes: Vec::new(),
            prefix: vec![0.0],
        })
    }

    /// Grow or shrink the table. Existing measurements are kept.
    fn resize(&mut self, row_count: usize) {
        if let Self::Measured(table) = self {
            table.resize(row_count);
        }
    }

    /// Record a measured height; offsets after `index` shift accordingly.
    pub fn set_size(&mut self, index: usize, size: f64) {
        if let Self::Measured(table) = self {
            table.set_size(index, size);
        }
    }

    pub fn size_of(&self, index: usize) -> f64 {
        match self {
            Self::Fixed(h) => *h,
            Self::Measured(table) => table.sizes.get(index).copied().unwrap_or(table.estimate),
        }
    }

    pub fn offset_of(&self, index: usize) -> f64 {
        match self {
            Self::Fixed(h) => index as f64 * h,
            Self::Measured(table) => table.prefix[index.min(table.prefix.len() - 1)],
        }
    }

    fn total(&self, row_count: usize) -> f64 {
        self.offset_of(row_count)
    }

    /// Row containing `offset`, clamped to the last row.
    fn index_at(&self, offset: f64, row_count: usize) -> usize {
        let last = row_count.saturating_sub(1);
        if offset <= 0.0 {
            return 0;
        }
        match self {
            Self::Fixed(h) if *h > 0.0 => ((offset / h).floor() as usize).min(last),
            Self::Fixed(_) => 0,
            Self::Measured(table) => table.prefix[1..=row_count]
                .partition_point(|&end| end <= offset)
                .min(last),
        }
    }

    /// Last row whose top lies above `end`, clamped to the last row.
    fn last_index_before(&self, end: f64, row_count: usize) -> usize {
        let starts_above = match self {
            Self::Fixed(h) if *h > 0.0 => (end / h).ceil().max(0.0) as usize,
            Self::Fixed(_) => row_count,
            Self::Measured(table) => table.prefix[..row_count].partition_point(|&s| s < end),
        };
        starts_above.min(row_count).saturating_sub(1)
    }
}

/// Where to place a row when scrolling to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    Start,
    Center,
    End,
    /// Scroll the minimum distance that makes the row fully visible.
    #[default]
    Auto,
}

/// A row inside the rendered window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualItem {
    pub index: usize,
    /// Absolute top offset in content coordinates.
    pub start: f64,
    pub size: f64,
}

impl VirtualItem {
    pub fn end(&self) -> f64 {
        self.start + self.size
    }
}

/// The contiguous set of rows to instantiate.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualWindow {
    /// Rendered indices, half-open. Empty only when there are no rows.
    pub range: Range<usize>,
    pub items: Vec<VirtualItem>,
    /// Height of all rows, rendered or not.
    pub total_height: f64,
}

/// Viewport state plus the size table for one scrollable list.
#[derive(Debug, Clone)]
pub struct Virtualizer {
    heights: RowHeights,
    row_count: usize,
    overscan: usize,
    scroll_offset: f64,
    viewport_height: f64,
}

impl Virtualizer {
    pub fn new(heights: RowHeights, overscan: usize) -> Self {
        Self {
            heights,
            row_count: 0,
            overscan,
            scroll_offset: 0.0,
            viewport_height: 0.0,
        }
    }

    pub fn fixed(row_height: f64, overscan: usize) -> Self {
        Self::new(RowHeights::Fixed(row_height), overscan)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    pub fn overscan(&self) -> usize {
        self.overscan
    }

    pub fn heights(&self) -> &RowHeights {
        &self.heights
    }

    pub fn total_height(&self) -> f64 {
        self.heights.total(self.row_count)
    }

    fn max_offset(&self) -> f64 {
        (self.total_height() - self.viewport_height).max(0.0)
    }

    fn clamp_scroll(&mut self) {
        self.scroll_offset = self.scroll_offset.clamp(0.0, self.max_offset());
    }

    pub fn set_row_count(&mut self, row_count: usize) {
        if row_count != self.row_count {
            self.heights.resize(row_count);
            self.row_count = row_count;
            self.clamp_scroll();
        }
    }

    pub fn set_heights(&mut self, heights: RowHeights) {
        self.heights = heights;
        self.heights.resize(self.row_count);
        self.clamp_scroll();
    }

    pub fn set_overscan(&mut self, overscan: usize) {
        self.overscan = overscan;
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport_height = height.max(0.0);
        self.clamp_scroll();
    }

    pub fn measure(&mut self, index: usize, size: f64) {
        self.heights.set_size(index, size);
        self.clamp_scroll();
    }

    pub fn set_scroll_offset(&mut self, offset: f64) {
        self.scroll_offset = if offset.is_finite() { offset } else { 0.0 };
        self.clamp_scroll();
    }

    pub fn scroll_by(&mut self, delta: f64) {
        self.set_scroll_offset(self.scroll_offset + delta);
    }

    /// Scroll so `index` is placed per `align`. Returns the new offset.
    pub fn scroll_to_index(&mut self, index: usize, align: Align) -> f64 {
        if self.row_count == 0 {
            return self.scroll_offset;
        }
        let index = index.min(self.row_count - 1);
        let start = self.heights.offset_of(index);
        let size = self.heights.size_of(index);
        let view = self.viewport_height;

        let target = match align {
            Align::Start => start,
            Align::End => start + size - view,
            Align::Center => start + size / 2.0 - view / 2.0,
            Align::Auto => {
                if start < self.scroll_offset {
                    start
                } else if start + size > self.scroll_offset + view {
                    start + size - view
                } else {
                    self.scroll_offset
                }
            }
        };
        self.set_scroll_offset(target);
        self.scroll_offset
    }

    /// Row at a content-space offset, `None` past either end.
    pub fn row_at(&self, offset: f64) -> Option<usize> {
        if self.row_count == 0 || offset < 0.0 || offset >= self.total_height() {
            return None;
        }
        Some(self.heights.index_at(offset, self.row_count))
    }

    /// Indices that intersect the viewport, without overscan.
    pub fn visible_range(&self) -> Range<usize> {
        if self.row_count == 0 {
            return 0..0;
        }
        let first = self.heights.index_at(self.scroll_offset, self.row_count);
        let last = if self.viewport_height > 0.0 {
            self.heights
                .last_index_before(self.scroll_offset + self.viewport_height, self.row_count)
                .max(first)
        } else {
            first
        };
        first..last + 1
    }

    /// The rows to render: the visible range widened by the overscan on each
    /// side and clamped to the list.
    pub fn window(&self) -> VirtualWindow {
        let total_height = self.total_height();
        let visible = self.visible_range();
        if visible.is_empty() {
            return VirtualWindow {
                range: 0..0,
                items: Vec::new(),
                total_height,
            };
        }

        let lo = visible.start.saturating_sub(self.overscan);
        let hi = (visible.end + self.overscan).min(self.row_count);
        let items = (lo..hi)
            .map(|index| VirtualItem {
                index,
                start: self.heights.offset_of(index),
                size: self.heights.size_of(index),
            })
            .collect();
        trace!(
            lo,
            hi,
            scroll = self.scroll_offset,
            rows = self.row_count,
            "window recomputed"
        );
        VirtualWindow {
            range: lo..hi,
            items,
            total_height,
        }
    }
}
