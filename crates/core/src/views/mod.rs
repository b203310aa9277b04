pub mod flatten;
pub mod mode;
pub mod row_cache;
pub mod rows;
pub mod timeline;
pub mod tree_view;
pub mod window;

pub use flatten::{FlatRow, FlattenMemo, Flattened, RowKind, flatten};
pub use mode::{RenderMode, RenderPlan, select_mode};
pub use row_cache::{RowCache, RowProps};
pub use tree_view::{RenderOutput, TraceTreeView, TreeProps};
pub use window::{Align, MeasuredHeights, RowHeights, VirtualWindow, Virtualizer};
