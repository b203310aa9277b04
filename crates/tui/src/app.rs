use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crossterm::event::KeyCode;
use tracelens_core::views::Align;
use tracelens_core::{
    CollapsedSet, RenderOutput, Selection, TraceDocument, TraceTreeView, TreeAction, TreeCallbacks,
    TreeProps, ViewConfig,
};
use tracelens_protocol::ObservationLevel;
use tracing::debug;

/// Host-side state of the viewer: everything the tree view reads but does
/// not own, plus the queue its callbacks feed.
pub struct App {
    pub document: Arc<TraceDocument>,
    pub view: TraceTreeView,
    pub collapsed: CollapsedSet,
    pub selection: Selection,
    pub min_level: Option<ObservationLevel>,
    callbacks: TreeCallbacks,
    actions: Rc<RefCell<Vec<TreeAction>>>,
    follow_selection: bool,
    pub quit: bool,
}

impl App {
    pub fn new(document: Arc<TraceDocument>, config: ViewConfig) -> Self {
        let actions = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&actions);
        // Built once: the view keys its row cache on these allocations.
        let callbacks = TreeCallbacks::from_sink(move |action| sink.borrow_mut().push(action));
        Self {
            document,
            view: TraceTreeView::new(config),
            collapsed: CollapsedSet::new(),
            selection: Selection::Trace,
            min_level: None,
            callbacks,
            actions,
            follow_selection: false,
            quit: false,
        }
    }

    pub fn render(&mut self, width: u16, height: u16) -> RenderOutput {
        let props = TreeProps {
            document: &self.document,
            collapsed: &self.collapsed,
            selection: &self.selection,
            min_level: self.min_level,
            callbacks: &self.callbacks,
            width: f64::from(width),
            height: f64::from(height),
        };
        let out = self.view.render(&props);
        if self.follow_selection {
            self.follow_selection = false;
            if self
                .view
                .scroll_to_selection(&self.selection, Align::Auto)
                .is_some()
            {
                // The window moved; render again so the selection is on screen.
                return self.view.render(&props);
            }
        }
        out
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            KeyCode::Up => self.step(-1),
            KeyCode::Down => self.step(1),
            KeyCode::PageUp => self.view.scroll_pages(-1.0),
            KeyCode::PageDown => self.view.scroll_pages(1.0),
            KeyCode::Home => self.view.set_scroll_offset(0.0),
            KeyCode::End => self.view.set_scroll_offset(f64::MAX),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(index) = self.view.position_of(&self.selection) {
                    self.view.toggle_row(index);
                }
            }
            KeyCode::Char('c') => self.callbacks.dispatch(TreeAction::CollapseAll),
            KeyCode::Char('e') => self.callbacks.dispatch(TreeAction::ExpandAll),
            KeyCode::Char('l') => self
                .callbacks
                .dispatch(TreeAction::SetMinLevel(ObservationLevel::cycle(self.min_level))),
            KeyCode::Char('a') => self.callbacks.dispatch(TreeAction::SetMinLevel(None)),
            KeyCode::Char('t') => {
                let mode = self.view.view_mode().toggled();
                self.view.set_view_mode(mode);
            }
            KeyCode::Char(c @ ('m' | 's' | 'o' | 'h')) => self.toggle_display(c),
            _ => {}
        }
        self.apply_actions();
    }

    /// Click on a content row, `y` cells below the top of the list.
    pub fn click(&mut self, y: u16) {
        if let Some(index) = self.view.row_at(f64::from(y)) {
            self.view.click_row(index);
        }
        self.apply_actions();
    }

    pub fn scroll(&mut self, rows: f64) {
        self.view.scroll_by(rows * self.view.config().row_height());
    }

    fn step(&mut self, delta: isize) {
        if let Some(next) = self.view.step_selection(&self.selection, delta) {
            self.callbacks.dispatch(TreeAction::Select(next));
        }
    }

    fn toggle_display(&mut self, key: char) {
        let mut config = self.view.config().clone();
        let toggles = &mut config.toggles;
        match key {
            'm' => toggles.show_metrics = !toggles.show_metrics,
            's' => toggles.show_scores = !toggles.show_scores,
            'o' => toggles.show_comments = !toggles.show_comments,
            _ => toggles.color_code_metrics = !toggles.color_code_metrics,
        }
        self.view.set_config(config);
    }

    /// Apply what the view and key handlers asked for.
    fn apply_actions(&mut self) {
        let actions: Vec<TreeAction> = self.actions.borrow_mut().drain(..).collect();
        for action in actions {
            debug!(?action, "applying tree action");
            match action {
                TreeAction::Select(selection) => {
                    self.selection = selection;
                    self.follow_selection = true;
                }
                TreeAction::ToggleCollapse(id) => self.collapsed = self.collapsed.toggled(&id),
                TreeAction::CollapseAll => {
                    self.collapsed = CollapsedSet::collapse_all(&self.document.tree);
                }
                TreeAction::ExpandAll => self.collapsed = CollapsedSet::expand_all(),
                TreeAction::SetMinLevel(level) => self.min_level = level,
            }
        }
    }
}
