use std::rc::Rc;

use tracelens_protocol::{ObservationLevel, SharedStr};

use crate::callback::Callback;

/// The highlighted row. `Trace` is the "nothing selected" state and
/// highlights the root row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Selection {
    #[default]
    Trace,
    Observation(SharedStr),
}

impl Selection {
    pub fn observation_id(&self) -> Option<&SharedStr> {
        match self {
            Self::Trace => None,
            Self::Observation(id) => Some(id),
        }
    }
}

/// A state change the tree view asks its host to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeAction {
    Select(Selection),
    ToggleCollapse(SharedStr),
    CollapseAll,
    ExpandAll,
    SetMinLevel(Option<ObservationLevel>),
}

/// Outbound functions supplied by the host, one per [`TreeAction`].
#[derive(Clone)]
pub struct TreeCallbacks {
    pub on_select: Callback<Selection>,
    pub on_toggle_collapse: Callback<SharedStr>,
    pub on_collapse_all: Callback<()>,
    pub on_expand_all: Callback<()>,
    pub on_min_level_change: Callback<Option<ObservationLevel>>,
}

impl TreeCallbacks {
    /// Route every callback into one action sink.
    pub fn from_sink(sink: impl Fn(TreeAction) + 'static) -> Self {
        let sink: Rc<dyn Fn(TreeAction)> = Rc::new(sink);
        let select = Rc::clone(&sink);
        let toggle = Rc::clone(&sink);
        let collapse = Rc::clone(&sink);
        let expand = Rc::clone(&sink);
        Self {
            on_select: Rc::new(move |s| select(TreeAction::Select(s))),
            on_toggle_collapse: Rc::new(move |id| toggle(TreeAction::ToggleCollapse(id))),
            on_collapse_all: Rc::new(move |()| collapse(TreeAction::CollapseAll)),
            on_expand_all: Rc::new(move |()| expand(TreeAction::ExpandAll)),
            on_min_level_change: Rc::new(move |level| sink(TreeAction::SetMinLevel(level))),
        }
    }

    pub fn dispatch(&self, action: TreeAction) {
        match action {
            TreeAction::Select(selection) => (self.on_select)(selection),
            TreeAction::ToggleCollapse(id) => (self.on_toggle_collapse)(id),
            TreeAction::CollapseAll => (self.on_collapse_all)(()),
            TreeAction::ExpandAll => (self.on_expand_all)(()),
            TreeAction::SetMinLevel(level) => (self.on_min_level_change)(level),
        }
    }
}

impl std::fmt::Debug for TreeCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeCallbacks").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn sink_receives_every_action() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink_log = Rc::clone(&log);
        let callbacks = TreeCallbacks::from_sink(move |a| sink_log.borrow_mut().push(a));

        let actions = vec![
            TreeAction::Select(Selection::Observation("a".into())),
            TreeAction::ToggleCollapse("a".into()),
            TreeAction::CollapseAll,
            TreeAction::ExpandAll,
            TreeAction::SetMinLevel(Some(ObservationLevel::Warning)),
        ];
        for action in actions.clone() {
            callbacks.dispatch(action);
        }
        assert_eq!(*log.borrow(), actions);
    }

    #[test]
    fn default_selection_is_trace() {
        assert_eq!(Selection::default(), Selection::Trace);
        assert!(Selection::Trace.observation_id().is_none());
    }
}
