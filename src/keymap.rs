//! Keyboard dispatch table for session operations.

use std::fmt;

use crate::error::ScoremarkError;
use crate::session::AnnotationSession;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Delete,
    Backspace,
    Escape,
    Enter,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
    };
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
    };
    pub const CTRL: Modifiers = Modifiers {
        shift: false,
        ctrl: true,
        alt: false,
    };
}

/// When a binding is live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Always,
    WithSelection,
    WithoutSelection,
}

impl Scope {
    fn admits(self, has_selection: bool) -> bool {
        match self {
            Scope::Always => true,
            Scope::WithSelection => has_selection,
            Scope::WithoutSelection => !has_selection,
        }
    }
}

/// Session operations reachable from the keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    SelectAll,
    ClearSelection,
    DeleteSelected,
    MergeSelected,
    SplitSelected,
    ParseSelected,
    ConnectSelected,
}

impl Action {
    pub fn apply(self, session: &mut AnnotationSession) -> Result<(), ScoremarkError> {
        match self {
            Action::SelectAll => session.select_all(),
            Action::ClearSelection => session.clear_selection(),
            Action::DeleteSelected => {
                session.delete_selected()?;
            }
            Action::MergeSelected => {
                session.merge_selected()?;
            }
            Action::SplitSelected => {
                session.split_selected()?;
            }
            Action::ParseSelected => {
                session.parse_selected()?;
            }
            Action::ConnectSelected => {
                session.connect_selected()?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::SelectAll => "select all",
            Action::ClearSelection => "clear selection",
            Action::DeleteSelected => "delete selected",
            Action::MergeSelected => "merge selected",
            Action::SplitSelected => "split selected",
            Action::ParseSelected => "parse selected",
            Action::ConnectSelected => "connect selected",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binding {
    pub key: Key,
    pub modifiers: Modifiers,
    pub scope: Scope,
    pub action: Action,
}

/// Ordered bindings; the first one matching key, modifiers and scope wins.
#[derive(Clone, Debug, Default)]
pub struct KeyDispatch {
    bindings: Vec<Binding>,
}

impl KeyDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_bindings() -> Self {
        let mut dispatch = Self::new();
        dispatch
            .bind(Key::Char('a'), Modifiers::CTRL, Scope::Always, Action::SelectAll)
            .bind(Key::Escape, Modifiers::NONE, Scope::WithSelection, Action::ClearSelection)
            .bind(Key::Delete, Modifiers::NONE, Scope::WithSelection, Action::DeleteSelected)
            .bind(Key::Backspace, Modifiers::NONE, Scope::WithSelection, Action::DeleteSelected)
            .bind(Key::Char('m'), Modifiers::NONE, Scope::WithSelection, Action::MergeSelected)
            .bind(Key::Char('x'), Modifiers::NONE, Scope::WithSelection, Action::SplitSelected)
            .bind(Key::Char('a'), Modifiers::NONE, Scope::WithSelection, Action::ConnectSelected)
            .bind(Key::Char('p'), Modifiers::NONE, Scope::Always, Action::ParseSelected);
        dispatch
    }

    pub fn bind(&mut self, key: Key, modifiers: Modifiers, scope: Scope, action: Action) -> &mut Self {
        self.bindings.push(Binding {
            key,
            modifiers,
            scope,
            action,
        });
        self
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn lookup(&self, key: Key, modifiers: Modifiers, has_selection: bool) -> Option<Action> {
        self.bindings
            .iter()
            .find(|b| b.key == key && b.modifiers == modifiers && b.scope.admits(has_selection))
            .map(|b| b.action)
    }

    /// Runs the action bound to the key press, if any, and returns it.
    pub fn dispatch(
        &self,
        session: &mut AnnotationSession,
        key: Key,
        modifiers: Modifiers,
    ) -> Result<Option<Action>, ScoremarkError> {
        let Some(action) = self.lookup(key, modifiers, session.has_selection()) else {
            tracing::trace!(?key, ?modifiers, "unbound key");
            return Ok(None);
        };
        tracing::debug!(%action, "key dispatch");
        action.apply(session)?;
        Ok(Some(action))
    }
}
