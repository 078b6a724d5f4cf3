//! The relationship graph over marks.
//!
//! Edges are stored twice: once in the graph's edge map, and once as
//! `inlinks`/`outlinks` on the marks. Every mutation goes through the
//! methods here, which take the mark map, so both copies stay in sync.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use super::ids::MarkId;
use super::mark::Mark;
use crate::error::ScoremarkError;

/// The label of an edge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeLabel {
    /// A plain head-to-child dependency.
    #[default]
    Dependency,
    Named(String),
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeLabel::Dependency => write!(f, "dependency"),
            EdgeLabel::Named(name) => write!(f, "{name}"),
        }
    }
}

/// An ordered `(from, to)` pair of mark ids.
pub type EdgeKey = (MarkId, MarkId);

/// Directed edges between marks, keyed by `(from, to)`.
///
/// Iteration follows insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    edges: IndexMap<EdgeKey, EdgeLabel>,
    masked: HashSet<EdgeKey>,
}

impl Graph {
    /// Every edge with its label, in insertion order.
    pub fn edges(&self) -> &IndexMap<EdgeKey, EdgeLabel> {
        &self.edges
    }

    /// Number of edges, masked ones included.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains(&self, from: MarkId, to: MarkId) -> bool {
        self.edges.contains_key(&(from, to))
    }

    /// The label of `from -> to`, if that edge exists.
    pub fn label(&self, from: MarkId, to: MarkId) -> Option<&EdgeLabel> {
        self.edges.get(&(from, to))
    }

    /// Inserts `from -> to` unless present. Returns whether an edge was
    /// added; an existing edge keeps its label.
    pub(crate) fn ensure_add_edge(
        &mut self,
        marks: &mut BTreeMap<MarkId, Mark>,
        from: MarkId,
        to: MarkId,
        label: EdgeLabel,
    ) -> Result<bool, ScoremarkError> {
        if from == to {
            return Err(ScoremarkError::SelfLoop(from));
        }
        for id in [from, to] {
            if !marks.contains_key(&id) {
                return Err(ScoremarkError::UnknownMark(id));
            }
        }
        if self.edges.contains_key(&(from, to)) {
            return Ok(false);
        }

        self.edges.insert((from, to), label);
        if let Some(mark) = marks.get_mut(&from) {
            mark.outlinks_mut().insert(to);
        }
        if let Some(mark) = marks.get_mut(&to) {
            mark.inlinks_mut().insert(from);
        }
        Ok(true)
    }

    /// Removes `from -> to` if present. Returns whether an edge was removed.
    pub(crate) fn ensure_remove_edge(
        &mut self,
        marks: &mut BTreeMap<MarkId, Mark>,
        from: MarkId,
        to: MarkId,
    ) -> bool {
        if self.edges.shift_remove(&(from, to)).is_none() {
            return false;
        }
        self.masked.remove(&(from, to));
        if let Some(mark) = marks.get_mut(&from) {
            mark.outlinks_mut().remove(&to);
        }
        if let Some(mark) = marks.get_mut(&to) {
            mark.inlinks_mut().remove(&from);
        }
        true
    }

    /// Removes every edge incident on `id`. Returns the removed keys.
    pub(crate) fn remove_all_edges_for(
        &mut self,
        marks: &mut BTreeMap<MarkId, Mark>,
        id: MarkId,
    ) -> Vec<EdgeKey> {
        let incident: Vec<EdgeKey> = self
            .edges
            .keys()
            .filter(|(from, to)| *from == id || *to == id)
            .copied()
            .collect();
        for (from, to) in &incident {
            self.ensure_remove_edge(marks, *from, *to);
        }
        incident
    }

    /// Drops every edge and clears the mirrors on the remaining marks.
    pub(crate) fn clear(&mut self, marks: &mut BTreeMap<MarkId, Mark>) {
        self.edges.clear();
        self.masked.clear();
        for mark in marks.values_mut() {
            mark.clear_links();
        }
    }

    /// Returns true if every given edge is hidden from display.
    pub fn are_all_masked(&self, edges: &[EdgeKey]) -> bool {
        edges.iter().all(|key| self.masked.contains(key))
    }

    /// Hides the given edges from display; unknown edges are ignored.
    pub fn mask(&mut self, edges: &[EdgeKey]) {
        for key in edges {
            if self.edges.contains_key(key) {
                self.masked.insert(*key);
            }
        }
    }

    /// Shows the given edges again.
    pub fn unmask(&mut self, edges: &[EdgeKey]) {
        for key in edges {
            self.masked.remove(key);
        }
    }

    pub fn is_masked(&self, from: MarkId, to: MarkId) -> bool {
        self.masked.contains(&(from, to))
    }
}
