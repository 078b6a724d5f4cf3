//! Headless annotation session: a model plus the current selection, with
//! every operation recorded in the activity log.

use indexmap::IndexSet;
use serde_json::Value;

use crate::activity::{ActivityLog, Extractor, TrackedOp};
use crate::error::ScoremarkError;
use crate::geom::{Region, Scaler};
use crate::grammar::{DependencyGrammar, MarkParser, PermissiveParser};
use crate::model::{AnnotationModel, ClassId, Mark, MarkId};
use crate::selection::SelectionPolicy;

const MARK_FIELDS: &[&str] = &["id", "class_name", "top", "left", "height", "width"];
const MARK_IDS: &[&str] = &["id", "class_name"];

const ADD_MARK: TrackedOp = TrackedOp {
    name: "add_mark",
    args: &[("mark", Extractor::Fields(MARK_FIELDS))],
};
const SELECT_OVERLAPPING: TrackedOp = TrackedOp {
    name: "select_overlapping",
    args: &[("selected", Extractor::Count), ("use_mark_mask", Extractor::Raw)],
};
const SELECT_ALL: TrackedOp = TrackedOp {
    name: "select_all",
    args: &[("selected", Extractor::Count)],
};
const CLEAR_SELECTION: TrackedOp = TrackedOp {
    name: "clear_selection",
    args: &[("selected", Extractor::Count)],
};
const DELETE_SELECTED: TrackedOp = TrackedOp {
    name: "delete_selected",
    args: &[("marks", Extractor::Fields(MARK_IDS))],
};
const MERGE_SELECTED: TrackedOp = TrackedOp {
    name: "merge_selected",
    args: &[("marks", Extractor::Fields(MARK_IDS)), ("merged", Extractor::Raw)],
};
const SPLIT_SELECTED: TrackedOp = TrackedOp {
    name: "split_selected",
    args: &[("marks", Extractor::Fields(MARK_IDS)), ("parts", Extractor::Raw)],
};
const PARSE_SELECTED: TrackedOp = TrackedOp {
    name: "parse_selected",
    args: &[("marks", Extractor::Count), ("added", Extractor::Raw)],
};
const CONNECT_SELECTED: TrackedOp = TrackedOp {
    name: "connect_selected",
    args: &[("edges", Extractor::Raw)],
};

/// State of one annotator working on one score.
///
/// The selection keeps the order in which marks were selected; the first
/// selected mark is the head for [`connect_selected`](Self::connect_selected).
#[derive(Debug)]
pub struct AnnotationSession {
    pub model: AnnotationModel,
    pub scaler: Scaler,
    pub grammar: Option<DependencyGrammar>,
    pub policy: SelectionPolicy,
    selection: IndexSet<MarkId>,
    log: ActivityLog,
}

impl AnnotationSession {
    pub fn new(model: AnnotationModel, scaler: Scaler) -> Self {
        Self {
            model,
            scaler,
            grammar: None,
            policy: SelectionPolicy::default(),
            selection: IndexSet::new(),
            log: ActivityLog::disabled(),
        }
    }

    pub fn with_grammar(mut self, grammar: DependencyGrammar) -> Self {
        self.grammar = Some(grammar);
        self
    }

    pub fn with_log(mut self, log: ActivityLog) -> Self {
        self.log = log;
        self
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn selection(&self) -> &IndexSet<MarkId> {
        &self.selection
    }

    pub fn has_selection(&self) -> bool {
        !self.selection.is_empty()
    }

    /// Adds a mark of class `class_id` covering `region`.
    ///
    /// The class name comes from the catalog; without a catalog the id is
    /// used as the name.
    pub fn add_mark_from_selection(
        &mut self,
        region: &Region,
        class_id: ClassId,
    ) -> Result<MarkId, ScoremarkError> {
        let class_name = match self.model.catalog().by_id(class_id) {
            Some(def) => def.name.clone(),
            None if self.model.catalog().is_empty() => class_id.to_string(),
            None => {
                return Err(ScoremarkError::UnknownClass {
                    mark: self.model.next_mark_id(),
                    class_id,
                })
            }
        };
        let id = self.model.next_mark_id();
        let mark = Mark::from_region(id, class_id, class_name, region);
        self.model.add_mark(mark)?;
        let logged = self.model.mark(id).map(mark_value).unwrap_or_default();
        self.log.track(&ADD_MARK, &[("mark", logged)]);
        Ok(id)
    }

    /// Replaces the selection by the marks overlapping `region`.
    pub fn select_overlapping(&mut self, region: &Region, use_mark_mask: bool) -> &IndexSet<MarkId> {
        self.selection = self
            .model
            .select_overlapping(region, use_mark_mask)
            .into_iter()
            .collect();
        self.log.track(
            &SELECT_OVERLAPPING,
            &[
                ("selected", ids_value(&self.selection)),
                ("use_mark_mask", Value::Bool(use_mark_mask)),
            ],
        );
        &self.selection
    }

    pub fn select_all(&mut self) {
        self.selection = self.model.mark_ids().collect();
        self.log
            .track(&SELECT_ALL, &[("selected", ids_value(&self.selection))]);
    }

    pub fn clear_selection(&mut self) {
        let previous = std::mem::take(&mut self.selection);
        self.log
            .track(&CLEAR_SELECTION, &[("selected", ids_value(&previous))]);
    }

    /// Removes every selected mark and its edges. Returns how many were
    /// removed.
    pub fn delete_selected(&mut self) -> Result<usize, ScoremarkError> {
        self.prune_selection();
        let logged = self.selected_marks_value();
        let ids: Vec<MarkId> = self.selection.iter().copied().collect();
        for id in &ids {
            self.model.remove_mark(*id)?;
        }
        self.selection.clear();
        self.log.track(&DELETE_SELECTED, &[("marks", logged)]);
        Ok(ids.len())
    }

    /// Merges the selection into one mark, which becomes the selection.
    ///
    /// Does nothing when fewer than two marks are selected.
    pub fn merge_selected(&mut self) -> Result<Option<MarkId>, ScoremarkError> {
        self.prune_selection();
        if self.selection.len() < 2 {
            return Ok(None);
        }
        let logged = self.selected_marks_value();
        let ids: Vec<MarkId> = self.selection.iter().copied().collect();
        let merged = self.model.merge_marks(&ids)?;
        self.selection = IndexSet::from([merged]);
        self.log.track(
            &MERGE_SELECTED,
            &[("marks", logged), ("merged", Value::from(merged.as_u64()))],
        );
        Ok(Some(merged))
    }

    /// Splits each selected mark on its connected components; the parts
    /// become the selection.
    pub fn split_selected(&mut self) -> Result<Vec<MarkId>, ScoremarkError> {
        self.prune_selection();
        let logged = self.selected_marks_value();
        let ids: Vec<MarkId> = self.selection.iter().copied().collect();
        let mut parts = Vec::new();
        for id in ids {
            parts.extend(self.model.split_mark(id)?);
        }
        self.selection = parts.iter().copied().collect();
        self.log.track(
            &SPLIT_SELECTED,
            &[("marks", logged), ("parts", ids_value(&self.selection))],
        );
        Ok(parts)
    }

    /// Runs the permissive parser over the selection, or over every mark
    /// when nothing is selected. Returns the number of edges added.
    pub fn parse_selected(&mut self) -> Result<usize, ScoremarkError> {
        let grammar = self
            .grammar
            .as_ref()
            .ok_or_else(|| ScoremarkError::MissingInput("a dependency grammar".to_string()))?;
        let parser = PermissiveParser::new(grammar);
        let model = &self.model;
        self.selection.retain(|id| model.mark(*id).is_some());
        run_parser(&mut self.model, &mut self.log, &self.selection, &parser)
    }

    /// Like [`parse_selected`](Self::parse_selected) with any parser.
    pub fn parse_selected_with(&mut self, parser: &dyn MarkParser) -> Result<usize, ScoremarkError> {
        self.prune_selection();
        run_parser(&mut self.model, &mut self.log, &self.selection, parser)
    }

    /// Adds an edge from the first selected mark to every other selected
    /// mark. Returns the number of edges added.
    pub fn connect_selected(&mut self) -> Result<usize, ScoremarkError> {
        self.prune_selection();
        let mut members = self.selection.iter().copied();
        let Some(head) = members.next() else {
            return Ok(0);
        };
        let children: Vec<MarkId> = members.collect();
        let mut added = Vec::new();
        for child in children {
            if self.model.ensure_add_edge(head, child)? {
                added.push(Value::from(vec![head.as_u64(), child.as_u64()]));
            }
        }
        let count = added.len();
        self.log.track(&CONNECT_SELECTED, &[("edges", Value::Array(added))]);
        Ok(count)
    }

    /// Writes the end record of the activity log.
    pub fn close(&mut self) {
        self.log.close();
    }

    /// Drops selected ids whose marks are no longer in the model.
    fn prune_selection(&mut self) {
        let model = &self.model;
        self.selection.retain(|id| model.mark(*id).is_some());
    }

    fn selected_marks_value(&self) -> Value {
        Value::Array(
            self.selection
                .iter()
                .filter_map(|id| self.model.mark(*id))
                .map(mark_value)
                .collect(),
        )
    }
}

fn run_parser(
    model: &mut AnnotationModel,
    log: &mut ActivityLog,
    selection: &IndexSet<MarkId>,
    parser: &dyn MarkParser,
) -> Result<usize, ScoremarkError> {
    let ids: Vec<MarkId> = if selection.is_empty() {
        model.mark_ids().collect()
    } else {
        selection.iter().copied().collect()
    };
    let added = model.apply_parser(parser, &ids)?;
    log.track(
        &PARSE_SELECTED,
        &[("marks", Value::from(ids.len())), ("added", Value::from(added))],
    );
    Ok(added)
}

fn mark_value(mark: &Mark) -> Value {
    serde_json::to_value(mark).unwrap_or_default()
}

fn ids_value(ids: &IndexSet<MarkId>) -> Value {
    ids.iter().map(|id| id.as_u64()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{read_activity_log, LogEventKind};
    use crate::geom::{IntBBox, Mask};
    use crate::model::ClassDef;

    fn session() -> AnnotationSession {
        let mut model = AnnotationModel::new();
        model
            .load_catalog(vec![ClassDef::new(1u64, "notehead-full"), ClassDef::new(2u64, "stem")])
            .expect("catalog");
        AnnotationSession::new(model, Scaler::identity(100, 100))
    }

    fn region(top: i64, left: i64, bottom: i64, right: i64) -> Region {
        Region::from_bbox(IntBBox::new(top, left, bottom, right))
    }

    #[test]
    fn add_and_select_overlapping() {
        let mut session = session();
        let a = session
            .add_mark_from_selection(&region(0, 0, 10, 10), ClassId(1))
            .expect("add");
        let b = session
            .add_mark_from_selection(&region(20, 20, 30, 30), ClassId(2))
            .expect("add");
        assert_eq!(session.model.mark(b).expect("b").class_name, "stem");

        let selected = session.select_overlapping(&region(5, 5, 25, 25), false);
        assert_eq!(selected.iter().copied().collect::<Vec<_>>(), vec![a, b]);

        session.clear_selection();
        assert!(!session.has_selection());
    }

    #[test]
    fn unknown_class_is_rejected() {
        let mut session = session();
        assert!(matches!(
            session.add_mark_from_selection(&region(0, 0, 2, 2), ClassId(9)),
            Err(ScoremarkError::UnknownClass { .. })
        ));
        assert!(session.model.is_empty());
    }

    #[test]
    fn merge_then_split_round_trips_the_parts() {
        let mut session = session();
        let mut left = Mask::empty(4, 4);
        left.set(0, 0, true);
        let mut right = Mask::empty(4, 4);
        right.set(3, 3, true);
        let a = Region::new(IntBBox::new(0, 0, 4, 4), Some(left)).expect("region");
        let b = Region::new(IntBBox::new(0, 10, 4, 14), Some(right)).expect("region");
        session.add_mark_from_selection(&a, ClassId(1)).expect("add");
        session.add_mark_from_selection(&b, ClassId(1)).expect("add");

        session.select_all();
        let merged = session.merge_selected().expect("merge").expect("merged id");
        assert_eq!(session.model.len(), 1);
        assert_eq!(session.selection().len(), 1);
        assert_eq!(session.model.mark(merged).expect("merged").bbox(), IntBBox::new(0, 0, 4, 14));

        let parts = session.split_selected().expect("split");
        assert_eq!(parts.len(), 2);
        assert_eq!(session.model.len(), 2);
    }

    #[test]
    fn merge_of_one_mark_is_a_no_op() {
        let mut session = session();
        session
            .add_mark_from_selection(&region(0, 0, 3, 3), ClassId(1))
            .expect("add");
        session.select_all();
        assert_eq!(session.merge_selected().expect("merge"), None);
        assert_eq!(session.model.len(), 1);
    }

    #[test]
    fn connect_and_delete_keep_graph_consistent() {
        let mut session = session();
        let head = session
            .add_mark_from_selection(&region(0, 0, 5, 5), ClassId(1))
            .expect("add");
        let stem = session
            .add_mark_from_selection(&region(0, 5, 20, 6), ClassId(2))
            .expect("add");
        session.select_all();
        assert_eq!(session.connect_selected().expect("connect"), 1);
        assert!(session.model.graph().contains(head, stem));
        assert_eq!(session.connect_selected().expect("again"), 0);

        session.clear_selection();
        session.select_overlapping(&region(10, 5, 11, 6), false);
        assert_eq!(session.delete_selected().expect("delete"), 1);
        assert!(session.model.graph().is_empty());
        assert!(session.model.mark(head).expect("head").outlinks().is_empty());
    }

    #[test]
    fn parse_needs_a_grammar() {
        let mut session = session();
        assert!(matches!(
            session.parse_selected(),
            Err(ScoremarkError::MissingInput(_))
        ));

        let grammar =
            DependencyGrammar::for_catalog("notehead-full | stem", session.model.catalog())
                .expect("grammar");
        let mut session = session.with_grammar(grammar);
        session
            .add_mark_from_selection(&region(0, 0, 5, 5), ClassId(1))
            .expect("add");
        session
            .add_mark_from_selection(&region(0, 5, 20, 6), ClassId(2))
            .expect("add");
        assert_eq!(session.parse_selected().expect("parse"), 1);
    }

    #[test]
    fn marks_removed_behind_the_session_drop_out_of_the_selection() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("annotation_logs").join("s.jsonl");
        let mut session = session().with_log(ActivityLog::open(&path));
        let a = session
            .add_mark_from_selection(&region(0, 0, 5, 5), ClassId(1))
            .expect("add");
        let b = session
            .add_mark_from_selection(&region(0, 5, 20, 6), ClassId(2))
            .expect("add");
        session.select_all();
        session.model.remove_mark(b).expect("remove");

        assert_eq!(session.delete_selected().expect("delete"), 1);
        assert!(session.model.mark(a).is_none());
        assert!(session.model.is_empty());
        assert!(!session.has_selection());
        session.close();

        let events = read_activity_log(&path).expect("read");
        assert!(events.iter().any(|event| matches!(
            &event.kind,
            LogEventKind::Op { name, .. } if name == "delete_selected"
        )));
    }

    #[test]
    fn stale_ids_are_skipped_by_connect_and_split() {
        let mut session = session();
        let head = session
            .add_mark_from_selection(&region(0, 0, 5, 5), ClassId(1))
            .expect("add");
        let gone = session
            .add_mark_from_selection(&region(0, 5, 20, 6), ClassId(2))
            .expect("add");
        let stem = session
            .add_mark_from_selection(&region(0, 8, 20, 9), ClassId(2))
            .expect("add");
        session.select_all();
        session.model.remove_mark(gone).expect("remove");

        assert_eq!(session.connect_selected().expect("connect"), 1);
        assert!(session.model.graph().contains(head, stem));
        assert_eq!(session.selection().len(), 2);

        session.model.remove_mark(stem).expect("remove");
        let parts = session.split_selected().expect("split");
        assert_eq!(parts.len(), 1);
        assert_eq!(session.model.len(), 1);
    }

    #[test]
    fn operations_are_logged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("annotation_logs").join("s.jsonl");
        let mut session = session().with_log(ActivityLog::open(&path));
        session
            .add_mark_from_selection(&region(0, 0, 5, 5), ClassId(1))
            .expect("add");
        session.select_all();
        session.delete_selected().expect("delete");
        session.close();

        let events = read_activity_log(&path).expect("read");
        let names: Vec<&str> = events
            .iter()
            .filter_map(|event| match &event.kind {
                LogEventKind::Op { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["add_mark", "select_all", "delete_selected"]);
        assert_eq!(events.first().map(|e| &e.kind), Some(&LogEventKind::Start));
        assert_eq!(events.last().map(|e| &e.kind), Some(&LogEventKind::End));
    }
}
