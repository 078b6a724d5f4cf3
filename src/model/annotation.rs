//! The annotation model: image, class catalog, marks and their graph.

use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use super::catalog::{Catalog, ClassDef};
use super::events::{Listeners, ModelEvent};
use super::graph::{EdgeKey, EdgeLabel, Graph};
use super::ids::{ClassId, MarkId};
use super::mark::{mask_overlaps_region, merge_bbox, merge_masks, Mark};
use crate::error::ScoremarkError;
use crate::geom::{label_components, Connectivity, Labeling, Mask, Raster, Region};
use crate::grammar::MarkParser;
use crate::validation::{validate_model, ValidateOptions, ValidationReport};

/// The mutable annotation state of one score.
///
/// The model owns its marks and graph. Every mutating method either
/// commits fully or returns an error with the model unchanged; observers
/// registered with [`subscribe`](Self::subscribe) are notified after the
/// commit.
#[derive(Default)]
pub struct AnnotationModel {
    image: Option<Raster>,
    components: OnceCell<Labeling>,
    marks: BTreeMap<MarkId, Mark>,
    catalog: Catalog,
    graph: Graph,
    listeners: Listeners,
}

impl fmt::Debug for AnnotationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationModel")
            .field("image", &self.image)
            .field("marks", &self.marks.len())
            .field("classes", &self.catalog.len())
            .field("edges", &self.graph.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl AnnotationModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer called after every committed change.
    pub fn subscribe(&mut self, listener: impl FnMut(ModelEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // ---- image -------------------------------------------------------

    /// Sets the score image and drops the cached component labeling.
    ///
    /// Marks are left alone; callers clear them if the geometry changed.
    pub fn load_image(&mut self, image: Raster) {
        tracing::debug!(height = image.height(), width = image.width(), "image loaded");
        self.image = Some(image);
        self.components = OnceCell::new();
        self.listeners.emit(ModelEvent::ImageChanged);
    }

    pub fn image(&self) -> Option<&Raster> {
        self.image.as_ref()
    }

    /// The loaded image, or [`ScoremarkError::NoImage`].
    pub fn require_image(&self) -> Result<&Raster, ScoremarkError> {
        self.image.as_ref().ok_or(ScoremarkError::NoImage)
    }

    /// 8-connected labeling of the whole image, computed once per image.
    pub fn components(&self) -> Result<&Labeling, ScoremarkError> {
        let image = self.require_image()?;
        Ok(self.components.get_or_init(|| {
            let labeling = label_components(image, Connectivity::Eight);
            tracing::debug!(components = labeling.count(), "labeled image components");
            labeling
        }))
    }

    // ---- catalog -----------------------------------------------------

    /// Replaces the class catalog.
    ///
    /// Marks whose class exists in the new catalog take its class name.
    pub fn load_catalog(&mut self, defs: Vec<ClassDef>) -> Result<(), ScoremarkError> {
        let catalog = Catalog::from_defs(defs)?;
        let mut renamed = false;
        for mark in self.marks.values_mut() {
            if let Some(def) = catalog.by_id(mark.class_id) {
                if mark.class_name != def.name {
                    mark.class_name = def.name.clone();
                    renamed = true;
                }
            }
        }
        tracing::debug!(classes = catalog.len(), "catalog loaded");
        self.catalog = catalog;
        self.listeners.emit(ModelEvent::CatalogChanged);
        if renamed {
            self.listeners.emit(ModelEvent::MarksChanged);
        }
        Ok(())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // ---- marks -------------------------------------------------------

    /// Marks in id order.
    pub fn marks(&self) -> impl Iterator<Item = &Mark> {
        self.marks.values()
    }

    pub fn mark(&self, id: MarkId) -> Option<&Mark> {
        self.marks.get(&id)
    }

    pub fn mark_ids(&self) -> impl Iterator<Item = MarkId> + '_ {
        self.marks.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// `max(id) + 1`, or 0 for an empty model.
    pub fn next_mark_id(&self) -> MarkId {
        self.marks
            .keys()
            .next_back()
            .map_or(MarkId(0), MarkId::next)
    }

    /// Inserts a mark or replaces the mark with the same id.
    ///
    /// A replaced mark keeps its edges. Link sets carried by `mark` are
    /// discarded; edges are changed only through the edge methods.
    pub fn add_mark(&mut self, mut mark: Mark) -> Result<(), ScoremarkError> {
        self.check_class(&mut mark)?;
        self.insert_preserving_links(mark);
        self.listeners.emit(ModelEvent::MarksChanged);
        Ok(())
    }

    /// Deletes a mark together with every incident edge.
    pub fn remove_mark(&mut self, id: MarkId) -> Result<Mark, ScoremarkError> {
        if !self.marks.contains_key(&id) {
            return Err(ScoremarkError::UnknownMark(id));
        }
        let removed_edges = self.graph.remove_all_edges_for(&mut self.marks, id);
        let mark = self
            .marks
            .remove(&id)
            .ok_or(ScoremarkError::UnknownMark(id))?;
        self.listeners.emit(ModelEvent::MarksChanged);
        if !removed_edges.is_empty() {
            self.listeners.emit(ModelEvent::EdgesChanged);
        }
        Ok(mark)
    }

    /// Inserts a batch of marks as one change.
    ///
    /// Edges recorded in the incoming marks' `outlinks` and `inlinks` are
    /// restored; they may point at marks of the batch or marks already in
    /// the model. Duplicate ids in the batch, unknown classes, self-loops
    /// or links to absent marks fail the whole import.
    pub fn import_marks(&mut self, mut marks: Vec<Mark>) -> Result<(), ScoremarkError> {
        let mut batch_ids = HashSet::with_capacity(marks.len());
        for mark in &mut marks {
            if !batch_ids.insert(mark.id) {
                return Err(ScoremarkError::DuplicateMarkId(mark.id));
            }
            self.check_class(mark)?;
        }

        let mut edges: Vec<EdgeKey> = Vec::new();
        let mut seen_edges: HashSet<EdgeKey> = HashSet::new();
        for mark in &marks {
            let outgoing = mark.outlinks().iter().map(|to| (mark.id, *to));
            let incoming = mark.inlinks().iter().map(|from| (*from, mark.id));
            for (from, to) in outgoing.chain(incoming) {
                if from == to {
                    return Err(ScoremarkError::SelfLoop(from));
                }
                for id in [from, to] {
                    if !batch_ids.contains(&id) && !self.marks.contains_key(&id) {
                        return Err(ScoremarkError::UnknownMark(id));
                    }
                }
                if seen_edges.insert((from, to)) {
                    edges.push((from, to));
                }
            }
        }

        let count = marks.len();
        for mark in marks {
            self.insert_preserving_links(mark);
        }
        let mut added = 0;
        for (from, to) in edges {
            if self
                .graph
                .ensure_add_edge(&mut self.marks, from, to, EdgeLabel::Dependency)?
            {
                added += 1;
            }
        }

        tracing::debug!(marks = count, edges = added, "imported marks");
        self.listeners.emit(ModelEvent::MarksChanged);
        if added > 0 {
            self.listeners.emit(ModelEvent::EdgesChanged);
        }
        Ok(())
    }

    /// Removes every mark and edge as one change.
    pub fn clear_marks(&mut self) {
        let had_edges = !self.graph.is_empty();
        self.graph.clear(&mut self.marks);
        self.marks.clear();
        self.listeners.emit(ModelEvent::MarksChanged);
        if had_edges {
            self.listeners.emit(ModelEvent::EdgesChanged);
        }
    }

    /// Assigns a different class to a mark.
    pub fn relabel_mark(&mut self, id: MarkId, class_id: ClassId) -> Result<(), ScoremarkError> {
        let name = self
            .catalog
            .by_id(class_id)
            .map(|def| def.name.clone())
            .ok_or(ScoremarkError::UnknownClass {
                mark: id,
                class_id,
            })?;
        let mark = self
            .marks
            .get_mut(&id)
            .ok_or(ScoremarkError::UnknownMark(id))?;
        mark.class_id = class_id;
        mark.class_name = name;
        self.listeners.emit(ModelEvent::MarksChanged);
        Ok(())
    }

    /// Replaces the given marks by one mark covering all of them.
    ///
    /// The result takes the class and data of the first id, the merged box
    /// and the OR of the masks; when only some marks have masks, the others
    /// count as fully covered. Edges to marks outside the merged set are
    /// carried over to the new mark, which gets [`next_mark_id`].
    ///
    /// [`next_mark_id`]: Self::next_mark_id
    pub fn merge_marks(&mut self, ids: &[MarkId]) -> Result<MarkId, ScoremarkError> {
        let mut unique: Vec<MarkId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !self.marks.contains_key(id) {
                return Err(ScoremarkError::UnknownMark(*id));
            }
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        let first = unique.first().copied().ok_or(ScoremarkError::EmptyMerge)?;
        let members: BTreeSet<MarkId> = unique.iter().copied().collect();

        let sources: Vec<&Mark> = unique.iter().filter_map(|id| self.marks.get(id)).collect();
        let bbox = merge_bbox(&sources).ok_or(ScoremarkError::EmptyMerge)?;
        let mask = match merge_masks(&sources) {
            Err(ScoremarkError::MixedMaskPresence) => {
                let filled: Vec<Mark> = sources
                    .iter()
                    .map(|mark| {
                        let mut filled = (*mark).clone();
                        if filled.mask().is_none() {
                            let full = Mask::try_full(filled.height(), filled.width())?;
                            filled.set_mask(Some(full))?;
                        }
                        Ok(filled)
                    })
                    .collect::<Result<_, ScoremarkError>>()?;
                let refs: Vec<&Mark> = filled.iter().collect();
                merge_masks(&refs)?
            }
            other => other?,
        };

        let new_id = self.next_mark_id();
        let head = &self.marks[&first];
        let mut merged = Mark::new(new_id, head.class_id, head.class_name.clone(), bbox);
        merged.data = head.data.clone();
        merged.set_mask(mask)?;

        let mut carried: Vec<(MarkId, MarkId)> = Vec::new();
        for source in &sources {
            for to in source.outlinks() {
                if !members.contains(to) {
                    carried.push((new_id, *to));
                }
            }
            for from in source.inlinks() {
                if !members.contains(from) {
                    carried.push((*from, new_id));
                }
            }
        }

        let mut edges_touched = false;
        for id in &unique {
            edges_touched |= !self
                .graph
                .remove_all_edges_for(&mut self.marks, *id)
                .is_empty();
            self.marks.remove(id);
        }
        self.marks.insert(new_id, merged);
        for (from, to) in carried {
            self.graph
                .ensure_add_edge(&mut self.marks, from, to, EdgeLabel::Dependency)?;
        }

        tracing::debug!(sources = unique.len(), %new_id, "merged marks");
        self.listeners.emit(ModelEvent::MarksChanged);
        if edges_touched {
            self.listeners.emit(ModelEvent::EdgesChanged);
        }
        Ok(new_id)
    }

    /// Splits a mark on the 4-connected components of its mask.
    ///
    /// With more than one component the mark and its edges are removed and
    /// the parts are inserted with ids from [`next_mark_id`]; their ids are
    /// returned. Otherwise nothing changes and `[id]` is returned.
    ///
    /// [`next_mark_id`]: Self::next_mark_id
    pub fn split_mark(&mut self, id: MarkId) -> Result<Vec<MarkId>, ScoremarkError> {
        let mark = self.marks.get(&id).ok_or(ScoremarkError::UnknownMark(id))?;
        let parts = mark.split_on_connected_components(self.next_mark_id());
        if parts.len() <= 1 {
            return Ok(vec![id]);
        }

        let removed_edges = self.graph.remove_all_edges_for(&mut self.marks, id);
        self.marks.remove(&id);
        let ids: Vec<MarkId> = parts.iter().map(|part| part.id).collect();
        for part in parts {
            self.marks.insert(part.id, part);
        }

        tracing::debug!(%id, parts = ids.len(), "split mark");
        self.listeners.emit(ModelEvent::MarksChanged);
        if !removed_edges.is_empty() {
            self.listeners.emit(ModelEvent::EdgesChanged);
        }
        Ok(ids)
    }

    /// Ids of the marks overlapping `region`, in id order.
    pub fn select_overlapping(&self, region: &Region, use_mark_mask: bool) -> Vec<MarkId> {
        self.marks
            .values()
            .filter(|mark| mask_overlaps_region(region, mark, use_mark_mask))
            .map(|mark| mark.id)
            .collect()
    }

    // ---- edges -------------------------------------------------------

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Adds a dependency edge `from -> to`. Returns whether it was new.
    pub fn ensure_add_edge(&mut self, from: MarkId, to: MarkId) -> Result<bool, ScoremarkError> {
        self.ensure_add_labeled_edge(from, to, EdgeLabel::Dependency)
    }

    pub fn ensure_add_labeled_edge(
        &mut self,
        from: MarkId,
        to: MarkId,
        label: EdgeLabel,
    ) -> Result<bool, ScoremarkError> {
        let added = self
            .graph
            .ensure_add_edge(&mut self.marks, from, to, label)?;
        if added {
            self.listeners.emit(ModelEvent::EdgesChanged);
        }
        Ok(added)
    }

    pub fn ensure_remove_edge(&mut self, from: MarkId, to: MarkId) -> bool {
        let removed = self.graph.ensure_remove_edge(&mut self.marks, from, to);
        if removed {
            self.listeners.emit(ModelEvent::EdgesChanged);
        }
        removed
    }

    /// Hides edges from display without removing them.
    pub fn mask_edges(&mut self, edges: &[EdgeKey]) {
        self.graph.mask(edges);
        self.listeners.emit(ModelEvent::EdgesChanged);
    }

    pub fn unmask_edges(&mut self, edges: &[EdgeKey]) {
        self.graph.unmask(edges);
        self.listeners.emit(ModelEvent::EdgesChanged);
    }

    /// Runs `parser` over the given marks and inserts the proposed edges.
    ///
    /// Every id is checked before any edge is inserted. A proposal joining
    /// a mark to itself (the same id listed twice) or pointing past the
    /// slice is dropped. Returns how many new edges were added.
    pub fn apply_parser(
        &mut self,
        parser: &dyn MarkParser,
        ids: &[MarkId],
    ) -> Result<usize, ScoremarkError> {
        let selected: Vec<&Mark> = ids
            .iter()
            .map(|id| self.marks.get(id).ok_or(ScoremarkError::UnknownMark(*id)))
            .collect::<Result<_, _>>()?;
        let proposals: Vec<EdgeKey> = parser
            .parse(&selected)
            .into_iter()
            .filter_map(|(i, j)| Some((selected.get(i)?.id, selected.get(j)?.id)))
            .filter(|(from, to)| from != to)
            .collect();

        let mut added = 0;
        for (from, to) in proposals {
            if self
                .graph
                .ensure_add_edge(&mut self.marks, from, to, EdgeLabel::Dependency)?
            {
                added += 1;
            }
        }
        tracing::debug!(candidates = ids.len(), added, "applied parser");
        if added > 0 {
            self.listeners.emit(ModelEvent::EdgesChanged);
        }
        Ok(added)
    }

    // ---- validation --------------------------------------------------

    /// Checks classes (when a catalog is loaded) and bounds (when an image
    /// is loaded), reporting the first offending category.
    pub fn validate(&self) -> Result<(), ScoremarkError> {
        if !self.catalog.is_empty() {
            if let Some(mark) = self
                .marks
                .values()
                .find(|mark| !self.catalog.contains(mark.class_id))
            {
                return Err(ScoremarkError::UnknownClass {
                    mark: mark.id,
                    class_id: mark.class_id,
                });
            }
        }
        if let Some(image) = &self.image {
            if let Some(mark) = self
                .marks
                .values()
                .find(|mark| !mark.bbox().is_within(image.height(), image.width()))
            {
                return Err(ScoremarkError::OutOfBounds {
                    mark: mark.id,
                    bbox: mark.bbox(),
                    image_height: image.height(),
                    image_width: image.width(),
                });
            }
        }
        Ok(())
    }

    /// Every issue found, including warnings and grammar violations.
    pub fn validation_report(&self, opts: &ValidateOptions<'_>) -> ValidationReport {
        validate_model(self, opts)
    }

    fn check_class(&self, mark: &mut Mark) -> Result<(), ScoremarkError> {
        if self.catalog.is_empty() {
            return Ok(());
        }
        let def = self
            .catalog
            .by_id(mark.class_id)
            .ok_or(ScoremarkError::UnknownClass {
                mark: mark.id,
                class_id: mark.class_id,
            })?;
        mark.class_name = def.name.clone();
        Ok(())
    }

    fn insert_preserving_links(&mut self, mut mark: Mark) {
        mark.clear_links();
        if let Some(old) = self.marks.get(&mark.id) {
            mark.inlinks_mut().extend(old.inlinks().iter().copied());
            mark.outlinks_mut().extend(old.outlinks().iter().copied());
        }
        self.marks.insert(mark.id, mark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::IntBBox;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorded(model: &mut AnnotationModel) -> Rc<RefCell<Vec<ModelEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        model.subscribe(move |event| sink.borrow_mut().push(event));
        events
    }

    fn mark(id: u64, bbox: IntBBox) -> Mark {
        Mark::new(id, 1u64, "stem", bbox)
    }

    /// Proposes every ordered pair of distinct positions.
    struct AllPairs;

    impl MarkParser for AllPairs {
        fn parse(&self, marks: &[&Mark]) -> Vec<(usize, usize)> {
            let n = marks.len();
            (0..n)
                .flat_map(|i| (0..n).filter(move |j| *j != i).map(move |j| (i, j)))
                .collect()
        }
    }

    #[test]
    fn apply_parser_with_repeated_ids_skips_self_pairs() {
        let mut model = AnnotationModel::new();
        model.add_mark(mark(1, IntBBox::new(0, 0, 1, 1))).expect("add");
        model.add_mark(mark(2, IntBBox::new(0, 0, 1, 1))).expect("add");

        let added = model
            .apply_parser(&AllPairs, &[MarkId(1), MarkId(2), MarkId(1)])
            .expect("parse");
        assert_eq!(added, 2);
        assert!(model.graph().contains(MarkId(1), MarkId(2)));
        assert!(model.graph().contains(MarkId(2), MarkId(1)));
        assert!(!model.graph().contains(MarkId(1), MarkId(1)));
    }

    #[test]
    fn apply_parser_with_unknown_id_adds_nothing() {
        let mut model = AnnotationModel::new();
        model.add_mark(mark(1, IntBBox::new(0, 0, 1, 1))).expect("add");
        model.add_mark(mark(2, IntBBox::new(0, 0, 1, 1))).expect("add");
        let events = recorded(&mut model);

        let err = model
            .apply_parser(&AllPairs, &[MarkId(1), MarkId(2), MarkId(7)])
            .unwrap_err();
        assert!(matches!(err, ScoremarkError::UnknownMark(MarkId(7))));
        assert!(model.graph().is_empty());
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn next_mark_id_follows_max() {
        let mut model = AnnotationModel::new();
        assert_eq!(model.next_mark_id(), MarkId(0));
        model.add_mark(mark(4, IntBBox::new(0, 0, 1, 1))).expect("add");
        model.add_mark(mark(2, IntBBox::new(0, 0, 1, 1))).expect("add");
        assert_eq!(model.next_mark_id(), MarkId(5));
    }

    #[test]
    fn add_mark_with_catalog_checks_class_and_syncs_name() {
        let mut model = AnnotationModel::new();
        model
            .load_catalog(vec![ClassDef::new(1u64, "stem")])
            .expect("catalog");

        let mut unnamed = mark(0, IntBBox::new(0, 0, 1, 1));
        unnamed.class_name = "outdated".into();
        model.add_mark(unnamed).expect("add");
        assert_eq!(model.mark(MarkId(0)).map(|m| m.class_name.as_str()), Some("stem"));

        let unknown = Mark::new(1u64, 9u64, "ghost", IntBBox::new(0, 0, 1, 1));
        assert!(matches!(
            model.add_mark(unknown),
            Err(ScoremarkError::UnknownClass { .. })
        ));
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn replacing_a_mark_keeps_its_edges() {
        let mut model = AnnotationModel::new();
        model.add_mark(mark(1, IntBBox::new(0, 0, 1, 1))).expect("add");
        model.add_mark(mark(2, IntBBox::new(0, 0, 1, 1))).expect("add");
        model.ensure_add_edge(MarkId(1), MarkId(2)).expect("edge");

        model.add_mark(mark(2, IntBBox::new(5, 5, 9, 9))).expect("replace");
        assert!(model.graph().contains(MarkId(1), MarkId(2)));
        assert!(model
            .mark(MarkId(2))
            .expect("mark")
            .inlinks()
            .contains(&MarkId(1)));
    }

    #[test]
    fn import_marks_is_atomic_and_coalesced() {
        let mut model = AnnotationModel::new();
        let events = recorded(&mut model);

        let dup = vec![
            mark(1, IntBBox::new(0, 0, 1, 1)),
            mark(1, IntBBox::new(0, 0, 2, 2)),
        ];
        assert!(matches!(
            model.import_marks(dup),
            Err(ScoremarkError::DuplicateMarkId(MarkId(1)))
        ));
        assert!(model.is_empty());
        assert!(events.borrow().is_empty());

        let mut head = mark(1, IntBBox::new(0, 0, 1, 1));
        head.outlinks_mut().insert(MarkId(2));
        model
            .import_marks(vec![head, mark(2, IntBBox::new(0, 0, 1, 1))])
            .expect("import");
        assert_eq!(model.len(), 2);
        assert!(model.graph().contains(MarkId(1), MarkId(2)));
        assert_eq!(
            *events.borrow(),
            vec![ModelEvent::MarksChanged, ModelEvent::EdgesChanged]
        );
    }

    #[test]
    fn import_marks_rejects_links_to_absent_marks() {
        let mut model = AnnotationModel::new();
        let mut head = mark(1, IntBBox::new(0, 0, 1, 1));
        head.outlinks_mut().insert(MarkId(7));
        assert!(matches!(
            model.import_marks(vec![head]),
            Err(ScoremarkError::UnknownMark(MarkId(7)))
        ));
        assert!(model.is_empty());
    }

    #[test]
    fn clear_marks_empties_graph() {
        let mut model = AnnotationModel::new();
        model.add_mark(mark(1, IntBBox::new(0, 0, 1, 1))).expect("add");
        model.add_mark(mark(2, IntBBox::new(0, 0, 1, 1))).expect("add");
        model.ensure_add_edge(MarkId(1), MarkId(2)).expect("edge");
        let events = recorded(&mut model);

        model.clear_marks();
        assert!(model.is_empty());
        assert!(model.graph().is_empty());
        assert_eq!(
            *events.borrow(),
            vec![ModelEvent::MarksChanged, ModelEvent::EdgesChanged]
        );
    }

    #[test]
    fn validate_reports_unknown_class_before_out_of_bounds() {
        let mut model = AnnotationModel::new();
        model.load_image(Raster::zeros(10, 10));
        model.add_mark(mark(0, IntBBox::new(5, 5, 12, 12))).expect("add");
        model.add_mark(mark(1, IntBBox::new(0, 0, 2, 2))).expect("add");
        assert!(matches!(
            model.validate(),
            Err(ScoremarkError::OutOfBounds { mark: MarkId(0), .. })
        ));

        model
            .load_catalog(vec![ClassDef::new(2u64, "beam")])
            .expect("catalog");
        assert!(matches!(
            model.validate(),
            Err(ScoremarkError::UnknownClass { mark: MarkId(0), .. })
        ));
    }

    #[test]
    fn merge_marks_carries_external_edges() {
        let mut model = AnnotationModel::new();
        model.add_mark(mark(0, IntBBox::new(0, 0, 2, 2))).expect("add");
        model.add_mark(mark(1, IntBBox::new(3, 3, 5, 5))).expect("add");
        model.add_mark(mark(2, IntBBox::new(8, 8, 9, 9))).expect("add");
        model.ensure_add_edge(MarkId(0), MarkId(1)).expect("internal");
        model.ensure_add_edge(MarkId(2), MarkId(1)).expect("external");

        let merged = model.merge_marks(&[MarkId(0), MarkId(1)]).expect("merge");
        assert_eq!(merged, MarkId(3));
        assert_eq!(model.len(), 2);
        let mark = model.mark(merged).expect("merged");
        assert_eq!(mark.bbox(), IntBBox::new(0, 0, 5, 5));
        assert!(mark.mask().is_none());

        let edges: Vec<EdgeKey> = model.graph().edges().keys().copied().collect();
        assert_eq!(edges, vec![(MarkId(2), MarkId(3))]);
    }

    #[test]
    fn merge_marks_fills_missing_masks() {
        let mut model = AnnotationModel::new();
        let masked = mark(0, IntBBox::new(0, 0, 1, 2))
            .with_mask(Mask::from_rows(&[vec![0, 1]]).expect("mask"))
            .expect("masked");
        model.add_mark(masked).expect("add");
        model.add_mark(mark(1, IntBBox::new(1, 0, 2, 1))).expect("add");

        let merged = model.merge_marks(&[MarkId(0), MarkId(1)]).expect("merge");
        let mask = model.mark(merged).and_then(Mark::mask).expect("mask");
        assert_eq!(mask.values(), &[0, 1, 1, 0]);
    }

    #[test]
    fn merge_marks_rejects_empty_and_unknown() {
        let mut model = AnnotationModel::new();
        assert!(matches!(
            model.merge_marks(&[]),
            Err(ScoremarkError::EmptyMerge)
        ));
        assert!(matches!(
            model.merge_marks(&[MarkId(3)]),
            Err(ScoremarkError::UnknownMark(MarkId(3)))
        ));
    }

    #[test]
    fn components_are_cached_until_image_changes() {
        let mut model = AnnotationModel::new();
        assert!(matches!(model.components(), Err(ScoremarkError::NoImage)));

        let image = Raster::from_rows(&[vec![1, 0, 1]]).expect("image");
        model.load_image(image);
        assert_eq!(model.components().expect("labels").count(), 2);

        model.load_image(Raster::from_rows(&[vec![1, 1, 1]]).expect("image"));
        assert_eq!(model.components().expect("labels").count(), 1);
    }
}
