//! Change notifications emitted by the annotation model.

use std::fmt;

/// A committed change to the annotation model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    ImageChanged,
    CatalogChanged,
    MarksChanged,
    EdgesChanged,
}

impl fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelEvent::ImageChanged => "image_changed",
            ModelEvent::CatalogChanged => "catalog_changed",
            ModelEvent::MarksChanged => "marks_changed",
            ModelEvent::EdgesChanged => "edges_changed",
        };
        f.write_str(name)
    }
}

/// A registered observer callback.
pub type Listener = Box<dyn FnMut(ModelEvent)>;

/// Observers registered on a model, notified in registration order.
#[derive(Default)]
pub(crate) struct Listeners {
    listeners: Vec<Listener>,
}

impl Listeners {
    pub(crate) fn push(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    pub(crate) fn emit(&mut self, event: ModelEvent) {
        tracing::trace!(%event, "model event");
        for listener in &mut self.listeners {
            listener(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}
