use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;

use crate::geometry::{Point, Rect, Size};

use super::selector::Selector;

/// Handle to an element inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementId(u64);

impl ElementId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Description of an element inserted into a document.
#[derive(Debug, Clone)]
pub struct ElementSpec {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    rect: Rect,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            classes: Vec::new(),
            rect: Rect::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Layout rectangle in page coordinates.
    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ElementData {
    pub(crate) tag: String,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attributes: BTreeMap<String, String>,
    pub(crate) rect: Rect,
    pub(crate) scroll: Point,
}

/// Events flowing through a document's listener bus. Pointer coordinates are
/// page pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DocumentEvent {
    PointerMove(Point),
    Scroll(ElementId),
    Resize(Size),
}

/// Subscription filter for [`Document::add_listener`]. Scroll listeners are
/// attached to one element, mirroring how hosts scope scroll subscriptions
/// to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    PointerMove,
    Resize,
    Scroll(ElementId),
}

/// Handle for detaching a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type ListenerFn = Arc<dyn Fn(&DocumentEvent) + Send + Sync>;

struct ListenerEntry {
    id: ListenerId,
    kind: ListenerKind,
    handler: ListenerFn,
}

#[derive(Default)]
struct DocumentState {
    elements: BTreeMap<ElementId, ElementData>,
    viewport: Size,
    scroll: Point,
}

struct DocumentInner {
    state: RwLock<DocumentState>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_element: AtomicU64,
    next_listener: AtomicU64,
}

/// A headless page: element store plus event bus. Cheap to clone; clones
/// share the same underlying page.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl Document {
    pub fn new(viewport: Size) -> Self {
        Self {
            inner: Arc::new(DocumentInner {
                state: RwLock::new(DocumentState {
                    elements: BTreeMap::new(),
                    viewport,
                    scroll: Point::default(),
                }),
                listeners: Mutex::new(Vec::new()),
                next_element: AtomicU64::new(0),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    // ---- elements -------------------------------------------------------

    pub fn insert(&self, spec: ElementSpec) -> ElementId {
        let id = ElementId(self.inner.next_element.fetch_add(1, Ordering::Relaxed) + 1);
        let mut state = self.write();
        state.elements.insert(
            id,
            ElementData {
                tag: spec.tag,
                id: spec.id,
                classes: spec.classes,
                attributes: BTreeMap::new(),
                rect: spec.rect,
                scroll: Point::default(),
            },
        );
        id
    }

    pub fn remove(&self, id: ElementId) -> bool {
        self.write().elements.remove(&id).is_some()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.read().elements.contains_key(&id)
    }

    pub fn rect(&self, id: ElementId) -> Option<Rect> {
        self.read().elements.get(&id).map(|e| e.rect)
    }

    pub fn set_rect(&self, id: ElementId, rect: Rect) {
        if let Some(element) = self.write().elements.get_mut(&id) {
            element.rect = rect;
        }
    }

    /// Scroll offsets of a container element.
    pub fn scroll_offsets(&self, id: ElementId) -> Option<Point> {
        self.read().elements.get(&id).map(|e| e.scroll)
    }

    /// Update a container's scroll offsets and notify its scroll listeners.
    pub fn scroll_element(&self, id: ElementId, offsets: Point) {
        {
            let mut state = self.write();
            match state.elements.get_mut(&id) {
                Some(element) => element.scroll = offsets,
                None => return,
            }
        }
        self.dispatch(DocumentEvent::Scroll(id));
    }

    // ---- attributes -----------------------------------------------------

    pub fn set_attribute(&self, id: ElementId, name: impl Into<String>, value: impl Into<String>) {
        if let Some(element) = self.write().elements.get_mut(&id) {
            element.attributes.insert(name.into(), value.into());
        }
    }

    pub fn attribute(&self, id: ElementId, name: &str) -> Option<String> {
        self.read()
            .elements
            .get(&id)
            .and_then(|e| e.attributes.get(name).cloned())
    }

    pub fn has_attribute(&self, id: ElementId, name: &str) -> bool {
        self.read()
            .elements
            .get(&id)
            .is_some_and(|e| e.attributes.contains_key(name))
    }

    // ---- selectors ------------------------------------------------------

    /// First element matching `selector`, in insertion order.
    pub fn query_selector(&self, selector: &str) -> Option<ElementId> {
        let selector = Selector::parse(selector);
        let state = self.read();
        state
            .elements
            .iter()
            .find(|(_, data)| selector.matches(data))
            .map(|(id, _)| *id)
    }

    pub fn query_selector_all(&self, selector: &str) -> Vec<ElementId> {
        let selector = Selector::parse(selector);
        let state = self.read();
        state
            .elements
            .iter()
            .filter(|(_, data)| selector.matches(data))
            .map(|(id, _)| *id)
            .collect()
    }

    // ---- viewport and page scroll --------------------------------------

    pub fn viewport(&self) -> Size {
        self.read().viewport
    }

    /// Update the viewport and notify resize listeners.
    pub fn resize(&self, viewport: Size) {
        self.write().viewport = viewport;
        self.dispatch(DocumentEvent::Resize(viewport));
    }

    pub fn page_scroll(&self) -> Point {
        self.read().scroll
    }

    pub fn set_page_scroll(&self, scroll: Point) {
        self.write().scroll = scroll;
    }

    /// Report a cursor position in page coordinates to pointer listeners.
    pub fn pointer_move(&self, x: f64, y: f64) {
        self.dispatch(DocumentEvent::PointerMove(Point::new(x, y)));
    }

    // ---- listener bus ---------------------------------------------------

    pub fn add_listener(&self, kind: ListenerKind, handler: ListenerFn) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed) + 1);
        let mut listeners = self.lock_listeners();
        listeners.push(ListenerEntry { id, kind, handler });
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|entry| entry.id != id);
        listeners.len() != before
    }

    /// Number of registered listeners of a given kind. Intended for tests
    /// and diagnostics.
    pub fn listener_count(&self, kind: ListenerKind) -> usize {
        self.lock_listeners()
            .iter()
            .filter(|entry| entry.kind == kind)
            .count()
    }

    /// Deliver an event to every matching listener. Handlers run on the
    /// calling thread after the listener table lock is released, so a
    /// handler may attach or detach listeners while handling the event.
    pub fn dispatch(&self, event: DocumentEvent) {
        let matching: Vec<ListenerFn> = {
            let listeners = self.lock_listeners();
            listeners
                .iter()
                .filter(|entry| match (entry.kind, &event) {
                    (ListenerKind::PointerMove, DocumentEvent::PointerMove(_)) => true,
                    (ListenerKind::Resize, DocumentEvent::Resize(_)) => true,
                    (ListenerKind::Scroll(target), DocumentEvent::Scroll(source)) => {
                        target == *source
                    }
                    _ => false,
                })
                .map(|entry| Arc::clone(&entry.handler))
                .collect()
        };
        for handler in matching {
            handler(&event);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, DocumentState> {
        self.inner.state.read().expect("document state poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, DocumentState> {
        self.inner.state.write().expect("document state poisoned")
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<ListenerEntry>> {
        self.inner
            .listeners
            .lock()
            .expect("listener table poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn doc() -> Document {
        Document::new(Size::new(1024.0, 768.0))
    }

    #[test]
    fn insert_query_and_remove() {
        let doc = doc();
        let a = doc.insert(ElementSpec::new("div").with_id("a").with_class("card"));
        let b = doc.insert(ElementSpec::new("div").with_class("card"));

        assert_eq!(doc.query_selector("#a"), Some(a));
        assert_eq!(doc.query_selector(".card"), Some(a));
        assert_eq!(doc.query_selector_all(".card"), vec![a, b]);
        assert_eq!(doc.query_selector("#missing"), None);

        assert!(doc.remove(a));
        assert!(!doc.contains(a));
        assert_eq!(doc.query_selector(".card"), Some(b));
    }

    #[test]
    fn attribute_round_trip() {
        let doc = doc();
        let el = doc.insert(ElementSpec::new("div"));
        assert!(!doc.has_attribute(el, "data-nearfield"));
        doc.set_attribute(el, "data-nearfield", "");
        assert!(doc.has_attribute(el, "data-nearfield"));
        assert_eq!(doc.query_selector("[data-nearfield]"), Some(el));
        assert_eq!(doc.attribute(el, "data-nearfield").as_deref(), Some(""));
    }

    #[test]
    fn scroll_dispatches_only_to_matching_listener() {
        let doc = doc();
        let a = doc.insert(ElementSpec::new("div"));
        let b = doc.insert(ElementSpec::new("div"));

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in = Arc::clone(&hits);
        doc.add_listener(
            ListenerKind::Scroll(a),
            Arc::new(move |_| {
                hits_in.fetch_add(1, Ordering::Relaxed);
            }),
        );

        doc.scroll_element(a, Point::new(0.0, 50.0));
        doc.scroll_element(b, Point::new(0.0, 99.0));
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert_eq!(doc.scroll_offsets(a), Some(Point::new(0.0, 50.0)));
    }

    #[test]
    fn listener_can_detach_itself_mid_dispatch() {
        let doc = doc();
        let count = Arc::new(AtomicUsize::new(0));

        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let doc_in = doc.clone();
        let slot_in = Arc::clone(&slot);
        let count_in = Arc::clone(&count);
        let id = doc.add_listener(
            ListenerKind::PointerMove,
            Arc::new(move |_| {
                count_in.fetch_add(1, Ordering::Relaxed);
                if let Some(id) = slot_in.lock().unwrap().take() {
                    doc_in.remove_listener(id);
                }
            }),
        );
        *slot.lock().unwrap() = Some(id);

        doc.pointer_move(1.0, 1.0);
        doc.pointer_move(2.0, 2.0);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(doc.listener_count(ListenerKind::PointerMove), 0);
    }

    #[test]
    fn resize_updates_viewport_before_notifying() {
        let doc = doc();
        let seen = Arc::new(Mutex::new(Size::default()));
        let seen_in = Arc::clone(&seen);
        let doc_in = doc.clone();
        doc.add_listener(
            ListenerKind::Resize,
            Arc::new(move |_| {
                *seen_in.lock().unwrap() = doc_in.viewport();
            }),
        );
        doc.resize(Size::new(640.0, 480.0));
        assert_eq!(*seen.lock().unwrap(), Size::new(640.0, 480.0));
    }
}
