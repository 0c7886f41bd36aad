//! Host page: a document plus the notification primitives the scheduler wraps
//!
//! The page plays the part of the browser. It owns the tree and the viewport,
//! and delivers two kinds of notification batches over unbounded channels:
//! - intersection entries for observed nodes against the viewport grown by a margin
//! - child-list mutation records for every `mutate` call

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use super::document::{Document, DomError, NodeId, Rect};
use super::fixture::FragmentSpec;

/// Visible area of the page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scroll_x: 0.0,
            scroll_y: 0.0,
            width: 1280.0,
            height: 800.0,
        }
    }
}

impl Viewport {
    pub fn rect(&self) -> Rect {
        Rect::new(self.scroll_x, self.scroll_y, self.width, self.height)
    }
}

/// One intersection notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntersectionEntry {
    pub node: NodeId,
    pub is_intersecting: bool,
}

/// One child-list mutation notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationRecord {
    /// Roots of inserted subtrees
    pub added: Vec<NodeId>,
    /// Roots of removed subtrees
    pub removed: Vec<NodeId>,
}

impl MutationRecord {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Failure to attach a notification primitive
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserveError {
    #[error("document is not ready")]
    NotReady,

    #[error("observer is disconnected")]
    Disconnected,
}

pub type EntryBatch = Vec<IntersectionEntry>;
pub type MutationBatch = Vec<MutationRecord>;

struct IntersectionRegistration {
    margin: f64,
    targets: HashMap<NodeId, bool>,
    tx: mpsc::UnboundedSender<EntryBatch>,
}

struct PageInner {
    document: Document,
    viewport: Viewport,
    ready: bool,
    next_observer_id: u64,
    intersection: HashMap<u64, IntersectionRegistration>,
    mutation: HashMap<u64, mpsc::UnboundedSender<MutationBatch>>,
}

impl PageInner {
    fn next_id(&mut self) -> u64 {
        self.next_observer_id += 1;
        self.next_observer_id
    }

    fn intersects(&self, node: NodeId, margin: f64) -> bool {
        let region = self.viewport.rect().expand(margin);
        self.document.is_attached(node)
            && self
                .document
                .rect(node)
                .is_some_and(|r| r.intersects(&region))
    }

    /// Re-evaluate every observer and deliver the entries whose state flipped
    fn recompute_intersections(&mut self) {
        let mut updates: Vec<(u64, EntryBatch)> = Vec::new();
        for (&id, reg) in &self.intersection {
            let batch: EntryBatch = reg
                .targets
                .iter()
                .filter_map(|(&node, &was)| {
                    let now = self.intersects(node, reg.margin);
                    (now != was).then_some(IntersectionEntry {
                        node,
                        is_intersecting: now,
                    })
                })
                .collect();
            if !batch.is_empty() {
                updates.push((id, batch));
            }
        }

        for (id, mut batch) in updates {
            let Some(reg) = self.intersection.get_mut(&id) else {
                continue;
            };
            for entry in &batch {
                reg.targets.insert(entry.node, entry.is_intersecting);
            }
            batch.sort_by_key(|e| e.node);
            if reg.tx.send(batch).is_err() {
                self.intersection.remove(&id);
            }
        }
    }
}

/// Shared host page
pub struct Page {
    inner: Mutex<PageInner>,
}

impl Page {
    /// A page whose document is ready for observers
    pub fn new(document: Document, viewport: Viewport) -> Arc<Self> {
        Self::build(document, viewport, true)
    }

    /// A page still loading; observers fail with `NotReady` until `mark_ready`
    pub fn loading(document: Document, viewport: Viewport) -> Arc<Self> {
        Self::build(document, viewport, false)
    }

    fn build(document: Document, viewport: Viewport, ready: bool) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(PageInner {
                document,
                viewport,
                ready,
                next_observer_id: 0,
                intersection: HashMap::new(),
                mutation: HashMap::new(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PageInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    pub fn mark_ready(&self) {
        self.lock().ready = true;
    }

    pub fn viewport(&self) -> Viewport {
        self.lock().viewport
    }

    /// Scroll the viewport and notify intersection observers
    pub fn scroll_to(&self, x: f64, y: f64) {
        let mut inner = self.lock();
        inner.viewport.scroll_x = x;
        inner.viewport.scroll_y = y;
        inner.recompute_intersections();
    }

    /// Resize the viewport and notify intersection observers
    pub fn resize(&self, width: f64, height: f64) {
        let mut inner = self.lock();
        inner.viewport.width = width;
        inner.viewport.height = height;
        inner.recompute_intersections();
    }

    /// Whether `node` currently intersects the viewport grown by `margin`
    pub fn intersects(&self, node: NodeId, margin: f64) -> bool {
        self.lock().intersects(node, margin)
    }

    /// Read-only access to the tree
    pub fn with_document<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.lock().document)
    }

    /// Attribute-level edits that do not produce child-list notifications
    pub fn with_document_mut<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.lock().document)
    }

    /// Structural edit. Whatever the closure records is delivered to mutation
    /// observers as one batch, and intersections are re-evaluated.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Document, &mut MutationRecord) -> R) -> R {
        let mut inner = self.lock();
        let mut record = MutationRecord::default();
        let result = f(&mut inner.document, &mut record);
        if !record.is_empty() {
            let batch = vec![record];
            inner.mutation.retain(|_, tx| tx.send(batch.clone()).is_ok());
            inner.recompute_intersections();
        }
        result
    }

    /// Build `fragment` and append it under `parent`
    pub fn append_fragment(&self, parent: NodeId, fragment: &FragmentSpec) -> Result<NodeId, DomError> {
        self.mutate(|doc, record| {
            let inherited = doc.rect(parent).unwrap_or_default();
            let root = fragment.build(doc, inherited);
            doc.append_child(parent, root)?;
            record.added.push(root);
            Ok(root)
        })
    }

    /// Detach `node` from the tree
    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        self.mutate(|doc, record| {
            if doc.parent(node).is_none() {
                return Err(DomError::Detached(node));
            }
            doc.detach(node);
            record.removed.push(node);
            Ok(())
        })
    }

    /// Attach a visibility observer with the given pre-fetch margin
    pub fn intersection_observer(
        self: &Arc<Self>,
        margin: f64,
    ) -> Result<(IntersectionObserver, mpsc::UnboundedReceiver<EntryBatch>), ObserveError> {
        let mut inner = self.lock();
        if !inner.ready {
            return Err(ObserveError::NotReady);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let id = inner.next_id();
        inner.intersection.insert(
            id,
            IntersectionRegistration {
                margin,
                targets: HashMap::new(),
                tx,
            },
        );
        let observer = IntersectionObserver {
            id,
            page: Arc::downgrade(self),
        };
        Ok((observer, rx))
    }

    /// Attach a child-list observer scoped to the whole body
    pub fn observe_mutations(
        self: &Arc<Self>,
    ) -> Result<(MutationObserver, mpsc::UnboundedReceiver<MutationBatch>), ObserveError> {
        let mut inner = self.lock();
        if !inner.ready {
            return Err(ObserveError::NotReady);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let id = inner.next_id();
        inner.mutation.insert(id, tx);
        let observer = MutationObserver {
            id,
            page: Arc::downgrade(self),
        };
        Ok((observer, rx))
    }

    /// Number of attached observers of both kinds
    pub fn observer_count(&self) -> usize {
        let inner = self.lock();
        inner.intersection.len() + inner.mutation.len()
    }
}

/// Handle to a registered visibility observer; disconnects on drop
pub struct IntersectionObserver {
    id: u64,
    page: Weak<Page>,
}

impl IntersectionObserver {
    /// Start observing `nodes`. Newly observed nodes produce one batch with
    /// their initial state; nodes already observed are ignored.
    pub fn observe(&self, nodes: &[NodeId]) -> Result<(), ObserveError> {
        let page = self.page.upgrade().ok_or(ObserveError::Disconnected)?;
        let mut inner = page.lock();
        let margin = inner
            .intersection
            .get(&self.id)
            .map(|reg| reg.margin)
            .ok_or(ObserveError::Disconnected)?;

        let fresh: Vec<IntersectionEntry> = nodes
            .iter()
            .map(|&node| IntersectionEntry {
                node,
                is_intersecting: inner.intersects(node, margin),
            })
            .collect();

        let reg = inner
            .intersection
            .get_mut(&self.id)
            .ok_or(ObserveError::Disconnected)?;
        let mut batch = EntryBatch::new();
        for entry in fresh {
            if reg.targets.contains_key(&entry.node) {
                continue;
            }
            reg.targets.insert(entry.node, entry.is_intersecting);
            batch.push(entry);
        }

        if !batch.is_empty() && reg.tx.send(batch).is_err() {
            inner.intersection.remove(&self.id);
            return Err(ObserveError::Disconnected);
        }
        Ok(())
    }

    pub fn disconnect(&self) {
        if let Some(page) = self.page.upgrade() {
            page.lock().intersection.remove(&self.id);
        }
    }
}

impl Drop for IntersectionObserver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Handle to a registered child-list observer; disconnects on drop
pub struct MutationObserver {
    id: u64,
    page: Weak<Page>,
}

impl MutationObserver {
    pub fn disconnect(&self) {
        if let Some(page) = self.page.upgrade() {
            page.lock().mutation.remove(&self.id);
        }
    }
}

impl Drop for MutationObserver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_rows(rows: &[f64]) -> (Arc<Page>, Vec<NodeId>) {
        let mut doc = Document::new();
        let body = doc.body();
        let nodes = rows
            .iter()
            .map(|&y| {
                let p = doc.create_element("p");
                doc.set_rect(p, Rect::new(0.0, y, 600.0, 40.0)).unwrap();
                doc.append_child(body, p).unwrap();
                p
            })
            .collect();
        (Page::new(doc, Viewport::default()), nodes)
    }

    #[test]
    fn test_loading_page_rejects_observers() {
        let page = Page::loading(Document::new(), Viewport::default());
        assert_eq!(page.intersection_observer(0.0).err(), Some(ObserveError::NotReady));
        assert_eq!(page.observe_mutations().err(), Some(ObserveError::NotReady));

        page.mark_ready();
        assert!(page.intersection_observer(0.0).is_ok());
    }

    #[test]
    fn test_observe_emits_initial_batch() {
        let (page, nodes) = page_with_rows(&[0.0, 2000.0]);
        let (observer, mut rx) = page.intersection_observer(300.0).unwrap();

        observer.observe(&nodes).unwrap();
        let batch = rx.try_recv().unwrap();
        assert_eq!(
            batch,
            vec![
                IntersectionEntry { node: nodes[0], is_intersecting: true },
                IntersectionEntry { node: nodes[1], is_intersecting: false },
            ]
        );

        // Observing again is a no-op
        observer.observe(&nodes).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_scroll_delivers_changes_only() {
        let (page, nodes) = page_with_rows(&[0.0, 2000.0, 5000.0]);
        let (observer, mut rx) = page.intersection_observer(300.0).unwrap();
        observer.observe(&nodes).unwrap();
        rx.try_recv().unwrap();

        page.scroll_to(0.0, 1500.0);
        let batch = rx.try_recv().unwrap();
        assert_eq!(
            batch,
            vec![
                IntersectionEntry { node: nodes[0], is_intersecting: false },
                IntersectionEntry { node: nodes[1], is_intersecting: true },
            ]
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_margin_prefetches_offscreen_rows() {
        let (page, nodes) = page_with_rows(&[1000.0]);
        assert!(!page.intersects(nodes[0], 0.0));
        assert!(page.intersects(nodes[0], 300.0));
    }

    #[test]
    fn test_disconnect_stops_delivery() {
        let (page, nodes) = page_with_rows(&[0.0]);
        let (observer, mut rx) = page.intersection_observer(0.0).unwrap();
        observer.disconnect();
        assert_eq!(observer.observe(&nodes), Err(ObserveError::Disconnected));
        page.scroll_to(0.0, 5000.0);
        assert!(rx.try_recv().is_err());
        assert_eq!(page.observer_count(), 0);
    }

    #[test]
    fn test_mutate_notifies_subscribers() {
        let (page, _) = page_with_rows(&[]);
        let (_observer, mut rx) = page.observe_mutations().unwrap();
        let body = page.with_document(|doc| doc.body());

        let added = page
            .append_fragment(body, &FragmentSpec::new("p").with_text("Hello there"))
            .unwrap();
        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].added, vec![added]);

        page.remove(added).unwrap();
        let batch = rx.try_recv().unwrap();
        assert_eq!(batch[0].removed, vec![added]);
    }

    #[test]
    fn test_attribute_edits_are_silent() {
        let (page, nodes) = page_with_rows(&[0.0]);
        let (_observer, mut rx) = page.observe_mutations().unwrap();
        page.with_document_mut(|doc| doc.set_attr(nodes[0], "data-x", "1")).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_removed_node_stops_intersecting() {
        let (page, nodes) = page_with_rows(&[0.0]);
        let (observer, mut rx) = page.intersection_observer(0.0).unwrap();
        observer.observe(&nodes).unwrap();
        rx.try_recv().unwrap();

        page.remove(nodes[0]).unwrap();
        let batch = rx.try_recv().unwrap();
        assert_eq!(batch, vec![IntersectionEntry { node: nodes[0], is_intersecting: false }]);
    }

    #[test]
    fn test_dropping_observer_disconnects() {
        let (page, _) = page_with_rows(&[0.0]);
        {
            let _observers = (page.intersection_observer(0.0).unwrap(), page.observe_mutations().unwrap());
            assert_eq!(page.observer_count(), 2);
        }
        assert_eq!(page.observer_count(), 0);
    }
}
