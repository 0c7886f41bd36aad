//! Arena-backed document tree
//!
//! Nodes are addressed by copyable [`NodeId`] handles. Detached nodes stay in
//! the arena, so a stale handle never aliases a different node.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Handle to a node in a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Build a handle from a raw arena index
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Raw arena index
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Layout box of an element, in CSS pixels relative to the document origin
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Grow the rect by `margin` on every side
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2.0 * margin,
            height: self.height + 2.0 * margin,
        }
    }

    /// Same test the visibility primitive uses: strict overlap on both axes
    pub fn intersects(&self, other: &Rect) -> bool {
        self.y < other.bottom() && self.bottom() > other.y && self.x < other.right() && self.right() > other.x
    }
}

/// Errors from tree operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("node {0} has no attach point")]
    Detached(NodeId),

    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("cannot insert {child} into its own subtree")]
    HierarchyRequest { child: NodeId },
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    rect: Rect,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A mutable document tree rooted at a `body` element
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document containing only `body`
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            body: NodeId(0),
        };
        doc.body = doc.create_element("body");
        doc
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Number of nodes ever created, attached or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    /// Create a detached element; the tag is normalized to lowercase
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(Element {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            rect: Rect::default(),
        }))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.0)
    }

    fn element(&self, node: NodeId) -> Option<&Element> {
        match &self.data(node)?.kind {
            NodeKind::Element(el) => Some(el),
            NodeKind::Text(_) => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Result<&mut Element, DomError> {
        match self.nodes.get_mut(node.0).map(|d| &mut d.kind) {
            Some(NodeKind::Element(el)) => Ok(el),
            Some(NodeKind::Text(_)) => Err(DomError::NotAnElement(node)),
            None => Err(DomError::UnknownNode(node)),
        }
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if !self.contains(child) {
            return Err(DomError::UnknownNode(child));
        }
        if self.element(parent).is_none() {
            return if self.contains(parent) {
                Err(DomError::NotAnElement(parent))
            } else {
                Err(DomError::UnknownNode(parent))
            };
        }
        if parent == child || self.ancestors(parent).any(|a| a == child) {
            return Err(DomError::HierarchyRequest { child });
        }
        Ok(())
    }

    /// Append `child` as the last child of `parent`, moving it if attached elsewhere
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.check_insertable(parent, child)?;
        self.detach(child);
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    /// Insert `node` as the next sibling of `reference`
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> Result<(), DomError> {
        let parent = self
            .parent(reference)
            .ok_or(DomError::Detached(reference))?;
        self.check_insertable(parent, node)?;
        self.detach(node);
        let siblings = &mut self.nodes[parent.0].children;
        let position = siblings
            .iter()
            .position(|&c| c == reference)
            .map(|p| p + 1)
            .unwrap_or(siblings.len());
        siblings.insert(position, node);
        self.nodes[node.0].parent = Some(parent);
        Ok(())
    }

    /// Remove `node` from its parent. The subtree stays intact but detached.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        self.nodes[parent.0].children.retain(|&c| c != node);
        self.nodes[node.0].parent = None;
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node)?.parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.data(node).map(|d| d.children.as_slice()).unwrap_or(&[])
    }

    /// Ancestors from the parent up to the root, exclusive of `node`
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), move |&n| self.parent(n))
    }

    /// Pre-order descendants, exclusive of `root`
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        out
    }

    /// True when the node is the body or hangs off it
    pub fn is_attached(&self, node: NodeId) -> bool {
        node == self.body || self.ancestors(node).any(|a| a == self.body)
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.tag.as_str())
    }

    /// Text of a text node
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.data(node)?.kind {
            NodeKind::Text(text) => Some(text.as_str()),
            NodeKind::Element(_) => None,
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attributes.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: impl Into<String>) -> Result<(), DomError> {
        self.element_mut(node)?
            .attributes
            .insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) -> Option<String> {
        self.element_mut(node).ok()?.attributes.remove(name)
    }

    /// All attributes of an element, in name order
    pub fn attributes(&self, node: NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.element(node)
            .into_iter()
            .flat_map(|el| el.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn class(&self, node: NodeId) -> Option<&str> {
        self.attr(node, "class")
    }

    /// Substring match against the raw class attribute
    pub fn has_class_fragment(&self, node: NodeId, fragment: &str) -> bool {
        self.class(node).is_some_and(|c| c.contains(fragment))
    }

    /// Exact match against one of the whitespace separated class names
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.class(node)
            .is_some_and(|c| c.split_whitespace().any(|name| name == class))
    }

    pub fn rect(&self, node: NodeId) -> Option<Rect> {
        self.element(node).map(|el| el.rect)
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) -> Result<(), DomError> {
        self.element_mut(node)?.rect = rect;
        Ok(())
    }

    /// Trimmed, non-empty text of the node's own text children
    pub fn direct_text_runs(&self, node: NodeId) -> Vec<&str> {
        self.children(node)
            .iter()
            .filter_map(|&c| self.text(c))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Concatenated text of every descendant text node
    pub fn text_content(&self, node: NodeId) -> String {
        if let Some(text) = self.text(node) {
            return text.to_string();
        }
        self.descendants(node)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Elements under `root` whose tag is in `tags`, in document order
    pub fn elements_by_tag(&self, root: NodeId, tags: &[&str], include_root: bool) -> Vec<NodeId> {
        let matches = |n: NodeId| self.tag(n).is_some_and(|t| tags.contains(&t));
        let mut out = Vec::new();
        if include_root && matches(root) {
            out.push(root);
        }
        out.extend(self.descendants(root).into_iter().filter(|&n| matches(n)));
        out
    }

    /// Every element in the arena carrying `name`, attached or not
    pub fn elements_with_attr(&self, name: &str) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|&n| self.has_attr(n, name))
            .collect()
    }

    /// Attached elements carrying the exact class name
    pub fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants(self.body)
            .into_iter()
            .filter(|&n| self.has_class(n, class))
            .collect()
    }
}
