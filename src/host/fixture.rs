//! YAML page fixtures
//!
//! A fixture describes a viewport and a body tree:
//!
//! ```yaml
//! viewport: { width: 1280, height: 800 }
//! body:
//!   - tag: h1
//!     rect: { y: 0, height: 48 }
//!     text: Getting started
//!   - tag: ul
//!     children:
//!       - { tag: li, text: First item }
//!       - plain text child
//! ```
//!
//! Elements without a `rect` inherit their parent's box.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::document::{Document, NodeId, Rect};
use super::page::{Page, Viewport};
use crate::error::{GlosserError, Result};

/// A child in a fixture: bare strings are text nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Text(String),
    Element(FragmentSpec),
}

/// An element and its subtree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentSpec {
    pub tag: String,
    pub class: Option<String>,
    pub attrs: BTreeMap<String, String>,
    pub rect: Option<Rect>,
    /// Leading text child
    pub text: Option<String>,
    pub children: Vec<NodeSpec>,
}

impl FragmentSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    /// Place the element at a vertical offset with full-width layout
    pub fn at(mut self, y: f64, height: f64) -> Self {
        self.rect = Some(Rect::new(0.0, y, 1000.0, height));
        self
    }

    pub fn with_child(mut self, child: FragmentSpec) -> Self {
        self.children.push(NodeSpec::Element(child));
        self
    }

    pub fn with_text_child(mut self, text: &str) -> Self {
        self.children.push(NodeSpec::Text(text.to_string()));
        self
    }

    /// Create the subtree as a detached fragment and return its root
    pub fn build(&self, doc: &mut Document, inherited: Rect) -> NodeId {
        let el = doc.create_element(&self.tag);
        let mut rect = self.rect.unwrap_or(inherited);
        if rect.width <= 0.0 {
            rect.x = inherited.x;
            rect.width = inherited.width;
        }
        // Fresh elements cannot fail these
        let _ = doc.set_rect(el, rect);
        if let Some(class) = &self.class {
            let _ = doc.set_attr(el, "class", class.as_str());
        }
        for (name, value) in &self.attrs {
            let _ = doc.set_attr(el, name, value.as_str());
        }
        if let Some(text) = &self.text {
            let t = doc.create_text(text.as_str());
            let _ = doc.append_child(el, t);
        }
        for child in &self.children {
            let node = match child {
                NodeSpec::Text(text) => doc.create_text(text.as_str()),
                NodeSpec::Element(spec) => spec.build(doc, rect),
            };
            let _ = doc.append_child(el, node);
        }
        el
    }
}

/// A complete page description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageFixture {
    pub viewport: Viewport,
    pub body: Vec<NodeSpec>,
}

impl PageFixture {
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| GlosserError::Fixture(format!("{}: {}", path.display(), e)))?;
        let fixture = Self::from_yaml(&content)?;
        log::info!("Loaded page fixture from: {}", path.display());
        Ok(fixture)
    }

    /// Build the document tree
    pub fn build_document(&self) -> Document {
        let mut doc = Document::new();
        let body = doc.body();
        let body_rect = Rect::new(0.0, 0.0, self.viewport.width, self.viewport.height);
        let _ = doc.set_rect(body, body_rect);
        for child in &self.body {
            let node = match child {
                NodeSpec::Text(text) => doc.create_text(text.as_str()),
                NodeSpec::Element(spec) => spec.build(&mut doc, body_rect),
            };
            let _ = doc.append_child(body, node);
        }
        doc
    }

    /// Build a ready page
    pub fn into_page(self) -> Arc<Page> {
        let doc = self.build_document();
        Page::new(doc, self.viewport)
    }
}
