//! Eligibility filter
//!
//! A node is a candidate for annotation when:
//! - it is not marked processed
//! - its tag is not excluded (code, script, style, form controls)
//! - no ancestor is processed, has an excluded tag, or an excluded class
//! - it has a direct text run of at least `min_text_len` characters after trimming
//! - one of its direct text runs contains a character of the source script
//!
//! The filter is total and side-effect-free.

use serde::{Deserialize, Serialize};

use crate::domain::{ANNOTATION_CLASS, PROCESSED_ATTR};
use crate::host::{Document, NodeId};

/// Tags never annotated, and whose subtrees are never annotated
pub const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "code", "pre", "textarea", "input", "button", "noscript", "kbd", "samp",
];

/// Class fragments marking code blocks and our own annotation output
pub const EXCLUDED_CLASS_FRAGMENTS: &[&str] = &["hljs", "language-", ANNOTATION_CLASS];

/// Text-bearing tags visited by discovery
pub const CANDIDATE_TAGS: &[&str] = &[
    "p", "li", "td", "th", "h1", "h2", "h3", "h4", "h5", "h6", "span", "div", "a", "label",
];

/// Default minimum trimmed length of a direct text run
pub const DEFAULT_MIN_TEXT_LEN: usize = 3;

/// Script of the text being translated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceScript {
    #[default]
    Latin,
    Cyrillic,
    Greek,
}

impl SourceScript {
    pub fn contains_char(&self, c: char) -> bool {
        match self {
            SourceScript::Latin => c.is_ascii_alphabetic() || (c.is_alphabetic() && ('\u{00C0}'..='\u{024F}').contains(&c)),
            SourceScript::Cyrillic => ('\u{0400}'..='\u{04FF}').contains(&c),
            SourceScript::Greek => ('\u{0370}'..='\u{03FF}').contains(&c),
        }
    }

    pub fn appears_in(&self, text: &str) -> bool {
        text.chars().any(|c| self.contains_char(c))
    }
}

/// Text submitted for a node: its direct runs joined by single spaces
pub fn source_text(doc: &Document, node: NodeId) -> String {
    doc.direct_text_runs(node).join(" ")
}

/// Decides whether a node qualifies for annotation work
#[derive(Debug, Clone, Copy)]
pub struct EligibilityFilter {
    min_text_len: usize,
    script: SourceScript,
}

impl Default for EligibilityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_TEXT_LEN, SourceScript::default())
    }
}

impl EligibilityFilter {
    pub fn new(min_text_len: usize, script: SourceScript) -> Self {
        Self { min_text_len, script }
    }

    pub fn min_text_len(&self) -> usize {
        self.min_text_len
    }

    pub fn is_eligible(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        if doc.has_attr(node, PROCESSED_ATTR) || EXCLUDED_TAGS.contains(&tag) {
            return false;
        }
        // An annotation element is never a candidate itself
        if doc.has_class(node, ANNOTATION_CLASS) {
            return false;
        }
        if self.in_excluded_region(doc, node) {
            return false;
        }
        let runs = doc.direct_text_runs(node);
        runs.iter().any(|t| t.chars().count() >= self.min_text_len) && runs.iter().any(|t| self.script.appears_in(t))
    }

    /// True when some ancestor is processed, excluded by tag, or excluded by class
    pub fn in_excluded_region(&self, doc: &Document, node: NodeId) -> bool {
        doc.ancestors(node).any(|ancestor| {
            doc.has_attr(ancestor, PROCESSED_ATTR)
                || doc.tag(ancestor).is_some_and(|t| EXCLUDED_TAGS.contains(&t))
                || EXCLUDED_CLASS_FRAGMENTS
                    .iter()
                    .any(|fragment| doc.has_class_fragment(ancestor, fragment))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FragmentSpec;
    use crate::host::Rect;

    fn attach(doc: &mut Document, spec: FragmentSpec) -> NodeId {
        let body = doc.body();
        let node = spec.build(doc, Rect::default());
        doc.append_child(body, node).unwrap();
        node
    }

    #[test]
    fn test_plain_paragraph_is_eligible() {
        let mut doc = Document::new();
        let p = attach(&mut doc, FragmentSpec::new("p").with_text("Hello world"));
        assert!(EligibilityFilter::default().is_eligible(&doc, p));
    }

    #[test]
    fn test_excluded_tag() {
        let mut doc = Document::new();
        let code = attach(&mut doc, FragmentSpec::new("code").with_text("let x = 1;"));
        assert!(!EligibilityFilter::default().is_eligible(&doc, code));
    }

    #[test]
    fn test_inside_excluded_tag() {
        let mut doc = Document::new();
        let pre = attach(
            &mut doc,
            FragmentSpec::new("pre").with_child(FragmentSpec::new("span").with_text("fn main() {}")),
        );
        let span = doc.children(pre)[0];
        let filter = EligibilityFilter::default();
        assert!(filter.in_excluded_region(&doc, span));
        assert!(!filter.is_eligible(&doc, span));
    }

    #[test]
    fn test_inside_excluded_class() {
        let mut doc = Document::new();
        let block = attach(
            &mut doc,
            FragmentSpec::new("div")
                .with_class("highlight language-python")
                .with_child(FragmentSpec::new("span").with_text("import os")),
        );
        let span = doc.children(block)[0];
        assert!(!EligibilityFilter::default().is_eligible(&doc, span));
    }

    #[test]
    fn test_processed_node_and_descendants() {
        let mut doc = Document::new();
        let div = attach(
            &mut doc,
            FragmentSpec::new("div")
                .with_text("Outer text here")
                .with_child(FragmentSpec::new("span").with_text("Inner text here")),
        );
        let span = doc.children(div)[1];
        let filter = EligibilityFilter::default();
        assert!(filter.is_eligible(&doc, div));
        assert!(filter.is_eligible(&doc, span));

        doc.set_attr(div, PROCESSED_ATTR, "true").unwrap();
        assert!(!filter.is_eligible(&doc, div));
        assert!(!filter.is_eligible(&doc, span));
    }

    #[test]
    fn test_annotation_element_is_not_eligible() {
        let mut doc = Document::new();
        let note = attach(
            &mut doc,
            FragmentSpec::new("div")
                .with_class(ANNOTATION_CLASS)
                .with_text("Translated API reference"),
        );
        assert!(!EligibilityFilter::default().is_eligible(&doc, note));
    }

    #[test]
    fn test_minimum_length_applies_per_run() {
        let mut doc = Document::new();
        let short = attach(&mut doc, FragmentSpec::new("p").with_text("  ab  "));
        let exact = attach(&mut doc, FragmentSpec::new("p").with_text(" abc "));
        let filter = EligibilityFilter::default();
        assert!(!filter.is_eligible(&doc, short));
        assert!(filter.is_eligible(&doc, exact));
    }

    #[test]
    fn test_only_direct_text_counts() {
        let mut doc = Document::new();
        let div = attach(
            &mut doc,
            FragmentSpec::new("div").with_child(FragmentSpec::new("p").with_text("Nested paragraph")),
        );
        assert!(!EligibilityFilter::default().is_eligible(&doc, div));
    }

    #[test]
    fn test_requires_source_script() {
        let mut doc = Document::new();
        let chinese = attach(&mut doc, FragmentSpec::new("p").with_text("你好世界"));
        let digits = attach(&mut doc, FragmentSpec::new("p").with_text("2024-01-01"));
        let filter = EligibilityFilter::default();
        assert!(!filter.is_eligible(&doc, chinese));
        assert!(!filter.is_eligible(&doc, digits));

        let russian = attach(&mut doc, FragmentSpec::new("p").with_text("Привет мир"));
        assert!(!filter.is_eligible(&doc, russian));
        assert!(EligibilityFilter::new(3, SourceScript::Cyrillic).is_eligible(&doc, russian));
    }

    #[test]
    fn test_text_nodes_are_never_eligible() {
        let mut doc = Document::new();
        let text = doc.create_text("Plain text node");
        let body = doc.body();
        doc.append_child(body, text).unwrap();
        assert!(!EligibilityFilter::default().is_eligible(&doc, text));
    }

    #[test]
    fn test_filter_is_repeatable() {
        let mut doc = Document::new();
        let p = attach(&mut doc, FragmentSpec::new("p").with_text("Hello world"));
        let filter = EligibilityFilter::default();
        for _ in 0..3 {
            assert!(filter.is_eligible(&doc, p));
        }
        assert!(!doc.has_attr(p, PROCESSED_ATTR));
    }

    #[test]
    fn test_source_text_joins_runs() {
        let mut doc = Document::new();
        let p = attach(
            &mut doc,
            FragmentSpec::new("p")
                .with_text(" Hello ")
                .with_child(FragmentSpec::new("b").with_text("bold"))
                .with_text_child(" world "),
        );
        assert_eq!(source_text(&doc, p), "Hello world");
    }
}
