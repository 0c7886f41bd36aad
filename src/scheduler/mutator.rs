//! Tree mutator: places an accepted annotation next to its node
//!
//! Table cells receive the annotation inside the cell so the row keeps its
//! columns. Every other node gets it as the following sibling.

use crate::domain::{ALL_MARKERS, ANNOTATION_CLASS, ORIGINAL_TEXT_ATTR, PROCESSED_ATTR};
use crate::host::{Document, DomError, MutationRecord, NodeId};

/// Presentation variant chosen once per node from its structural role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    TableCell,
    ListItem,
    Block,
}

/// Where the annotation element goes relative to the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Appended as the node's last child
    Inside,
    /// Inserted as the node's next sibling
    After,
}

impl Presentation {
    pub fn for_tag(tag: &str) -> Self {
        match tag {
            "td" | "th" => Presentation::TableCell,
            "li" => Presentation::ListItem,
            _ => Presentation::Block,
        }
    }

    pub fn placement(&self) -> Placement {
        match self {
            Presentation::TableCell => Placement::Inside,
            Presentation::ListItem | Presentation::Block => Placement::After,
        }
    }

    /// Inline style for the annotation element
    pub fn style(&self) -> &'static str {
        match self {
            Presentation::TableCell => {
                "display: block; color: #666; font-size: 0.85em; margin-top: 0.3em; padding: 0.2em 0; \
                 border-top: 1px solid #e5e7eb; border-left: 2px solid #3b82f6; line-height: 1.4; \
                 white-space: normal; overflow-wrap: break-word; max-width: 100%;"
            }
            Presentation::ListItem => {
                "display: block; color: #666; font-size: 0.9em; margin-top: 0.25em; margin-left: 1.5em; \
                 padding-left: 0.5em; border-left: 2px solid #3b82f6; line-height: 1.5;"
            }
            Presentation::Block => {
                "display: block; color: #666; font-size: 0.9em; margin-top: 0.5em; margin-bottom: 0.5em; \
                 padding: 0.5em 0.75em; border-left: 3px solid #3b82f6; background-color: #f9fafb; \
                 line-height: 1.6;"
            }
        }
    }
}

/// Result of `apply`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted { annotation: NodeId, placement: Placement },
    /// The node was already processed; nothing changed
    AlreadyProcessed,
    /// The node is no longer reachable from the body; nothing changed
    Detached,
    /// The node was marked but had nowhere to attach the annotation
    NotInserted(DomError),
}

/// Annotate `node`, recording the inserted element in `record`
pub fn apply(doc: &mut Document, record: &mut MutationRecord, node: NodeId, annotation: &str) -> ApplyOutcome {
    if doc.has_attr(node, PROCESSED_ATTR) {
        return ApplyOutcome::AlreadyProcessed;
    }
    if !doc.is_attached(node) {
        return ApplyOutcome::Detached;
    }
    let Some(tag) = doc.tag(node) else {
        return ApplyOutcome::NotInserted(DomError::NotAnElement(node));
    };
    let presentation = Presentation::for_tag(tag);

    let original = doc.text_content(node);
    if let Err(e) = doc
        .set_attr(node, PROCESSED_ATTR, "true")
        .and_then(|_| doc.set_attr(node, ORIGINAL_TEXT_ATTR, original))
    {
        return ApplyOutcome::NotInserted(e);
    }

    let wrapper = doc.create_element("div");
    let text = doc.create_text(annotation);
    let built = doc
        .set_attr(wrapper, "class", ANNOTATION_CLASS)
        .and_then(|_| doc.set_attr(wrapper, "style", presentation.style()))
        .and_then(|_| doc.append_child(wrapper, text));
    if let Err(e) = built {
        return ApplyOutcome::NotInserted(e);
    }

    let placement = presentation.placement();
    let inserted = match placement {
        // A cell outside any row has no layout to protect
        Placement::Inside if doc.parent(node).is_none() => Err(DomError::Detached(node)),
        Placement::Inside => doc.append_child(node, wrapper),
        Placement::After => doc.insert_after(node, wrapper),
    };

    match inserted {
        Ok(()) => {
            record.added.push(wrapper);
            ApplyOutcome::Inserted {
                annotation: wrapper,
                placement,
            }
        }
        Err(e) => {
            tracing::warn!(node = %node, error = %e, "Failed to insert annotation");
            ApplyOutcome::NotInserted(e)
        }
    }
}

/// Remove every attached annotation element and every marker attribute.
/// Returns the number of annotation elements removed.
pub fn strip_annotations(doc: &mut Document, record: &mut MutationRecord) -> usize {
    let annotations = doc.elements_with_class(ANNOTATION_CLASS);
    for &node in &annotations {
        doc.detach(node);
        record.removed.push(node);
    }
    for marker in ALL_MARKERS {
        for node in doc.elements_with_attr(marker) {
            doc.remove_attr(node, marker);
        }
    }
    annotations.len()
}
