//! Candidate element discovery.

use std::collections::HashSet;
use std::fmt;

use mediatab_core::config::MediaSelection;

use crate::dom::{Dom, MediaProperties, NodeId};
use crate::progress::{Precision, ProgressElement, ProgressKind};

/// Roles accepted for ARIA progress widgets.
const PROGRESS_ROLES: &[&str] = &["progressbar", "slider"];

/// An element a source can report. Identity is the wrapped node.
pub trait SourceElement: Clone + fmt::Debug {
    fn node(&self) -> NodeId;
}

/// Something that can list the current candidates of one element kind.
///
/// Each call returns a fresh snapshot; wrappers must not be assumed to
/// outlive it.
pub trait ElementSource {
    type Element: SourceElement;

    fn get(&self, dom: &dyn Dom) -> Vec<Self::Element>;
}

/// Whether two snapshots hold the same nodes in the same order.
pub fn same_elements<E: SourceElement>(a: &[E], b: &[E]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.node() == y.node())
}

/// An `<audio>` or `<video>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaElement {
    node: NodeId,
}

impl MediaElement {
    pub fn new(node: NodeId) -> Self {
        Self { node }
    }

    pub fn properties(&self, dom: &dyn Dom) -> Option<MediaProperties> {
        dom.media_properties(self.node)
    }

    /// Loaded means a known, positive duration.
    pub fn is_loaded(&self, dom: &dyn Dom) -> bool {
        self.properties(dom)
            .is_some_and(|p| !p.duration.is_nan() && p.duration > 0.0)
    }

    pub fn is_audible(&self, dom: &dyn Dom) -> bool {
        self.properties(dom).is_some_and(|p| !p.paused && !p.muted)
    }
}

impl SourceElement for MediaElement {
    fn node(&self) -> NodeId {
        self.node
    }
}

impl SourceElement for ProgressElement {
    fn node(&self) -> NodeId {
        ProgressElement::node(self)
    }
}

/// Loaded `<audio>`/`<video>` elements in the tree, plus any registered
/// proactively because they were never attached to it.
#[derive(Debug, Clone)]
pub struct MediaElementSource {
    selection: MediaSelection,
    registered: Vec<NodeId>,
}

impl MediaElementSource {
    pub fn new(selection: MediaSelection) -> Self {
        Self {
            selection,
            registered: Vec::new(),
        }
    }

    /// Make an element discoverable even though tree queries cannot see it.
    pub fn register(&mut self, node: NodeId) {
        if !self.registered.contains(&node) {
            self.registered.push(node);
        }
    }

    pub fn is_registered(&self, node: NodeId) -> bool {
        self.registered.contains(&node)
    }

    pub fn selection(&self) -> MediaSelection {
        self.selection
    }
}

impl ElementSource for MediaElementSource {
    type Element = MediaElement;

    fn get(&self, dom: &dyn Dom) -> Vec<MediaElement> {
        let mut seen = HashSet::new();
        let candidates = dom
            .elements()
            .into_iter()
            .filter(|node| dom.is_tag(*node, "audio") || dom.is_tag(*node, "video"))
            .chain(self.registered.iter().copied())
            .filter(|node| seen.insert(*node))
            .map(MediaElement::new)
            .filter(|media| media.is_loaded(dom));

        match self.selection {
            MediaSelection::All => candidates.collect(),
            MediaSelection::FirstAudible => candidates
                .filter(|media| media.is_audible(dom))
                .take(1)
                .collect(),
        }
    }
}

/// Range inputs and ARIA progress widgets carrying all three value
/// attributes.
#[derive(Debug, Clone, Default)]
pub struct ProgressElementSource;

impl ProgressElementSource {
    fn kind_of(dom: &dyn Dom, node: NodeId) -> Option<ProgressKind> {
        let is_range = dom.is_tag(node, "input")
            && dom
                .attribute(node, "type")
                .is_some_and(|t| t.trim().eq_ignore_ascii_case("range"));
        let kind = if is_range {
            ProgressKind::RangeInput
        } else if dom
            .attribute(node, "role")
            .is_some_and(|role| PROGRESS_ROLES.contains(&role.trim().to_ascii_lowercase().as_str()))
        {
            ProgressKind::Aria
        } else {
            return None;
        };

        kind.attributes()
            .iter()
            .all(|attribute| dom.has_attribute(node, attribute))
            .then_some(kind)
    }
}

impl ElementSource for ProgressElementSource {
    type Element = ProgressElement;

    fn get(&self, dom: &dyn Dom) -> Vec<ProgressElement> {
        let mut seen = HashSet::new();
        dom.elements()
            .into_iter()
            .filter_map(|node| Some((node, Self::kind_of(dom, node)?)))
            .filter(|(node, _)| seen.insert(*node))
            .map(|(node, kind)| {
                let mut element = ProgressElement::new(node, kind);
                element.set_target_precision(Precision::Milliseconds);
                element
            })
            .collect()
    }
}
