//! The slice of a web page the observers read.
//!
//! Everything goes through [`Dom`] so the engine can run against a live page
//! through host bindings or against [`MemoryDom`] in tests and replays.

mod memory;

use mediatab_core::MediaMetadata;
use serde::{Deserialize, Serialize};
use url::Url;

pub use memory::MemoryDom;

/// Stable identity of a DOM node for the lifetime of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Live properties of an `<audio>` or `<video>` element, in seconds.
///
/// `duration` is `NaN` until metadata has loaded and `INFINITY` for live
/// streams, mirroring `HTMLMediaElement`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaProperties {
    pub current_time: f64,
    pub duration: f64,
    pub paused: bool,
    pub muted: bool,
}

impl Default for MediaProperties {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: f64::NAN,
            paused: true,
            muted: false,
        }
    }
}

/// `navigator.mediaSession.playbackState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPlaybackState {
    #[default]
    None,
    Paused,
    Playing,
}

/// Copy of `navigator.mediaSession` taken at read time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaSessionSnapshot {
    pub metadata: Option<MediaMetadata>,
    pub playback_state: SessionPlaybackState,
}

/// A native event fired on an element, e.g. `pause` on a `<video>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    pub target: NodeId,
    pub kind: String,
}

impl DomEvent {
    pub fn new(target: NodeId, kind: &str) -> Self {
        Self {
            target,
            kind: kind.to_string(),
        }
    }
}

/// One attribute mutation as delivered by a `MutationObserver`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub attribute_name: Option<String>,
}

impl MutationRecord {
    pub fn attribute(target: NodeId, name: &str) -> Self {
        Self {
            target,
            attribute_name: Some(name.to_string()),
        }
    }
}

pub trait Dom {
    /// Every element in document order, shadow trees included.
    fn elements(&self) -> Vec<NodeId>;

    /// Lowercase tag name.
    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Parent node. A shadow root's parent is its host.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Whether the node is attached to the document.
    fn contains(&self, node: NodeId) -> bool;

    /// Concatenated text of the node's light-tree descendants.
    fn text_content(&self, node: NodeId) -> String;

    /// Media properties, for `<audio>`/`<video>` nodes only.
    fn media_properties(&self, node: NodeId) -> Option<MediaProperties>;

    /// `document.URL`.
    fn page_url(&self) -> String;

    fn media_session(&self) -> MediaSessionSnapshot;

    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    fn is_tag(&self, node: NodeId, tag: &str) -> bool {
        self.tag_name(node).is_some_and(|t| t == tag)
    }

    /// Absolute URL of the first `<link>` whose `rel` includes `icon`.
    fn favicon_url(&self) -> Option<String> {
        let base = Url::parse(&self.page_url()).ok()?;
        self.elements()
            .into_iter()
            .filter(|node| self.is_tag(*node, "link"))
            .filter(|node| {
                self.attribute(*node, "rel").is_some_and(|rel| {
                    rel.split_whitespace()
                        .any(|token| token.eq_ignore_ascii_case("icon"))
                })
            })
            .find_map(|node| base.join(self.attribute(node, "href")?.trim()).ok())
            .map(|url| url.to_string())
    }
}
