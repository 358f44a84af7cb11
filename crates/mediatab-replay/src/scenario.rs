//! Scenario files: a static page plus a timeline of changes.
//!
//! ```toml
//! url = "https://open.spotify.com/"
//! end = 9000.0
//!
//! [[node]]
//! id = "seek"
//! tag = "div"
//! parent = "footer"
//! attributes = { role = "slider", aria-valuenow = "0" }
//!
//! [[step]]
//! at = 0.0
//! action = "begin"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use mediatab_core::{MediaMetadata, MediaTabError};
use mediatab_detect::{MemoryDom, NodeId, SessionPlaybackState};
use serde::Deserialize;

/// Parent name for nodes created without being attached.
const DETACHED: &str = "detached";

/// Prefix of parent names that point into a host's shadow root.
const SHADOW_PREFIX: &str = "shadow:";

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub url: String,
    /// Timers are advanced up to this time after the last step.
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeSpec>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    pub tag: String,
    /// `body` (default), `head`, `detached`, another node id, or
    /// `shadow:<id>` for that node's shadow root.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Initial properties of an `<audio>`/`<video>` node, in seconds.
    #[serde(default)]
    pub media: Option<MediaOverride>,
}

/// Media property overrides. Unset fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaOverride {
    pub current_time: Option<f64>,
    pub duration: Option<f64>,
    pub paused: Option<bool>,
    pub muted: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// Wall-clock milliseconds.
    pub at: f64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// The relay asks the tab to start (or restart) observing.
    Begin,
    /// The relay asks the tab to stop observing.
    Stop,
    /// `navigator.mediaSession` changed.
    Session {
        #[serde(default)]
        metadata: Option<MediaMetadata>,
        #[serde(default)]
        playback_state: Option<SessionPlaybackState>,
        /// Clear the session metadata.
        #[serde(default)]
        clear: bool,
    },
    /// An attribute changed, delivered as one mutation record.
    SetAttribute {
        node: String,
        name: String,
        value: String,
    },
    /// Media properties changed, optionally firing a native event.
    Media {
        node: String,
        #[serde(flatten)]
        change: MediaOverride,
        #[serde(default)]
        event: Option<String>,
    },
    Remove {
        node: String,
    },
    Append {
        node: String,
        #[serde(default)]
        parent: Option<String>,
    },
    /// A media element created outside the tree announces itself.
    Register {
        node: String,
    },
}

/// The page built from a scenario, with its named nodes.
#[derive(Debug, Clone)]
pub struct Page {
    pub dom: MemoryDom,
    nodes: HashMap<String, NodeId>,
}

impl Page {
    pub fn node(&self, id: &str) -> Result<NodeId, MediaTabError> {
        self.nodes
            .get(id)
            .copied()
            .ok_or_else(|| MediaTabError::Config(format!("unknown node `{id}`")))
    }

    /// Resolve a parent name. `None` means the node stays detached.
    pub fn parent(&mut self, name: Option<&str>) -> Result<Option<NodeId>, MediaTabError> {
        let parent = match name.unwrap_or("body") {
            "body" => self.dom.body(),
            "head" => self.dom.head(),
            DETACHED => return Ok(None),
            other => match other.strip_prefix(SHADOW_PREFIX) {
                Some(host) => {
                    let host = self.node(host)?;
                    self.dom.attach_shadow(host)
                }
                None => self.node(other)?,
            },
        };
        Ok(Some(parent))
    }

    /// Apply media overrides to a media node.
    pub fn update_media(&mut self, id: &str, change: &MediaOverride) -> Result<NodeId, MediaTabError> {
        let node = self.node(id)?;
        let props = self
            .dom
            .media_mut(node)
            .ok_or_else(|| MediaTabError::Config(format!("node `{id}` is not a media element")))?;
        if let Some(current_time) = change.current_time {
            props.current_time = current_time;
        }
        if let Some(duration) = change.duration {
            props.duration = duration;
        }
        if let Some(paused) = change.paused {
            props.paused = paused;
        }
        if let Some(muted) = change.muted {
            props.muted = muted;
        }
        Ok(node)
    }
}

impl Scenario {
    pub fn from_toml(toml_str: &str) -> Result<Self, MediaTabError> {
        toml::from_str(toml_str).map_err(|e| MediaTabError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, MediaTabError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Build the initial page. Nodes are created in file order, so a parent
    /// must be declared before its children.
    pub fn build_page(&self) -> Result<Page, MediaTabError> {
        let mut page = Page {
            dom: MemoryDom::new(&self.url),
            nodes: HashMap::new(),
        };
        for spec in &self.nodes {
            if page.nodes.contains_key(&spec.id) {
                return Err(MediaTabError::Config(format!("duplicate node `{}`", spec.id)));
            }
            let node = page.dom.create_element(&spec.tag);
            if let Some(parent) = page.parent(spec.parent.as_deref())? {
                page.dom.append_child(parent, node);
            }
            for (name, value) in &spec.attributes {
                page.dom.set_attribute(node, name, value);
            }
            if let Some(text) = &spec.text {
                page.dom.set_text(node, text);
            }
            page.nodes.insert(spec.id.clone(), node);
            if let Some(media) = &spec.media {
                page.update_media(&spec.id, media)?;
            }
        }
        Ok(page)
    }

    /// Steps ordered by time. Steps sharing a time keep file order.
    pub fn timeline(&self) -> Vec<Step> {
        let mut steps = self.steps.clone();
        steps.sort_by(|a, b| a.at.total_cmp(&b.at));
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediatab_detect::Dom;

    const PAGE: &str = r#"
url = "https://example.com/"

[[node]]
id = "player"
tag = "now-playing"

[[node]]
id = "title"
tag = "a"
parent = "shadow:player"
text = "Song"
attributes = { href = "/track/1" }

[[node]]
id = "audio"
tag = "audio"
parent = "detached"
media = { duration = 120.0, paused = false }

[[step]]
at = 500.0
action = "set_attribute"
node = "title"
name = "href"
value = "/track/2"

[[step]]
at = 0.0
action = "session"
playback_state = "playing"
metadata = { title = "Song", artist = "Band" }

[[step]]
at = 0.0
action = "begin"
"#;

    #[test]
    fn test_build_page_places_nodes() {
        let scenario = Scenario::from_toml(PAGE).unwrap();
        let page = scenario.build_page().unwrap();

        let title = page.node("title").unwrap();
        assert!(page.dom.contains(title));
        assert_eq!(page.dom.text_content(title), "Song");
        assert_eq!(page.dom.attribute(title, "href").as_deref(), Some("/track/1"));

        let audio = page.node("audio").unwrap();
        assert!(!page.dom.contains(audio));
        let props = page.dom.media_properties(audio).unwrap();
        assert_eq!(props.duration, 120.0);
        assert!(!props.paused);
    }

    #[test]
    fn test_timeline_is_sorted_and_stable() {
        let scenario = Scenario::from_toml(PAGE).unwrap();
        let timeline = scenario.timeline();
        assert!(matches!(timeline[0].action, Action::Session { .. }));
        assert!(matches!(timeline[1].action, Action::Begin));
        assert!(matches!(timeline[2].action, Action::SetAttribute { .. }));
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let scenario = Scenario::from_toml(
            r#"
url = "https://example.com/"

[[node]]
id = "orphan"
tag = "div"
parent = "missing"
"#,
        )
        .unwrap();
        assert!(matches!(scenario.build_page(), Err(MediaTabError::Config(_))));
    }

    #[test]
    fn test_media_change_on_plain_element_is_rejected() {
        let scenario = Scenario::from_toml(
            r#"
url = "https://example.com/"

[[node]]
id = "box"
tag = "div"
media = { paused = false }
"#,
        )
        .unwrap();
        assert!(matches!(scenario.build_page(), Err(MediaTabError::Config(_))));
    }
}
