use std::collections::BTreeMap;

use mediatab_core::MediaMetadata;

use super::{Dom, MediaProperties, MediaSessionSnapshot, NodeId, SessionPlaybackState};

const SHADOW_ROOT_TAG: &str = "#shadow-root";

#[derive(Debug, Clone, Default)]
struct Node {
    tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    shadow_root: Option<NodeId>,
    attributes: BTreeMap<String, String>,
    text: String,
    media: Option<MediaProperties>,
}

/// In-memory page: a node tree, a URL and a media session.
///
/// Created with `<html><head/><body/></html>`. Nodes created with
/// [`MemoryDom::create_element`] stay detached until appended.
#[derive(Debug, Clone)]
pub struct MemoryDom {
    nodes: Vec<Node>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    url: String,
    session: MediaSessionSnapshot,
}

impl MemoryDom {
    pub fn new(url: &str) -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            url: url.to_string(),
            session: MediaSessionSnapshot::default(),
        };
        dom.root = dom.create_element("html");
        dom.head = dom.append(dom.root, "head");
        dom.body = dom.append(dom.root, "body");
        dom
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    /// Create a detached element. `<audio>` and `<video>` get default media
    /// properties.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let tag = tag.to_ascii_lowercase();
        let media = matches!(tag.as_str(), "audio" | "video").then(MediaProperties::default);
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            tag,
            media,
            ..Node::default()
        });
        id
    }

    /// Create an element and append it to `parent`.
    pub fn append(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.create_element(tag);
        self.append_child(parent, id);
        id
    }

    /// Move `child` under `parent`, detaching it from any previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
    }

    /// Remove a node (and its subtree) from its parent.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.node(node).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|c| *c != node);
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = None;
        }
    }

    /// Attach a shadow root to `host` and return it. Reuses an existing root.
    pub fn attach_shadow(&mut self, host: NodeId) -> NodeId {
        if let Some(existing) = self.node(host).and_then(|n| n.shadow_root) {
            return existing;
        }
        let root = self.create_element(SHADOW_ROOT_TAG);
        if let Some(node) = self.node_mut(root) {
            node.parent = Some(host);
        }
        if let Some(node) = self.node_mut(host) {
            node.shadow_root = Some(root);
        }
        root
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.node_mut(node) {
            n.attributes
                .insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(n) = self.node_mut(node) {
            n.attributes.remove(&name.to_ascii_lowercase());
        }
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(n) = self.node_mut(node) {
            n.text = text.to_string();
        }
    }

    /// Mutable media properties of an `<audio>`/`<video>` node.
    pub fn media_mut(&mut self, node: NodeId) -> Option<&mut MediaProperties> {
        self.node_mut(node)?.media.as_mut()
    }

    pub fn set_session_metadata(&mut self, metadata: Option<MediaMetadata>) {
        self.session.metadata = metadata;
    }

    pub fn set_session_playback_state(&mut self, state: SessionPlaybackState) {
        self.session.playback_state = state;
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    fn collect_elements(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(id) else {
            return;
        };
        if node.tag != SHADOW_ROOT_TAG {
            out.push(id);
        }
        if let Some(shadow) = node.shadow_root {
            self.collect_elements(shadow, out);
        }
        for child in &node.children {
            self.collect_elements(*child, out);
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        out.push_str(&node.text);
        for child in &node.children {
            self.collect_text(*child, out);
        }
    }
}

impl Dom for MemoryDom {
    fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_elements(self.root, &mut out);
        out
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.node(node)
            .filter(|n| n.tag != SHADOW_ROOT_TAG)
            .map(|n| n.tag.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.node(node)?
            .attributes
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    fn contains(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn media_properties(&self, node: NodeId) -> Option<MediaProperties> {
        self.node(node)?.media
    }

    fn page_url(&self) -> String {
        self.url.clone()
    }

    fn media_session(&self) -> MediaSessionSnapshot {
        self.session.clone()
    }
}
