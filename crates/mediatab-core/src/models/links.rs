use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The kind of page a resource link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Track,
    Album,
    Artist,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [Self::Track, Self::Album, Self::Artist];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Artist => "artist",
        }
    }
}

/// Links found on the page, keyed by kind and then by the matched link text.
///
/// An artist field such as "Queen & David Bowie" can resolve to one link per
/// artist name, so each kind maps text to URL rather than holding one URL.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceLinks {
    links: BTreeMap<ResourceKind, BTreeMap<String, String>>,
}

impl ResourceLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a link unless this text already has one for `kind`.
    /// Returns whether the link was added.
    pub fn insert_if_absent(&mut self, kind: ResourceKind, text: &str, url: &str) -> bool {
        let entries = self.links.entry(kind).or_default();
        if entries.contains_key(text) {
            return false;
        }
        entries.insert(text.to_string(), url.to_string());
        true
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&BTreeMap<String, String>> {
        self.links.get(&kind).filter(|entries| !entries.is_empty())
    }

    pub fn has(&self, kind: ResourceKind) -> bool {
        self.get(kind).is_some()
    }

    /// URL linked for `text`, if any.
    pub fn url(&self, kind: ResourceKind, text: &str) -> Option<&str> {
        self.get(kind)?.get(text).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.links.values().all(BTreeMap::is_empty)
    }

    /// Owned copy of one kind's entries, empty when nothing matched.
    pub fn entries(&self, kind: ResourceKind) -> BTreeMap<String, String> {
        self.get(kind).cloned().unwrap_or_default()
    }
}
