//! Resolves track/album/artist links for the current metadata.
//!
//! Single anchors are unreliable: ads and navigation can match a path shape
//! by accident. Candidates of different kinds that sit close together in the
//! tree are far more likely to describe the same item, so links are taken
//! from the structurally closest cross-kind pairs first.

use mediatab_core::{MediaMetadata, ResourceKind, ResourceLinks};
use regex::Regex;
use tracing::{debug, trace};
use url::Url;

use crate::dom::{Dom, NodeId};

/// Kind pairs compared for proximity, in tie-break order.
const KIND_PAIRS: [(ResourceKind, ResourceKind); 3] = [
    (ResourceKind::Artist, ResourceKind::Album),
    (ResourceKind::Album, ResourceKind::Track),
    (ResourceKind::Artist, ResourceKind::Track),
];

/// Per-site path shapes for each resource kind.
#[derive(Debug, Clone, Default)]
pub struct LinkPatterns {
    pub track: Option<Regex>,
    pub album: Option<Regex>,
    pub artist: Option<Regex>,
}

impl LinkPatterns {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.track.is_none() && self.album.is_none() && self.artist.is_none()
    }

    fn pattern(&self, kind: ResourceKind) -> Option<&Regex> {
        match kind {
            ResourceKind::Track => self.track.as_ref(),
            ResourceKind::Album => self.album.as_ref(),
            ResourceKind::Artist => self.artist.as_ref(),
        }
    }
}

#[derive(Debug, Clone)]
struct Anchor {
    node: NodeId,
    text: String,
    href: String,
    path: String,
}

/// Closeness of two nodes: distances to their lowest common ancestor as
/// `(shorter, longer - shorter)`. Smaller is closer.
type Closeness = (usize, usize);

#[derive(Debug, Clone)]
struct Pair<'a> {
    closeness: Closeness,
    first: (ResourceKind, &'a Anchor),
    second: (ResourceKind, &'a Anchor),
}

/// Find links for `metadata` among the page's anchors.
///
/// Returns an empty set when the site has no patterns or nothing matches.
pub fn resolve_resource_links(
    dom: &dyn Dom,
    patterns: &LinkPatterns,
    metadata: &MediaMetadata,
) -> ResourceLinks {
    if patterns.is_empty() {
        return ResourceLinks::new();
    }

    let anchors = collect_anchors(dom);
    let candidates = Candidates {
        track: find_candidates(ResourceKind::Track, &anchors, patterns, metadata),
        album: find_candidates(ResourceKind::Album, &anchors, patterns, metadata),
        artist: find_candidates(ResourceKind::Artist, &anchors, patterns, metadata),
    };
    if candidates.is_empty() {
        trace!(anchors = anchors.len(), "No resource link candidates");
        return ResourceLinks::new();
    }

    let mut pairs = Vec::new();
    for (a, b) in KIND_PAIRS {
        let (first, second) = if candidates.of(b).len() > candidates.of(a).len() {
            (b, a)
        } else {
            (a, b)
        };
        pairs.extend(closest_pairs(
            dom,
            (first, candidates.of(first)),
            (second, candidates.of(second)),
        ));
    }
    pairs.sort_by_key(|pair| pair.closeness);

    let mut links = ResourceLinks::new();
    for pair in &pairs {
        for (kind, anchor) in [pair.first, pair.second] {
            links.insert_if_absent(kind, &anchor.text, &anchor.href);
        }
    }

    for kind in ResourceKind::ALL {
        if links.has(kind) {
            continue;
        }
        let truths: Vec<String> = metadata_texts(kind, metadata)
            .into_iter()
            .map(str::to_lowercase)
            .collect();
        let fallback = candidates.of(kind).iter().find(|anchor| {
            let text = anchor.text.to_lowercase();
            truths.iter().any(|truth| truth.contains(&text))
        });
        if let Some(anchor) = fallback {
            links.insert_if_absent(kind, &anchor.text, &anchor.href);
        }
    }

    debug!(
        pairs = pairs.len(),
        track = links.has(ResourceKind::Track),
        album = links.has(ResourceKind::Album),
        artist = links.has(ResourceKind::Artist),
        "Resolved resource links"
    );
    links
}

fn collect_anchors(dom: &dyn Dom) -> Vec<Anchor> {
    let Ok(base) = Url::parse(&dom.page_url()) else {
        trace!(url = %dom.page_url(), "Page URL does not parse, skipping links");
        return Vec::new();
    };
    dom.elements()
        .into_iter()
        .filter(|node| dom.is_tag(*node, "a"))
        .filter_map(|node| {
            let href = dom.attribute(node, "href")?;
            let resolved = base.join(href.trim()).ok()?;
            Some(Anchor {
                node,
                text: dom.text_content(node).trim().to_string(),
                path: resolved.path().to_string(),
                href: resolved.into(),
            })
        })
        .filter(|anchor| !anchor.text.is_empty())
        .collect()
}

struct Candidates<'a> {
    track: Vec<&'a Anchor>,
    album: Vec<&'a Anchor>,
    artist: Vec<&'a Anchor>,
}

impl<'a> Candidates<'a> {
    fn of(&self, kind: ResourceKind) -> &[&'a Anchor] {
        match kind {
            ResourceKind::Track => &self.track,
            ResourceKind::Album => &self.album,
            ResourceKind::Artist => &self.artist,
        }
    }

    fn is_empty(&self) -> bool {
        self.track.is_empty() && self.album.is_empty() && self.artist.is_empty()
    }
}

fn find_candidates<'a>(
    kind: ResourceKind,
    anchors: &'a [Anchor],
    patterns: &LinkPatterns,
    metadata: &MediaMetadata,
) -> Vec<&'a Anchor> {
    let Some(pattern) = patterns.pattern(kind) else {
        return Vec::new();
    };
    let shaped: Vec<&'a Anchor> = anchors
        .iter()
        .filter(|anchor| pattern.is_match(&anchor.path))
        .collect();
    match_text(kind, &shaped, metadata)
}

/// The metadata texts a kind may legitimately link. Album links can also
/// carry the title.
fn metadata_texts(kind: ResourceKind, metadata: &MediaMetadata) -> Vec<&str> {
    let texts = match kind {
        ResourceKind::Track => vec![metadata.title.as_str()],
        ResourceKind::Album => vec![metadata.album.as_str(), metadata.title.as_str()],
        ResourceKind::Artist => vec![metadata.artist.as_str()],
    };
    texts
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

fn match_text<'a>(
    kind: ResourceKind,
    anchors: &[&'a Anchor],
    metadata: &MediaMetadata,
) -> Vec<&'a Anchor> {
    let exact = |text: &str| -> Vec<&'a Anchor> {
        anchors.iter().copied().filter(|a| a.text == text).collect()
    };
    let title = metadata.title.trim();

    match kind {
        ResourceKind::Track if !title.is_empty() => exact(title),
        ResourceKind::Album => {
            let album = metadata.album.trim();
            let mut found = if album.is_empty() { Vec::new() } else { exact(album) };
            if found.is_empty() && !title.is_empty() {
                found = exact(title);
            }
            if found.is_empty() && !album.is_empty() {
                found = anchors
                    .iter()
                    .copied()
                    .filter(|a| a.text.to_lowercase() == album.to_lowercase())
                    .collect();
            }
            found
        }
        ResourceKind::Artist => {
            let artist = metadata.artist.trim();
            if artist.is_empty() {
                return Vec::new();
            }
            anchors
                .iter()
                .copied()
                .filter(|a| artist.contains(a.text.as_str()) || a.text.contains(artist))
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Every pair with the best closeness between the two candidate sets.
fn closest_pairs<'a>(
    dom: &dyn Dom,
    (first_kind, first): (ResourceKind, &[&'a Anchor]),
    (second_kind, second): (ResourceKind, &[&'a Anchor]),
) -> Vec<Pair<'a>> {
    let mut best: Vec<Pair<'a>> = Vec::new();
    for a in first {
        for b in second {
            if a.node == b.node {
                continue;
            }
            let Some(closeness) = closeness(dom, a.node, b.node) else {
                continue;
            };
            let pair = Pair {
                closeness,
                first: (first_kind, *a),
                second: (second_kind, *b),
            };
            match best.first().map(|p| p.closeness) {
                Some(current) if closeness > current => {}
                Some(current) if closeness == current => best.push(pair),
                _ => best = vec![pair],
            }
        }
    }
    best
}

fn closeness(dom: &dyn Dom, a: NodeId, b: NodeId) -> Option<Closeness> {
    let path_a = ancestors(dom, a);
    let mut depth_b = 0;
    let mut current = Some(b);
    while let Some(node) = current {
        if let Some(depth_a) = path_a.iter().position(|n| *n == node) {
            let shorter = depth_a.min(depth_b);
            return Some((shorter, depth_a.max(depth_b) - shorter));
        }
        depth_b += 1;
        current = dom.parent(node);
    }
    None
}

/// The node followed by each of its ancestors up to the root.
fn ancestors(dom: &dyn Dom, node: NodeId) -> Vec<NodeId> {
    let mut path = vec![node];
    let mut current = node;
    while let Some(parent) = dom.parent(current) {
        path.push(parent);
        current = parent;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;

    fn patterns() -> LinkPatterns {
        LinkPatterns {
            track: Some(Regex::new("/track/").unwrap()),
            album: Some(Regex::new("/album/").unwrap()),
            artist: Some(Regex::new("/artist/").unwrap()),
        }
    }

    fn metadata(title: &str, artist: Option<&str>, album: Option<&str>) -> MediaMetadata {
        MediaMetadata {
            title: title.into(),
            artist: artist.unwrap_or_default().into(),
            album: album.unwrap_or_default().into(),
            artwork: Vec::new(),
        }
    }

    fn link(dom: &mut MemoryDom, parent: NodeId, href: &str, text: &str) -> NodeId {
        let anchor = dom.append(parent, "a");
        dom.set_attribute(anchor, "href", href);
        dom.set_text(anchor, text);
        anchor
    }

    #[test]
    fn test_sibling_pair_beats_distant_duplicate() {
        let mut dom = MemoryDom::new("https://music.example.com/player");
        let far = dom.append(dom.body(), "div");
        let deeper = dom.append(far, "div");
        let deepest = dom.append(deeper, "div");
        link(&mut dom, deepest, "/track/999", "Bohemian Rhapsody");

        let container = dom.append(dom.body(), "footer");
        link(&mut dom, container, "/track/123", "Bohemian Rhapsody");
        link(&mut dom, container, "/artist/55", "Queen");

        let links = resolve_resource_links(
            &dom,
            &patterns(),
            &metadata("Bohemian Rhapsody", Some("Queen"), None),
        );
        assert_eq!(
            links.url(ResourceKind::Track, "Bohemian Rhapsody"),
            Some("https://music.example.com/track/123")
        );
        assert_eq!(
            links.url(ResourceKind::Artist, "Queen"),
            Some("https://music.example.com/artist/55")
        );
    }

    #[test]
    fn test_no_patterns_returns_empty() {
        let mut dom = MemoryDom::new("https://example.com/");
        let body = dom.body();
        link(&mut dom, body, "/track/1", "Song");
        let links = resolve_resource_links(&dom, &LinkPatterns::empty(), &metadata("Song", None, None));
        assert!(links.is_empty());
    }

    #[test]
    fn test_nothing_matching_returns_empty() {
        let mut dom = MemoryDom::new("https://example.com/");
        let body = dom.body();
        link(&mut dom, body, "/track/1", "Another Song");
        link(&mut dom, body, "/about", "Song");
        let links = resolve_resource_links(&dom, &patterns(), &metadata("Song", Some("Band"), None));
        assert!(links.is_empty());
    }

    #[test]
    fn test_artist_matched_by_containment_per_name() {
        let mut dom = MemoryDom::new("https://example.com/");
        let row = dom.append(dom.body(), "div");
        link(&mut dom, row, "/track/7", "Under Pressure");
        link(&mut dom, row, "/artist/1", "Queen");
        link(&mut dom, row, "/artist/2", "David Bowie");

        let links = resolve_resource_links(
            &dom,
            &patterns(),
            &metadata("Under Pressure", Some("Queen & David Bowie"), None),
        );
        let artists = links.entries(ResourceKind::Artist);
        assert_eq!(artists.len(), 2);
        assert_eq!(artists["David Bowie"], "https://example.com/artist/2");
    }

    #[test]
    fn test_album_falls_back_to_title_then_case_insensitive() {
        let mut dom = MemoryDom::new("https://example.com/");
        let body = dom.body();
        link(&mut dom, body, "/album/1", "Single Title");
        let links = resolve_resource_links(
            &dom,
            &patterns(),
            &metadata("Single Title", None, Some("Unlinked Album")),
        );
        assert!(links.has(ResourceKind::Album));

        let mut dom = MemoryDom::new("https://example.com/");
        let body = dom.body();
        link(&mut dom, body, "/album/2", "A NIGHT AT THE OPERA");
        let links = resolve_resource_links(
            &dom,
            &patterns(),
            &metadata("Love of My Life", None, Some("A Night at the Opera")),
        );
        assert_eq!(
            links.url(ResourceKind::Album, "A NIGHT AT THE OPERA"),
            Some("https://example.com/album/2")
        );
    }

    #[test]
    fn test_single_kind_uses_fallback_entry() {
        let mut dom = MemoryDom::new("https://example.com/");
        let body = dom.body();
        link(&mut dom, body, "https://example.com/track/5#x", "Song");
        let links = resolve_resource_links(&dom, &patterns(), &metadata("Song", None, None));
        assert_eq!(
            links.url(ResourceKind::Track, "Song"),
            Some("https://example.com/track/5#x")
        );
    }

    #[test]
    fn test_anchors_inside_shadow_roots_are_found() {
        let mut dom = MemoryDom::new("https://example.com/");
        let host = dom.append(dom.body(), "now-playing");
        let shadow = dom.attach_shadow(host);
        link(&mut dom, shadow, "/track/5", "Song");
        link(&mut dom, shadow, "/artist/9", "Band");

        let links = resolve_resource_links(&dom, &patterns(), &metadata("Song", Some("Band"), None));
        assert!(links.has(ResourceKind::Track));
        assert!(links.has(ResourceKind::Artist));
    }

    #[test]
    fn test_closeness_prefers_balanced_pairs() {
        let mut dom = MemoryDom::new("https://example.com/");
        let row = dom.append(dom.body(), "div");
        let a = dom.append(row, "span");
        let b = dom.append(row, "span");
        let nested = dom.append(b, "span");
        assert_eq!(closeness(&dom, a, b), Some((1, 0)));
        assert_eq!(closeness(&dom, a, nested), Some((1, 1)));
        assert_eq!(closeness(&dom, row, nested), Some((0, 2)));
    }
}
