use serde::{Deserialize, Serialize};

use super::playback::TabMediaPlaybackState;

/// One artwork entry from the page's media session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaImage {
    pub src: String,
    /// Space-separated `WxH` list, as found in `MediaImage.sizes`.
    #[serde(default)]
    pub sizes: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl MediaImage {
    /// Largest `(width, height)` declared in `sizes`, if any parses.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.sizes
            .as_deref()?
            .split_whitespace()
            .filter_map(|size| {
                let lower = size.to_ascii_lowercase();
                let (w, h) = lower.split_once('x')?;
                Some((w.trim().parse::<u32>().ok()?, h.trim().parse::<u32>().ok()?))
            })
            .max_by_key(|(w, h)| u64::from(*w) * u64::from(*h))
    }
}

/// Owned copy of `navigator.mediaSession.metadata`.
///
/// The page may mutate its metadata object at any time, so the observer always
/// copies it field by field instead of keeping a reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub artwork: Vec<MediaImage>,
}

impl MediaMetadata {
    /// Strict field-by-field comparison, artwork order included.
    pub fn same_track(&self, other: &MediaMetadata) -> bool {
        self.title == other.title
            && self.artist == other.artist
            && self.album == other.album
            && self.artwork == other.artwork
    }
}

/// How a fused state differs from the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaChange {
    StartedPlaying,
    TrackChanged,
    PlaybackStateChanged,
    Nothing,
}

impl MediaChange {
    /// Whether this change is worth sending to the relay.
    pub fn is_reportable(self) -> bool {
        !matches!(self, Self::Nothing)
    }

    /// Whether this change starts a new track from the observer's point of view.
    pub fn is_new_track(self) -> bool {
        matches!(self, Self::StartedPlaying | Self::TrackChanged)
    }
}

/// Snapshot of what a tab is playing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabMediaState {
    pub metadata: MediaMetadata,
    pub playback: TabMediaPlaybackState,
}

impl TabMediaState {
    pub fn new(metadata: MediaMetadata, playback: TabMediaPlaybackState) -> Self {
        Self { metadata, playback }
    }

    /// Classify the transition from `previous` to `self` as seen at `now_ms`.
    pub fn determine_changes(&self, previous: Option<&TabMediaState>, now_ms: f64) -> MediaChange {
        let Some(previous) = previous else {
            return MediaChange::StartedPlaying;
        };
        if !self.metadata.same_track(&previous.metadata) {
            return MediaChange::TrackChanged;
        }
        if !self.playback.approx_eq(&previous.playback, now_ms) {
            return MediaChange::PlaybackStateChanged;
        }
        MediaChange::Nothing
    }
}
