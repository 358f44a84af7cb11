//! Record sent from the tab to the relay.
//!
//! Internally everything is milliseconds; on the wire `position` and
//! `duration` are seconds carrying millisecond precision.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::MediaTabError;
use crate::models::{
    MediaImage, MediaMetadata, PlaybackSource, PlaybackState, ResourceKind, ResourceLinks,
    TabMediaPlaybackState, TabMediaState,
};

/// Which page an update came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSource {
    /// Host with its labels reversed, e.g. `com.spotify.open`.
    pub reverse_domain: String,
    pub site_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
}

impl UpdateSource {
    pub fn new(host: &str, site_url: &str, favicon_url: Option<String>) -> Self {
        Self {
            reverse_domain: reverse_domain(host),
            site_url: site_url.to_string(),
            favicon_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePlaybackState {
    /// Seconds.
    pub position: f64,
    /// Wall-clock milliseconds at which `position` was valid.
    pub position_timestamp: f64,
    pub playing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResourceLinks {
    #[serde(default)]
    pub track_url: BTreeMap<String, String>,
    #[serde(default)]
    pub album_url: BTreeMap<String, String>,
    #[serde(default)]
    pub artist_url: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// A media update as the relay receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUpdate {
    pub source: UpdateSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<WireMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_state: Option<WirePlaybackState>,
    #[serde(default)]
    pub resource_links: WireResourceLinks,
    #[serde(default)]
    pub images: Vec<WireImage>,
}

impl MediaUpdate {
    pub fn from_state(state: &TabMediaState, source: UpdateSource, links: &ResourceLinks) -> Self {
        let metadata = &state.metadata;
        let playback = &state.playback.state;

        Self {
            source,
            metadata: Some(WireMetadata {
                title: metadata.title.clone(),
                artist: non_empty(&metadata.artist),
                album: non_empty(&metadata.album),
                duration: playback.duration_ms().map(ms_to_seconds),
            }),
            playback_state: Some(WirePlaybackState {
                position: ms_to_seconds(playback.position_ms()),
                position_timestamp: playback.position_timestamp_ms().round(),
                playing: playback.is_playing(),
            }),
            resource_links: WireResourceLinks {
                track_url: links.entries(ResourceKind::Track),
                album_url: links.entries(ResourceKind::Album),
                artist_url: links.entries(ResourceKind::Artist),
            },
            images: metadata
                .artwork
                .iter()
                .map(|image| {
                    let dimensions = image.dimensions();
                    WireImage {
                        url: image.src.clone(),
                        mime_type: image.mime_type.clone(),
                        width: dimensions.map(|(w, _)| w),
                        height: dimensions.map(|(_, h)| h),
                    }
                })
                .collect(),
        }
    }

    /// Rebuild a state from the wire record.
    ///
    /// The wire form does not carry the position source, so the result is
    /// tagged [`PlaybackSource::Estimated`].
    pub fn to_tab_state(&self) -> Option<TabMediaState> {
        let metadata = self.metadata.as_ref()?;
        let playback = self.playback_state.as_ref()?;

        let artwork = self
            .images
            .iter()
            .map(|image| MediaImage {
                src: image.url.clone(),
                sizes: image.width.zip(image.height).map(|(w, h)| format!("{w}x{h}")),
                mime_type: image.mime_type.clone(),
            })
            .collect();

        Some(TabMediaState::new(
            MediaMetadata {
                title: metadata.title.clone(),
                artist: metadata.artist.clone().unwrap_or_default(),
                album: metadata.album.clone().unwrap_or_default(),
                artwork,
            },
            TabMediaPlaybackState::new(
                PlaybackState::new(
                    seconds_to_ms(playback.position),
                    playback.position_timestamp,
                    metadata.duration.map(seconds_to_ms),
                    playback.playing,
                ),
                PlaybackSource::Estimated,
            ),
        ))
    }

    pub fn to_json(&self) -> Result<String, MediaTabError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, MediaTabError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Reverse the labels of a host name: `music.example.com` → `com.example.music`.
pub fn reverse_domain(host: &str) -> String {
    host.trim_end_matches('.')
        .split('.')
        .filter(|label| !label.is_empty())
        .rev()
        .collect::<Vec<_>>()
        .join(".")
}

/// Milliseconds to seconds, keeping millisecond precision.
pub fn ms_to_seconds(ms: f64) -> f64 {
    ms.round() / 1000.0
}

pub fn seconds_to_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round()
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> TabMediaState {
        TabMediaState::new(
            MediaMetadata {
                title: "Bohemian Rhapsody".into(),
                artist: "Queen".into(),
                album: "A Night at the Opera".into(),
                artwork: vec![MediaImage {
                    src: "https://example.com/cover.jpg".into(),
                    sizes: Some("640x640".into()),
                    mime_type: Some("image/jpeg".into()),
                }],
            },
            TabMediaPlaybackState::new(
                PlaybackState::new(61_234.4, 1_700_000_000_000.0, Some(354_321.0), true),
                PlaybackSource::MediaElement,
            ),
        )
    }

    fn sample_source() -> UpdateSource {
        UpdateSource::new(
            "open.spotify.com",
            "https://open.spotify.com/album/1",
            Some("https://open.spotify.com/favicon.ico".into()),
        )
    }

    #[test]
    fn test_reverse_domain() {
        assert_eq!(reverse_domain("music.example.com"), "com.example.music");
        assert_eq!(reverse_domain("localhost"), "localhost");
        assert_eq!(reverse_domain("example.com."), "com.example");
    }

    #[test]
    fn test_positions_are_seconds_on_the_wire() {
        let update = MediaUpdate::from_state(&sample_state(), sample_source(), &ResourceLinks::new());
        let playback = update.playback_state.as_ref().unwrap();
        assert_eq!(playback.position, 61.234);
        assert!(playback.playing);
        assert_eq!(update.metadata.as_ref().unwrap().duration, Some(354.321));
        assert_eq!(update.images[0].width, Some(640));
        assert_eq!(update.source.reverse_domain, "com.spotify.open");
    }

    #[test]
    fn test_json_field_names() {
        let mut links = ResourceLinks::new();
        links.insert_if_absent(ResourceKind::Artist, "Queen", "https://open.spotify.com/artist/1");
        let update = MediaUpdate::from_state(&sample_state(), sample_source(), &links);
        let json = update.to_json().unwrap();

        assert!(json.contains("\"reverseDomain\":\"com.spotify.open\""));
        assert!(json.contains("\"playbackState\""));
        assert!(json.contains("\"positionTimestamp\""));
        assert!(json.contains("\"artistUrl\":{\"Queen\":\"https://open.spotify.com/artist/1\"}"));
        assert!(json.contains("\"mimeType\":\"image/jpeg\""));
    }

    #[test]
    fn test_roundtrip_through_json() {
        let state = sample_state();
        let update = MediaUpdate::from_state(&state, sample_source(), &ResourceLinks::new());
        let decoded = MediaUpdate::from_json(&update.to_json().unwrap()).unwrap();
        let restored = decoded.to_tab_state().unwrap();

        assert_eq!(restored.metadata.title, state.metadata.title);
        assert_eq!(restored.metadata.artist, state.metadata.artist);
        assert_eq!(restored.metadata.album, state.metadata.album);
        assert_eq!(restored.playback.state.is_playing(), state.playback.state.is_playing());
        let drift = (restored.playback.state.position_ms() - state.playback.state.position_ms()).abs();
        assert!(drift <= 1.0, "position drifted by {drift}ms");
    }

    #[test]
    fn test_empty_artist_and_album_are_omitted() {
        let mut state = sample_state();
        state.metadata.artist.clear();
        state.metadata.album.clear();
        let update = MediaUpdate::from_state(&state, sample_source(), &ResourceLinks::new());
        let json = update.to_json().unwrap();
        assert!(!json.contains("\"artist\""));
        assert!(!json.contains("\"album\""));

        let restored = update.to_tab_state().unwrap();
        assert!(restored.metadata.artist.is_empty());
    }

    #[test]
    fn test_missing_metadata_has_no_state() {
        let update = MediaUpdate {
            source: sample_source(),
            metadata: None,
            playback_state: None,
            resource_links: WireResourceLinks::default(),
            images: vec![],
        };
        assert!(update.to_tab_state().is_none());
    }
}
