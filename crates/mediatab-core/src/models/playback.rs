use serde::{Deserialize, Serialize};

/// Playback position at a point in wall-clock time.
///
/// All values are milliseconds. `duration_ms` is either absent or strictly
/// positive and `position_timestamp_ms` is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    position_ms: f64,
    position_timestamp_ms: f64,
    duration_ms: Option<f64>,
    playing: bool,
}

impl PlaybackState {
    /// Build a state, dropping values that cannot describe real playback:
    /// a non-finite or non-positive duration becomes unknown, and the
    /// timestamp is clamped at zero.
    pub fn new(
        position_ms: f64,
        position_timestamp_ms: f64,
        duration_ms: Option<f64>,
        playing: bool,
    ) -> Self {
        let duration_ms = duration_ms.filter(|d| d.is_finite() && *d > 0.0);
        let position_ms = if position_ms.is_finite() {
            position_ms.max(0.0)
        } else {
            0.0
        };
        let position_timestamp_ms = if position_timestamp_ms.is_finite() {
            position_timestamp_ms.max(0.0)
        } else {
            0.0
        };
        Self {
            position_ms,
            position_timestamp_ms,
            duration_ms,
            playing,
        }
    }

    pub fn position_ms(&self) -> f64 {
        self.position_ms
    }

    pub fn position_timestamp_ms(&self) -> f64 {
        self.position_timestamp_ms
    }

    pub fn duration_ms(&self) -> Option<f64> {
        self.duration_ms
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Position extrapolated to `now_ms`.
    ///
    /// A paused state always reports its stored position. A playing state
    /// advances with wall-clock time and is clamped to `[0, duration]`.
    pub fn live_position(&self, now_ms: f64) -> f64 {
        if !self.playing {
            return self.position_ms;
        }
        let elapsed = (now_ms - self.position_timestamp_ms).max(0.0);
        let position = (self.position_ms + elapsed).max(0.0);
        match self.duration_ms {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    /// Equality with a tolerance on the extrapolated position.
    pub fn approx_eq(&self, other: &PlaybackState, epsilon_ms: f64, now_ms: f64) -> bool {
        self.playing == other.playing
            && self.duration_ms == other.duration_ms
            && (self.live_position(now_ms) - other.live_position(now_ms)).abs() < epsilon_ms
    }
}

/// Where a playback position came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackSource {
    MediaElement,
    ProgressElementMilliseconds,
    ProgressElementSeconds,
    Estimated,
}

impl PlaybackSource {
    /// Position tolerance used when comparing states from this source.
    pub fn tolerance_ms(self) -> f64 {
        match self {
            Self::MediaElement => 250.0,
            Self::ProgressElementMilliseconds => 500.0,
            Self::ProgressElementSeconds => 1500.0,
            Self::Estimated => 3000.0,
        }
    }
}

/// A [`PlaybackState`] tagged with the signal it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TabMediaPlaybackState {
    pub state: PlaybackState,
    pub source: PlaybackSource,
}

impl TabMediaPlaybackState {
    pub fn new(state: PlaybackState, source: PlaybackSource) -> Self {
        Self { state, source }
    }

    /// Compare two tagged states using the tighter of the two tolerances.
    pub fn approx_eq(&self, other: &TabMediaPlaybackState, now_ms: f64) -> bool {
        let epsilon = self
            .source
            .tolerance_ms()
            .min(other.source.tolerance_ms());
        self.state.approx_eq(&other.state, epsilon, now_ms)
    }
}
