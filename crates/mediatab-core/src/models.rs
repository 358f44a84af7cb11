pub mod links;
pub mod media;
pub mod playback;

pub use links::{ResourceKind, ResourceLinks};
pub use media::{MediaChange, MediaImage, MediaMetadata, TabMediaState};
pub use playback::{PlaybackSource, PlaybackState, TabMediaPlaybackState};
