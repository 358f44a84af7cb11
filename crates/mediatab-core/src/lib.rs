pub mod config;
pub mod error;
pub mod models;
pub mod wire;

pub use config::ObserverConfig;
pub use error::MediaTabError;
pub use models::{
    MediaChange, MediaImage, MediaMetadata, PlaybackSource, PlaybackState, ResourceKind,
    ResourceLinks, TabMediaPlaybackState, TabMediaState,
};
pub use wire::{MediaUpdate, UpdateSource};
