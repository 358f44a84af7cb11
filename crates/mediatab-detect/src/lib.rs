pub mod dom;
pub mod group;
pub mod links;
pub mod playback_progress;
pub mod progress;
pub mod sites;
pub mod source;
pub mod source_observer;
pub mod strategy;
pub mod tab_observer;
pub mod timer;

pub use dom::{
    Dom, DomEvent, MediaProperties, MediaSessionSnapshot, MemoryDom, MutationRecord, NodeId,
    SessionPlaybackState,
};
pub use links::{resolve_resource_links, LinkPatterns};
pub use playback_progress::{PlaybackProgressObserver, ProgressEvent};
pub use progress::{Precision, ProgressElement, ProgressKind};
pub use sites::{SiteDatabase, SiteDef};
pub use strategy::MutationTarget;
pub use tab_observer::{MediaSink, TabMediaObserver, MEDIA_EVENTS};
