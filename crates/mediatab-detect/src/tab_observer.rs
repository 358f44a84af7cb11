//! Per-tab orchestration.
//!
//! [`TabMediaObserver`] fuses the media elements, the locked-in playback
//! progress element and the page's media session into one [`TabMediaState`],
//! and hands the relay an update only when that state meaningfully changes.

use mediatab_core::{
    MediaMetadata, MediaTabError, MediaUpdate, ObserverConfig, PlaybackSource, PlaybackState,
    TabMediaPlaybackState, TabMediaState, UpdateSource,
};
use tracing::{debug, trace, warn};
use url::Url;

use crate::dom::{Dom, DomEvent, MediaProperties, MutationRecord, NodeId, SessionPlaybackState};
use crate::group::{ElementGroupObserver, GroupEvent};
use crate::links::resolve_resource_links;
use crate::playback_progress::{PlaybackProgressObserver, ProgressEvent};
use crate::progress::Precision;
use crate::sites::SiteDatabase;
use crate::source::{MediaElement, MediaElementSource, SourceElement};
use crate::strategy::{EventListenerStrategy, ListenerId, MutationTarget};
use crate::timer::earliest;

/// Native media events that can change the fused state.
pub const MEDIA_EVENTS: &[&str] = &[
    "durationchange",
    "emptied",
    "ended",
    "loadedmetadata",
    "pause",
    "play",
    "playing",
    "ratechange",
    "seeked",
    "volumechange",
];

/// Events after which the target becomes the active media element.
const ACTIVATING_EVENTS: &[&str] = &["play", "playing"];

/// Upper bound on timer rounds per [`TabMediaObserver::advance`] call.
const MAX_TIMER_ROUNDS: usize = 1024;

type MediaGroup = ElementGroupObserver<MediaElementSource, EventListenerStrategy<MediaElement>>;

/// Receives what the tab reports. `None` means nothing is playing any more.
pub trait MediaSink {
    fn notify(&mut self, update: Option<MediaUpdate>);
}

impl MediaSink for Vec<Option<MediaUpdate>> {
    fn notify(&mut self, update: Option<MediaUpdate>) {
        self.push(update);
    }
}

/// Position estimate for pages that expose nothing better: elapsed wall-clock
/// time while playing, measured from the first observation of the track.
#[derive(Debug, Clone, Copy, Default)]
struct PositionEstimate {
    anchor: Option<f64>,
    accumulated_ms: f64,
}

impl PositionEstimate {
    fn update(&mut self, playing: bool, now: f64) {
        match (playing, self.anchor) {
            (true, None) => self.anchor = Some(now),
            (false, Some(anchor)) => {
                self.accumulated_ms += (now - anchor).max(0.0);
                self.anchor = None;
            }
            _ => {}
        }
    }

    fn position(&self, now: f64) -> f64 {
        self.accumulated_ms + self.anchor.map_or(0.0, |anchor| (now - anchor).max(0.0))
    }
}

/// Last value read from the locked-in progress element.
#[derive(Debug, Clone, Copy)]
struct ProgressSample {
    value_ms: f64,
    changed_at: f64,
}

#[derive(Debug)]
pub struct TabMediaObserver<K: MediaSink> {
    sites: SiteDatabase,
    sink: K,
    observing: bool,
    media: MediaGroup,
    media_listener: ListenerId,
    progress: PlaybackProgressObserver,
    active_media: Option<MediaElement>,
    progress_sample: Option<ProgressSample>,
    estimate: PositionEstimate,
    session_reported_playing: bool,
    previous: Option<TabMediaState>,
    reported: bool,
}

impl<K: MediaSink> TabMediaObserver<K> {
    pub fn new(config: ObserverConfig, sites: SiteDatabase, sink: K) -> Result<Self, MediaTabError> {
        config.validate()?;
        let mut media = ElementGroupObserver::new(
            MediaElementSource::new(config.media.selection),
            EventListenerStrategy::new(MEDIA_EVENTS)?,
            config.poll_interval_ms(),
        );
        let media_listener = media.add_listener();
        Ok(Self {
            sites,
            sink,
            observing: false,
            media,
            media_listener,
            progress: PlaybackProgressObserver::new(&config),
            active_media: None,
            progress_sample: None,
            estimate: PositionEstimate::default(),
            session_reported_playing: false,
            previous: None,
            reported: false,
        })
    }

    /// Start observing, or restart from scratch when already observing.
    pub fn begin_observing(&mut self, dom: &dyn Dom, now: f64) {
        if self.observing {
            debug!("Restarting tab media observation");
            self.stop_observing();
        }
        let media = self.media.start(dom, now);
        let progress = self.progress.start(dom, now);
        self.active_media = self.media.elements().first().copied();
        self.observing = true;
        debug!(media, progress, "Tab media observation started");
        self.refresh(dom, now);
    }

    /// Detach everything, clear every timer and forget all fused state.
    pub fn stop_observing(&mut self) {
        self.media.stop();
        self.progress.stop();
        self.active_media = None;
        self.progress_sample = None;
        self.estimate = PositionEstimate::default();
        self.session_reported_playing = false;
        self.previous = None;
        self.reported = false;
        self.observing = false;
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn next_deadline(&self) -> Option<f64> {
        if !self.observing {
            return None;
        }
        earliest([self.media.next_deadline(), self.progress.next_deadline()])
    }

    /// Fire every timer due at or before `now`, in deadline order.
    pub fn advance(&mut self, dom: &dyn Dom, now: f64) {
        let mut rounds = 0;
        while let Some(deadline) = self.next_deadline().filter(|deadline| *deadline <= now) {
            if rounds == MAX_TIMER_ROUNDS {
                warn!(deadline, now, "Timers did not settle, deferring the rest");
                break;
            }
            rounds += 1;
            self.fire_timers(dom, deadline);
        }
    }

    /// A native event fired on a media element.
    pub fn handle_media_event(&mut self, dom: &dyn Dom, event: &DomEvent, now: f64) {
        if !self.observing {
            return;
        }
        let mut observed = false;
        for notification in self.media.dispatch(event) {
            if notification.listener != self.media_listener {
                continue;
            }
            if let GroupEvent::Observed(element_event) = notification.event {
                trace!(node = ?element_event.element.node(), kind = %element_event.kind, "Media event");
                if self.active_media.is_none() || ACTIVATING_EVENTS.contains(&element_event.kind.as_str()) {
                    self.active_media = Some(element_event.element);
                }
                observed = true;
            }
        }
        if observed {
            self.refresh(dom, now);
        }
    }

    /// One batch of attribute mutations, in delivery order.
    pub fn handle_mutations(&mut self, dom: &dyn Dom, records: &[MutationRecord], now: f64) {
        if !self.observing {
            return;
        }
        let events = self.progress.handle_mutations(dom, records, now);
        if self.apply_progress_events(dom, &events, now) {
            self.refresh(dom, now);
        }
    }

    /// `navigator.mediaSession` metadata or playback state changed.
    pub fn handle_media_session_change(&mut self, dom: &dyn Dom, now: f64) {
        if self.observing {
            self.refresh(dom, now);
        }
    }

    /// Make a media element that never joined the tree discoverable. It is
    /// picked up on the next media poll.
    pub fn register_media_element(&mut self, node: NodeId) {
        self.media.source_mut().register(node);
    }

    /// The media element currently considered active.
    pub fn active_media_element(&self) -> Option<NodeId> {
        self.active_media.map(|media| media.node())
    }

    /// Where transport commands should go: the active media element, else
    /// the locked-in progress element for seeking.
    pub fn transport_target(&self) -> Option<NodeId> {
        self.active_media_element()
            .or_else(|| self.progress.current_element().map(|element| element.node()))
    }

    /// Attribute observations the host must mirror.
    pub fn observed_mutation_targets(&self) -> Vec<MutationTarget> {
        self.progress.observed_targets()
    }

    /// Element/event pairs the host must listen to.
    pub fn observed_media_events(&self) -> Vec<DomEvent> {
        let mut events: Vec<DomEvent> = Vec::new();
        for attachment in self.media.strategy().attachments() {
            let event = DomEvent::new(attachment.element.node(), &attachment.event);
            if !events.contains(&event) {
                events.push(event);
            }
        }
        events
    }

    /// The last state reported to the sink.
    pub fn current_state(&self) -> Option<&TabMediaState> {
        self.previous.as_ref()
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    fn fire_timers(&mut self, dom: &dyn Dom, at: f64) {
        // Every media tick re-reads the media session, even when the element
        // set is unchanged.
        let mut changed = self.media.next_deadline().is_some_and(|deadline| deadline <= at);

        for notification in self.media.on_timer(dom, at) {
            if notification.listener != self.media_listener {
                continue;
            }
            match notification.event {
                GroupEvent::NoElement => debug!("No media elements tracked"),
                GroupEvent::ElementsChanged => self.reselect_active_media(dom),
                GroupEvent::Observed(_) => {}
            }
        }

        let events = self.progress.on_timer(dom, at);
        changed |= self.apply_progress_events(dom, &events, at);

        if changed {
            self.refresh(dom, at);
        }
    }

    /// Keep the active element while it is tracked, else take the first
    /// tracked one. An untracked active element is kept while it is still on
    /// the page: `first_audible` drops a paused element from the source, but
    /// its paused state must still be fused.
    fn reselect_active_media(&mut self, dom: &dyn Dom) {
        let elements = self.media.elements();
        let tracked = self
            .active_media
            .filter(|active| elements.iter().any(|e| e.node() == active.node()));
        let lingering = self.active_media.filter(|active| {
            dom.contains(active.node()) || self.media.source().is_registered(active.node())
        });
        let next = tracked
            .or_else(|| elements.first().copied())
            .or(lingering);
        if next.is_none() && self.active_media.is_some() {
            debug!("Active media element is gone");
        }
        self.active_media = next;
    }

    fn apply_progress_events(&mut self, dom: &dyn Dom, events: &[ProgressEvent], now: f64) -> bool {
        for event in events {
            match event {
                ProgressEvent::Changed(element) => {
                    let Some(value_ms) = element.value(dom) else {
                        continue;
                    };
                    let moved = self
                        .progress_sample
                        .map_or(true, |sample| sample.value_ms != value_ms);
                    if moved {
                        self.progress_sample = Some(ProgressSample {
                            value_ms,
                            changed_at: now,
                        });
                    }
                }
                ProgressEvent::Stopped(element) => {
                    trace!(node = ?element.node(), "Progress element stalled");
                }
                ProgressEvent::Lost => self.progress_sample = None,
            }
        }
        !events.is_empty()
    }

    fn refresh(&mut self, dom: &dyn Dom, now: f64) {
        let Some(state) = self.fuse(dom, now) else {
            self.previous = None;
            if std::mem::take(&mut self.reported) {
                debug!("Media state cleared");
                self.sink.notify(None);
            }
            return;
        };

        let change = state.determine_changes(self.previous.as_ref(), now);
        if !change.is_reportable() {
            return;
        }

        let update = self.build_update(dom, &state);
        debug!(
            change = ?change,
            title = %state.metadata.title,
            playing = state.playback.state.is_playing(),
            source = ?state.playback.source,
            "Reporting media change"
        );
        self.previous = Some(state);
        self.reported = true;
        self.sink.notify(Some(update));
    }

    fn fuse(&mut self, dom: &dyn Dom, now: f64) -> Option<TabMediaState> {
        let session = dom.media_session();
        let metadata = session.metadata?;
        if session.playback_state == SessionPlaybackState::Playing {
            self.session_reported_playing = true;
        }

        let media = self.active_media.and_then(|media| media.properties(dom));
        let playing = self.fuse_playing(session.playback_state, media);

        if self.is_new_track(&metadata) {
            self.estimate = PositionEstimate::default();
        }
        self.estimate.update(playing, now);

        let playback = self.fuse_position(dom, media, playing, now);
        Some(TabMediaState::new(metadata, playback))
    }

    fn is_new_track(&self, metadata: &MediaMetadata) -> bool {
        self.previous
            .as_ref()
            .map_or(true, |previous| !previous.metadata.same_track(metadata))
    }

    fn fuse_playing(&self, session: SessionPlaybackState, media: Option<MediaProperties>) -> bool {
        match session {
            SessionPlaybackState::Playing => true,
            SessionPlaybackState::Paused => false,
            SessionPlaybackState::None => {
                if let Some(media) = media {
                    return !media.paused && !media.muted;
                }
                !(self.progress.is_tracking()
                    && !self.progress.is_advancing()
                    && !self.session_reported_playing)
            }
        }
    }

    fn fuse_position(
        &self,
        dom: &dyn Dom,
        media: Option<MediaProperties>,
        playing: bool,
        now: f64,
    ) -> TabMediaPlaybackState {
        if let Some(media) = media.filter(|m| !m.current_time.is_nan() && !m.duration.is_nan()) {
            return TabMediaPlaybackState::new(
                PlaybackState::new(
                    media.current_time * 1000.0,
                    now,
                    Some(media.duration * 1000.0),
                    playing,
                ),
                PlaybackSource::MediaElement,
            );
        }

        if let (Some(element), Some(sample)) = (self.progress.current_element(), self.progress_sample) {
            let source = match element.value_precision() {
                Precision::Milliseconds => PlaybackSource::ProgressElementMilliseconds,
                Precision::Seconds => PlaybackSource::ProgressElementSeconds,
            };
            return TabMediaPlaybackState::new(
                PlaybackState::new(sample.value_ms, sample.changed_at, element.max(dom), playing),
                source,
            );
        }

        TabMediaPlaybackState::new(
            PlaybackState::new(self.estimate.position(now), now, None, playing),
            PlaybackSource::Estimated,
        )
    }

    fn build_update(&self, dom: &dyn Dom, state: &TabMediaState) -> MediaUpdate {
        let page_url = dom.page_url();
        let parsed = Url::parse(&page_url).ok();
        let host = parsed.as_ref().and_then(Url::host_str).unwrap_or_default();
        let site_url = parsed
            .as_ref()
            .map(|url| url.origin().ascii_serialization())
            .unwrap_or_else(|| page_url.clone());

        let patterns = self.sites.patterns_for_host(host);
        let links = resolve_resource_links(dom, &patterns, &state.metadata);
        let source = UpdateSource::new(host, &site_url, dom.favicon_url());
        MediaUpdate::from_state(state, source, &links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediatab_core::config::MediaSelection;
    use mediatab_core::wire::WireResourceLinks;
    use mediatab_core::MediaImage;

    use crate::dom::MemoryDom;

    type Updates = Vec<Option<MediaUpdate>>;

    fn observer() -> TabMediaObserver<Updates> {
        TabMediaObserver::new(ObserverConfig::default(), SiteDatabase::embedded(), Vec::new()).unwrap()
    }

    fn metadata(title: &str) -> MediaMetadata {
        MediaMetadata {
            title: title.into(),
            artist: "Queen".into(),
            album: "A Night at the Opera".into(),
            artwork: vec![MediaImage {
                src: "https://example.com/cover.jpg".into(),
                sizes: Some("512x512".into()),
                mime_type: Some("image/jpeg".into()),
            }],
        }
    }

    fn playing_audio(dom: &mut MemoryDom) -> NodeId {
        let audio = dom.append(dom.body(), "audio");
        let props = dom.media_mut(audio).unwrap();
        props.current_time = 10.0;
        props.duration = 200.0;
        props.paused = false;
        audio
    }

    fn last(observer: &TabMediaObserver<Updates>) -> &MediaUpdate {
        observer.sink().last().unwrap().as_ref().unwrap()
    }

    #[test]
    fn test_media_element_playback_is_reported() {
        let mut dom = MemoryDom::new("https://example.com/listen");
        playing_audio(&mut dom);
        dom.set_session_metadata(Some(metadata("Bohemian Rhapsody")));

        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);
        assert_eq!(observer.sink().len(), 1);

        let update = last(&observer);
        let playback = update.playback_state.as_ref().unwrap();
        assert!(playback.playing);
        assert_eq!(playback.position, 10.0);
        let metadata = update.metadata.as_ref().unwrap();
        assert_eq!(metadata.duration, Some(200.0));
        assert_eq!(update.images[0].width, Some(512));
        assert_eq!(
            observer.current_state().unwrap().playback.source,
            PlaybackSource::MediaElement
        );
    }

    #[test]
    fn test_unchanged_state_is_not_reported_again() {
        let mut dom = MemoryDom::new("https://example.com/");
        let audio = playing_audio(&mut dom);
        dom.set_session_metadata(Some(metadata("Bohemian Rhapsody")));
        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);

        dom.media_mut(audio).unwrap().current_time = 10.5;
        observer.handle_media_session_change(&dom, 500.0);
        observer.advance(&dom, 500.0);
        assert_eq!(observer.sink().len(), 1);
    }

    #[test]
    fn test_pause_event_reports_playback_change() {
        let mut dom = MemoryDom::new("https://example.com/");
        let audio = playing_audio(&mut dom);
        dom.set_session_metadata(Some(metadata("Bohemian Rhapsody")));
        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);

        let props = dom.media_mut(audio).unwrap();
        props.current_time = 10.5;
        props.paused = true;
        observer.handle_media_event(&dom, &DomEvent::new(audio, "pause"), 500.0);

        assert_eq!(observer.sink().len(), 2);
        assert!(!last(&observer).playback_state.as_ref().unwrap().playing);
    }

    #[test]
    fn test_session_state_overrides_media_element() {
        let mut dom = MemoryDom::new("https://example.com/");
        playing_audio(&mut dom);
        dom.set_session_metadata(Some(metadata("Bohemian Rhapsody")));
        dom.set_session_playback_state(SessionPlaybackState::Paused);
        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);
        assert!(!last(&observer).playback_state.as_ref().unwrap().playing);
    }

    #[test]
    fn test_track_change_is_reported() {
        let mut dom = MemoryDom::new("https://example.com/");
        playing_audio(&mut dom);
        dom.set_session_metadata(Some(metadata("Bohemian Rhapsody")));
        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);

        dom.set_session_metadata(Some(metadata("Love of My Life")));
        observer.handle_media_session_change(&dom, 100.0);
        assert_eq!(observer.sink().len(), 2);
        assert_eq!(
            last(&observer).metadata.as_ref().unwrap().title,
            "Love of My Life"
        );
    }

    #[test]
    fn test_cleared_metadata_notifies_none_once() {
        let mut dom = MemoryDom::new("https://example.com/");
        playing_audio(&mut dom);
        dom.set_session_metadata(Some(metadata("Bohemian Rhapsody")));
        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);

        dom.set_session_metadata(None);
        observer.handle_media_session_change(&dom, 100.0);
        observer.handle_media_session_change(&dom, 200.0);
        assert_eq!(observer.sink().len(), 2);
        assert!(observer.sink()[1].is_none());
        assert!(observer.current_state().is_none());
    }

    #[test]
    fn test_estimated_position_and_new_track_reset() {
        let mut dom = MemoryDom::new("https://example.com/");
        dom.set_session_metadata(Some(metadata("Bohemian Rhapsody")));
        dom.set_session_playback_state(SessionPlaybackState::Playing);
        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);
        assert_eq!(
            observer.current_state().unwrap().playback.source,
            PlaybackSource::Estimated
        );

        // Polling re-fuses, but an estimate advancing at wall-clock rate is unchanged.
        observer.advance(&dom, 5_000.0);
        assert_eq!(observer.sink().len(), 1);

        dom.set_session_playback_state(SessionPlaybackState::Paused);
        observer.handle_media_session_change(&dom, 5_000.0);
        let playback = last(&observer).playback_state.clone().unwrap();
        assert!(!playback.playing);
        assert_eq!(playback.position, 5.0);

        dom.set_session_playback_state(SessionPlaybackState::Playing);
        dom.set_session_metadata(Some(metadata("Love of My Life")));
        observer.handle_media_session_change(&dom, 6_000.0);
        let playback = last(&observer).playback_state.clone().unwrap();
        assert!(playback.playing);
        assert_eq!(playback.position, 0.0);
    }

    #[test]
    fn test_session_only_pages_are_picked_up_by_polling() {
        let mut dom = MemoryDom::new("https://example.com/");
        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);
        assert!(observer.sink().is_empty());

        dom.set_session_metadata(Some(metadata("Bohemian Rhapsody")));
        dom.set_session_playback_state(SessionPlaybackState::Playing);
        observer.advance(&dom, 1_000.0);
        assert_eq!(observer.sink().len(), 1);
    }

    #[test]
    fn test_progress_element_drives_position_and_pause() {
        let mut dom = MemoryDom::new("https://example.com/");
        let bar = dom.append(dom.body(), "div");
        dom.set_attribute(bar, "role", "progressbar");
        dom.set_attribute(bar, "aria-valuemin", "0");
        dom.set_attribute(bar, "aria-valuemax", "240");
        dom.set_attribute(bar, "aria-valuenow", "0");
        dom.set_session_metadata(Some(metadata("Bohemian Rhapsody")));

        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);
        // A progress element exists but has not been seen advancing.
        assert!(!last(&observer).playback_state.as_ref().unwrap().playing);

        let record = [MutationRecord::attribute(bar, "aria-valuenow")];
        dom.set_attribute(bar, "aria-valuenow", "10");
        observer.handle_mutations(&dom, &record, 1_000.0);
        dom.set_attribute(bar, "aria-valuenow", "11");
        observer.handle_mutations(&dom, &record, 2_000.0);

        assert_eq!(observer.sink().len(), 2);
        let update = last(&observer);
        let playback = update.playback_state.as_ref().unwrap();
        assert!(playback.playing);
        assert_eq!(playback.position, 11.0);
        assert_eq!(playback.position_timestamp, 2_000.0);
        assert_eq!(update.metadata.as_ref().unwrap().duration, Some(240.0));
        assert_eq!(
            observer.current_state().unwrap().playback.source,
            PlaybackSource::ProgressElementSeconds
        );
        assert_eq!(observer.transport_target(), Some(bar));

        // No further mutation: the stall watchdog fires at 2000 + 1.5 * 1000.
        observer.advance(&dom, 3_500.0);
        assert_eq!(observer.sink().len(), 3);
        assert!(!last(&observer).playback_state.as_ref().unwrap().playing);
    }

    #[test]
    fn test_update_carries_links_and_source() {
        let mut dom = MemoryDom::new("https://open.spotify.com/album/4u7Enebtm");
        let icon = dom.append(dom.head(), "link");
        dom.set_attribute(icon, "rel", "icon");
        dom.set_attribute(icon, "href", "/favicon.ico");
        let bar = dom.append(dom.body(), "footer");
        for (href, text) in [("/track/abc123", "Bohemian Rhapsody"), ("/artist/q55", "Queen")] {
            let anchor = dom.append(bar, "a");
            dom.set_attribute(anchor, "href", href);
            dom.set_text(anchor, text);
        }
        playing_audio(&mut dom);
        dom.set_session_metadata(Some(metadata("Bohemian Rhapsody")));

        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);
        let update = last(&observer);

        assert_eq!(update.source.reverse_domain, "com.spotify.open");
        assert_eq!(update.source.site_url, "https://open.spotify.com");
        assert_eq!(
            update.source.favicon_url.as_deref(),
            Some("https://open.spotify.com/favicon.ico")
        );
        assert_eq!(
            update.resource_links.track_url["Bohemian Rhapsody"],
            "https://open.spotify.com/track/abc123"
        );
        assert_eq!(
            update.resource_links.artist_url["Queen"],
            "https://open.spotify.com/artist/q55"
        );
        assert!(update.resource_links.album_url.is_empty());
    }

    #[test]
    fn test_unknown_site_has_no_links() {
        let mut dom = MemoryDom::new("https://example.com/");
        let anchor = dom.append(dom.body(), "a");
        dom.set_attribute(anchor, "href", "/track/1");
        dom.set_text(anchor, "Bohemian Rhapsody");
        playing_audio(&mut dom);
        dom.set_session_metadata(Some(metadata("Bohemian Rhapsody")));

        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);
        assert_eq!(last(&observer).resource_links, WireResourceLinks::default());
    }

    #[test]
    fn test_registered_detached_element_becomes_active() {
        let mut dom = MemoryDom::new("https://example.com/");
        let audio = dom.create_element("audio");
        let props = dom.media_mut(audio).unwrap();
        props.duration = 30.0;
        props.paused = false;

        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);
        assert_eq!(observer.active_media_element(), None);

        observer.register_media_element(audio);
        observer.advance(&dom, 1_000.0);
        assert_eq!(observer.active_media_element(), Some(audio));
        assert_eq!(observer.transport_target(), Some(audio));
        assert_eq!(observer.observed_media_events().len(), MEDIA_EVENTS.len());
    }

    #[test]
    fn test_play_event_switches_active_element() {
        let mut dom = MemoryDom::new("https://example.com/");
        let first = playing_audio(&mut dom);
        let second = playing_audio(&mut dom);
        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);
        assert_eq!(observer.active_media_element(), Some(first));

        observer.handle_media_event(&dom, &DomEvent::new(second, "volumechange"), 10.0);
        assert_eq!(observer.active_media_element(), Some(first));
        observer.handle_media_event(&dom, &DomEvent::new(second, "play"), 20.0);
        assert_eq!(observer.active_media_element(), Some(second));
    }

    #[test]
    fn test_subscriptions_are_exposed_for_the_host() {
        let mut dom = MemoryDom::new("https://example.com/");
        let audio = playing_audio(&mut dom);
        let slider = dom.append(dom.body(), "input");
        for (name, value) in [("type", "range"), ("min", "0"), ("max", "100"), ("value", "0")] {
            dom.set_attribute(slider, name, value);
        }
        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);

        let events = observer.observed_media_events();
        assert!(events.contains(&DomEvent::new(audio, "seeked")));
        let targets = observer.observed_mutation_targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].node, slider);
        assert!(targets[0].attribute_filter.contains(&"value".to_string()));
    }

    #[test]
    fn test_stop_observing_is_a_full_reset() {
        let mut dom = MemoryDom::new("https://example.com/");
        let audio = playing_audio(&mut dom);
        dom.set_session_metadata(Some(metadata("Bohemian Rhapsody")));
        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);

        observer.stop_observing();
        assert!(!observer.is_observing());
        assert_eq!(observer.next_deadline(), None);
        assert!(observer.observed_media_events().is_empty());
        assert!(observer.current_state().is_none());

        observer.handle_media_event(&dom, &DomEvent::new(audio, "pause"), 100.0);
        observer.advance(&dom, 10_000.0);
        assert_eq!(observer.sink().len(), 1);

        // Observing again starts a fresh session.
        observer.begin_observing(&dom, 20_000.0);
        assert_eq!(observer.sink().len(), 2);
    }

    #[test]
    fn test_begin_observing_twice_restarts() {
        let mut dom = MemoryDom::new("https://example.com/");
        playing_audio(&mut dom);
        dom.set_session_metadata(Some(metadata("Bohemian Rhapsody")));
        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);
        observer.begin_observing(&dom, 100.0);
        assert_eq!(observer.sink().len(), 2);
        assert_eq!(observer.observed_media_events().len(), MEDIA_EVENTS.len());
    }

    #[test]
    fn test_first_audible_pause_stays_paused_after_poll() {
        let mut config = ObserverConfig::default();
        config.media.selection = MediaSelection::FirstAudible;
        let mut dom = MemoryDom::new("https://example.com/");
        let audio = playing_audio(&mut dom);
        dom.set_session_metadata(Some(metadata("Bohemian Rhapsody")));
        let mut observer = TabMediaObserver::new(config, SiteDatabase::embedded(), Updates::new()).unwrap();
        observer.begin_observing(&dom, 0.0);

        dom.media_mut(audio).unwrap().paused = true;
        observer.handle_media_event(&dom, &DomEvent::new(audio, "pause"), 500.0);
        assert_eq!(observer.sink().len(), 2);

        // The paused element is no longer audible, so the poll drops it.
        observer.advance(&dom, 1_000.0);
        assert_eq!(observer.sink().len(), 2);
        assert_eq!(observer.active_media_element(), Some(audio));
        let state = observer.current_state().unwrap();
        assert!(!state.playback.state.is_playing());
        assert_eq!(state.playback.source, PlaybackSource::MediaElement);

        // Resuming brings it back on the next poll.
        dom.media_mut(audio).unwrap().paused = false;
        observer.advance(&dom, 2_000.0);
        assert_eq!(observer.sink().len(), 3);
        assert!(last(&observer).playback_state.as_ref().unwrap().playing);
    }

    #[test]
    fn test_removed_media_element_is_dropped() {
        let mut dom = MemoryDom::new("https://example.com/");
        let audio = playing_audio(&mut dom);
        let mut observer = observer();
        observer.begin_observing(&dom, 0.0);
        assert_eq!(observer.active_media_element(), Some(audio));

        dom.detach(audio);
        observer.advance(&dom, 1_000.0);
        assert_eq!(observer.active_media_element(), None);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ObserverConfig::default();
        config.polling.interval_ms = 0;
        let result = TabMediaObserver::new(config, SiteDatabase::embedded(), Updates::new());
        assert!(matches!(result, Err(MediaTabError::Config(_))));
    }
}
