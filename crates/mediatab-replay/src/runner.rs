use mediatab_core::{MediaTabError, MediaUpdate, ObserverConfig};
use mediatab_detect::{DomEvent, MutationRecord, SiteDatabase, TabMediaObserver};
use tracing::{debug, trace};

use crate::scenario::{Action, Page, Scenario, Step};

type Updates = Vec<Option<MediaUpdate>>;

/// Drive a fresh observer through `scenario` and collect what it reported.
///
/// Before each step, timers due up to the step's time fire; after the last
/// step, timers run up to the scenario's `end`.
pub fn run(
    scenario: &Scenario,
    config: ObserverConfig,
    sites: SiteDatabase,
) -> Result<Updates, MediaTabError> {
    let mut page = scenario.build_page()?;
    let mut observer = TabMediaObserver::new(config, sites, Updates::new())?;

    let mut last = 0.0;
    for step in scenario.timeline() {
        observer.advance(&page.dom, step.at);
        apply(&mut observer, &mut page, &step)?;
        last = step.at;
    }
    if let Some(end) = scenario.end.filter(|end| *end >= last) {
        observer.advance(&page.dom, end);
    }

    Ok(observer.into_sink())
}

fn apply(
    observer: &mut TabMediaObserver<Updates>,
    page: &mut Page,
    step: &Step,
) -> Result<(), MediaTabError> {
    let now = step.at;
    trace!(at = now, action = ?step.action, "Applying step");
    match &step.action {
        Action::Begin => observer.begin_observing(&page.dom, now),
        Action::Stop => observer.stop_observing(),
        Action::Session {
            metadata,
            playback_state,
            clear,
        } => {
            if *clear {
                page.dom.set_session_metadata(None);
            } else if let Some(metadata) = metadata {
                page.dom.set_session_metadata(Some(metadata.clone()));
            }
            if let Some(state) = playback_state {
                page.dom.set_session_playback_state(*state);
            }
            observer.handle_media_session_change(&page.dom, now);
        }
        Action::SetAttribute { node, name, value } => {
            let target = page.node(node)?;
            page.dom.set_attribute(target, name, value);
            observer.handle_mutations(&page.dom, &[MutationRecord::attribute(target, name)], now);
        }
        Action::Media {
            node,
            change,
            event,
        } => {
            let target = page.update_media(node, change)?;
            if let Some(kind) = event {
                observer.handle_media_event(&page.dom, &DomEvent::new(target, kind), now);
            }
        }
        Action::Remove { node } => {
            let target = page.node(node)?;
            page.dom.detach(target);
        }
        Action::Append { node, parent } => {
            let target = page.node(node)?;
            match page.parent(parent.as_deref())? {
                Some(parent) => page.dom.append_child(parent, target),
                None => page.dom.detach(target),
            }
        }
        Action::Register { node } => {
            let target = page.node(node)?;
            observer.register_media_element(target);
        }
    }
    debug!(at = now, reported = observer.sink().len(), "Step applied");
    Ok(())
}
