//! Finds the progress element that tracks playback position.
//!
//! Pages are full of sliders: volume, buffering, unrelated progress bars. The
//! one that matters advances at wall-clock rate while media plays. Each value
//! mutation is compared with the previous sample of the same element; the
//! first element whose value advances within epsilon of the elapsed time is
//! locked in and trusted until observation restarts.

use std::collections::HashMap;

use mediatab_core::ObserverConfig;
use tracing::{debug, trace};

use crate::dom::{Dom, MutationRecord, NodeId};
use crate::group::{ElementGroupObserver, GroupEvent};
use crate::progress::{Precision, ProgressElement};
use crate::source::ProgressElementSource;
use crate::strategy::{ElementMutation, ListenerId, MutationStrategy, MutationTarget};
use crate::timer::{earliest, Timeout};

type ProgressGroup = ElementGroupObserver<ProgressElementSource, MutationStrategy<ProgressElement>>;

/// What the observer reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The locked-in element changed (or was just locked in).
    Changed(ProgressElement),
    /// The locked-in element stopped advancing.
    Stopped(ProgressElement),
    /// The locked-in element, or every candidate, went away.
    Lost,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    value: f64,
    timestamp: f64,
}

#[derive(Debug, Clone)]
struct LockedElement {
    element: ProgressElement,
    update_interval_ms: f64,
    last_value_change_at: f64,
}

#[derive(Debug, Clone, Copy)]
struct Tolerances {
    milliseconds_epsilon_ms: f64,
    seconds_epsilon_ms: f64,
    stall_factor: f64,
}

fn observe_value_attributes(element: &ProgressElement) -> MutationTarget {
    MutationTarget {
        node: element.node(),
        attribute_filter: element
            .kind()
            .attributes()
            .iter()
            .map(|a| a.to_string())
            .collect(),
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackProgressObserver {
    group: ProgressGroup,
    listener: ListenerId,
    samples: HashMap<NodeId, Sample>,
    current: Option<LockedElement>,
    advancing: bool,
    stall: Timeout,
    tolerances: Tolerances,
}

impl PlaybackProgressObserver {
    pub fn new(config: &ObserverConfig) -> Self {
        let mut group = ElementGroupObserver::new(
            ProgressElementSource,
            MutationStrategy::new(observe_value_attributes),
            config.poll_interval_ms(),
        );
        let listener = group.add_listener();
        Self {
            group,
            listener,
            samples: HashMap::new(),
            current: None,
            advancing: false,
            stall: Timeout::default(),
            tolerances: Tolerances {
                milliseconds_epsilon_ms: config.progress.milliseconds_epsilon_ms,
                seconds_epsilon_ms: config.progress.seconds_epsilon_ms,
                stall_factor: config.progress.stall_factor,
            },
        }
    }

    pub fn start(&mut self, dom: &dyn Dom, now: f64) -> bool {
        self.reset();
        self.group.start(dom, now)
    }

    /// Stop observing and drop every sample and the lock-in.
    pub fn stop(&mut self) -> bool {
        self.reset();
        self.group.stop()
    }

    pub fn restart(&mut self, dom: &dyn Dom, now: f64) -> bool {
        self.stop();
        self.start(dom, now)
    }

    /// The locked-in playback progress element.
    pub fn current_element(&self) -> Option<&ProgressElement> {
        self.current.as_ref().map(|locked| &locked.element)
    }

    /// Whether any candidate progress element is on the page.
    pub fn is_tracking(&self) -> bool {
        self.group.is_tracking()
    }

    /// Whether the locked-in element has advanced recently.
    pub fn is_advancing(&self) -> bool {
        self.current.is_some() && self.advancing
    }

    pub fn observed_targets(&self) -> Vec<MutationTarget> {
        self.group.strategy().observed_targets()
    }

    pub fn next_deadline(&self) -> Option<f64> {
        earliest([self.group.next_deadline(), self.stall.deadline()])
    }

    /// Fire due timers: the stall watchdog and the candidate poll.
    pub fn on_timer(&mut self, dom: &dyn Dom, now: f64) -> Vec<ProgressEvent> {
        let mut events = Vec::new();

        if self.stall.fire(now) {
            if let Some(locked) = &self.current {
                debug!(node = ?locked.element.node(), "Progress element stopped advancing");
                self.advancing = false;
                events.push(ProgressEvent::Stopped(locked.element.clone()));
            }
        }

        for notification in self.group.on_timer(dom, now) {
            if notification.listener != self.listener {
                continue;
            }
            match notification.event {
                GroupEvent::NoElement => {
                    self.reset();
                    events.push(ProgressEvent::Lost);
                }
                GroupEvent::ElementsChanged => {
                    if self.current.is_some() {
                        events.push(ProgressEvent::Lost);
                    }
                    self.reset();
                }
                GroupEvent::Observed(_) => {}
            }
        }

        events
    }

    /// Process one mutation batch in delivery order.
    pub fn handle_mutations(
        &mut self,
        dom: &dyn Dom,
        records: &[MutationRecord],
        now: f64,
    ) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        for record in records {
            for notification in self.group.dispatch(record) {
                if notification.listener != self.listener {
                    continue;
                }
                if let GroupEvent::Observed(mutation) = notification.event {
                    events.extend(self.handle_mutation(dom, mutation, now));
                }
            }
        }
        events
    }

    fn handle_mutation(
        &mut self,
        dom: &dyn Dom,
        mutation: ElementMutation<ProgressElement>,
        now: f64,
    ) -> Option<ProgressEvent> {
        let node = mutation.element.node();
        if !dom.contains(node) {
            trace!(node = ?node, "Skipping mutation on detached progress element");
            return None;
        }

        if let Some(locked) = &mut self.current {
            if locked.element.node() != node {
                return None;
            }
            if mutation
                .attribute_name
                .eq_ignore_ascii_case(locked.element.value_attribute())
            {
                let interval = now - locked.last_value_change_at;
                if interval > 0.0 {
                    locked.update_interval_ms = interval;
                }
                locked.last_value_change_at = now;
                self.stall
                    .set(now + locked.update_interval_ms * self.tolerances.stall_factor);
                self.advancing = true;
            }
            return Some(ProgressEvent::Changed(locked.element.clone()));
        }

        if !mutation
            .attribute_name
            .eq_ignore_ascii_case(mutation.element.value_attribute())
        {
            return None;
        }
        let Some(value) = mutation.element.raw_value(dom) else {
            trace!(node = ?node, "Skipping unparsable progress value");
            return None;
        };

        let Some(last) = self.samples.get(&node).copied() else {
            self.samples.insert(node, Sample { value, timestamp: now });
            return None;
        };

        if value <= last.value {
            // Seek backwards, track change or a repeated value: rate unknown.
            self.samples.insert(node, Sample { value, timestamp: now });
            return None;
        }

        let time_delta = now - last.timestamp;
        if time_delta <= 0.0 {
            self.samples.insert(node, Sample { value, timestamp: now });
            return None;
        }

        let mut element = mutation.element;
        let mut position_delta = value - last.value;
        let (precision, epsilon) = classify_precision(position_delta, time_delta, &self.tolerances);
        element.set_value_precision(precision);
        position_delta *= element.multiplier();

        if (time_delta - position_delta).abs() > epsilon {
            self.samples.insert(node, Sample { value, timestamp: now });
            return None;
        }

        debug!(
            node = ?node,
            precision = ?precision,
            update_interval_ms = time_delta,
            "Locked in playback progress element"
        );
        self.samples.clear();
        self.stall.set(now + time_delta * self.tolerances.stall_factor);
        self.advancing = true;
        self.current = Some(LockedElement {
            element: element.clone(),
            update_interval_ms: time_delta,
            last_value_change_at: now,
        });
        Some(ProgressEvent::Changed(element))
    }

    fn reset(&mut self) {
        self.samples.clear();
        self.current = None;
        self.advancing = false;
        self.stall.clear();
    }
}

/// Milliseconds when the raw delta is at least half the elapsed milliseconds,
/// seconds otherwise. Ties go to milliseconds.
fn classify_precision(position_delta: f64, time_delta: f64, tolerances: &Tolerances) -> (Precision, f64) {
    if position_delta * 2.0 >= time_delta {
        (Precision::Milliseconds, tolerances.milliseconds_epsilon_ms)
    } else {
        (Precision::Seconds, tolerances.seconds_epsilon_ms)
    }
}
