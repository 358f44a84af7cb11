//! How a group of elements is observed once found.
//!
//! Strategies hold the subscription table. The host mirrors it onto real
//! listeners and feeds raw inputs back through [`ObservationStrategy::dispatch`],
//! which drops anything nobody subscribed to.

use mediatab_core::MediaTabError;

use crate::dom::{DomEvent, MutationRecord, NodeId};
use crate::source::SourceElement;

/// Handle for one registered consumer of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u32);

pub trait ObservationStrategy<E> {
    type Input;
    type Output;

    /// Subscribe `listener` to every element in `elements`.
    fn add_listeners(&mut self, listener: ListenerId, elements: &[E]);

    /// Drop every subscription at once.
    fn remove_all_listeners(&mut self);

    /// Route one raw input to the subscribed listeners.
    fn dispatch(&self, input: &Self::Input) -> Vec<(ListenerId, Self::Output)>;
}

/// A native event observed on a tracked element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementEvent<E> {
    pub element: E,
    pub kind: String,
}

#[derive(Debug, Clone)]
pub struct EventAttachment<E> {
    pub listener: ListenerId,
    pub element: E,
    pub event: String,
}

/// One native listener per event name per element.
#[derive(Debug, Clone)]
pub struct EventListenerStrategy<E> {
    event_names: Vec<String>,
    attached: Vec<EventAttachment<E>>,
}

impl<E: SourceElement> EventListenerStrategy<E> {
    /// Fails when `event_names` is empty: such a strategy could never observe
    /// anything.
    pub fn new(event_names: &[&str]) -> Result<Self, MediaTabError> {
        if event_names.is_empty() {
            return Err(MediaTabError::EmptyEventNames);
        }
        Ok(Self {
            event_names: event_names.iter().map(|e| e.to_string()).collect(),
            attached: Vec::new(),
        })
    }

    pub fn event_names(&self) -> &[String] {
        &self.event_names
    }

    pub fn attachments(&self) -> &[EventAttachment<E>] {
        &self.attached
    }
}

impl<E: SourceElement> ObservationStrategy<E> for EventListenerStrategy<E> {
    type Input = DomEvent;
    type Output = ElementEvent<E>;

    fn add_listeners(&mut self, listener: ListenerId, elements: &[E]) {
        for element in elements {
            for event in &self.event_names {
                let exists = self.attached.iter().any(|a| {
                    a.listener == listener && a.element.node() == element.node() && a.event == *event
                });
                if !exists {
                    self.attached.push(EventAttachment {
                        listener,
                        element: element.clone(),
                        event: event.clone(),
                    });
                }
            }
        }
    }

    fn remove_all_listeners(&mut self) {
        self.attached.clear();
    }

    fn dispatch(&self, input: &DomEvent) -> Vec<(ListenerId, ElementEvent<E>)> {
        self.attached
            .iter()
            .filter(|a| a.element.node() == input.target && a.event == input.kind)
            .map(|a| {
                (
                    a.listener,
                    ElementEvent {
                        element: a.element.clone(),
                        kind: input.kind.clone(),
                    },
                )
            })
            .collect()
    }
}

/// What to observe for one element: `MutationObserver.observe(node, init)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationTarget {
    pub node: NodeId,
    /// Attribute names to report. Empty means every attribute.
    pub attribute_filter: Vec<String>,
}

impl MutationTarget {
    fn accepts(&self, record: &MutationRecord) -> bool {
        if record.target != self.node {
            return false;
        }
        match &record.attribute_name {
            Some(name) => {
                self.attribute_filter.is_empty()
                    || self
                        .attribute_filter
                        .iter()
                        .any(|a| a.eq_ignore_ascii_case(name))
            }
            None => false,
        }
    }
}

/// An attribute mutation on a tracked element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementMutation<E> {
    pub element: E,
    pub attribute_name: String,
}

#[derive(Debug, Clone)]
struct Observation<E> {
    listener: ListenerId,
    element: E,
    target: MutationTarget,
}

/// One shared mutation observer configured per element by `target_for`.
///
/// Every record is matched against every registered observation, so several
/// listeners can share the same underlying observer.
#[derive(Debug, Clone)]
pub struct MutationStrategy<E> {
    target_for: fn(&E) -> MutationTarget,
    observations: Vec<Observation<E>>,
}

impl<E: SourceElement> MutationStrategy<E> {
    pub fn new(target_for: fn(&E) -> MutationTarget) -> Self {
        Self {
            target_for,
            observations: Vec::new(),
        }
    }

    /// Distinct nodes currently observed, with their merged attribute filters.
    pub fn observed_targets(&self) -> Vec<MutationTarget> {
        let mut targets: Vec<MutationTarget> = Vec::new();
        for observation in &self.observations {
            match targets.iter_mut().find(|t| t.node == observation.target.node) {
                Some(existing) => {
                    for attribute in &observation.target.attribute_filter {
                        if !existing.attribute_filter.contains(attribute) {
                            existing.attribute_filter.push(attribute.clone());
                        }
                    }
                }
                None => targets.push(observation.target.clone()),
            }
        }
        targets
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl<E: SourceElement> ObservationStrategy<E> for MutationStrategy<E> {
    type Input = MutationRecord;
    type Output = ElementMutation<E>;

    fn add_listeners(&mut self, listener: ListenerId, elements: &[E]) {
        for element in elements {
            let exists = self
                .observations
                .iter()
                .any(|o| o.listener == listener && o.element.node() == element.node());
            if exists {
                continue;
            }
            self.observations.push(Observation {
                listener,
                element: element.clone(),
                target: (self.target_for)(element),
            });
        }
    }

    fn remove_all_listeners(&mut self) {
        self.observations.clear();
    }

    fn dispatch(&self, record: &MutationRecord) -> Vec<(ListenerId, ElementMutation<E>)> {
        let Some(attribute_name) = &record.attribute_name else {
            return Vec::new();
        };
        self.observations
            .iter()
            .filter(|o| o.target.accepts(record))
            .map(|o| {
                (
                    o.listener,
                    ElementMutation {
                        element: o.element.clone(),
                        attribute_name: attribute_name.clone(),
                    },
                )
            })
            .collect()
    }
}
