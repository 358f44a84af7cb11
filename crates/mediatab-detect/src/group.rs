use crate::dom::Dom;
use crate::source::{ElementSource, SourceElement};
use crate::source_observer::ElementSourceObserver;
use crate::strategy::{ListenerId, ObservationStrategy};

/// What a group listener is told.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupEvent<T> {
    /// A tracked element produced an input.
    Observed(T),
    /// The element set became empty. Sent before the restart.
    NoElement,
    /// The group restarted because the element set changed.
    ElementsChanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification<T> {
    pub listener: ListenerId,
    pub event: GroupEvent<T>,
}

/// Keeps an observation strategy attached to whichever elements a source
/// currently reports, restarting whenever that set changes.
///
/// Listeners registered while nothing is tracked stay pending and are
/// attached on the next successful start.
#[derive(Debug, Clone)]
pub struct ElementGroupObserver<S, T>
where
    S: ElementSource,
    T: ObservationStrategy<S::Element>,
{
    source: ElementSourceObserver<S>,
    strategy: T,
    elements: Vec<S::Element>,
    active: Vec<ListenerId>,
    pending: Vec<ListenerId>,
    next_listener: u32,
}

impl<S, T> ElementGroupObserver<S, T>
where
    S: ElementSource,
    T: ObservationStrategy<S::Element>,
{
    pub fn new(source: S, strategy: T, poll_interval_ms: f64) -> Self {
        Self {
            source: ElementSourceObserver::new(source, poll_interval_ms),
            strategy,
            elements: Vec::new(),
            active: Vec::new(),
            pending: Vec::new(),
            next_listener: 0,
        }
    }

    /// Register a listener. It is attached right away when elements are
    /// tracked, otherwise on the next successful start.
    pub fn add_listener(&mut self) -> ListenerId {
        let listener = ListenerId(self.next_listener);
        self.next_listener += 1;
        if self.elements.is_empty() {
            self.pending.push(listener);
        } else {
            self.strategy.add_listeners(listener, &self.elements);
            self.active.push(listener);
        }
        listener
    }

    /// Fetch the current elements and start polling. Returns whether
    /// elements are tracked afterwards.
    pub fn start(&mut self, dom: &dyn Dom, now: f64) -> bool {
        let elements = self.source.start(dom, now);
        if !elements.is_empty() && self.elements.is_empty() {
            self.elements = elements;
            for listener in std::mem::take(&mut self.pending) {
                self.strategy.add_listeners(listener, &self.elements);
                self.active.push(listener);
            }
            tracing::debug!(elements = self.elements.len(), "Group tracking elements");
        }
        !self.elements.is_empty()
    }

    /// Stop polling and detach everything. Listeners become pending again.
    /// Returns whether anything was torn down.
    pub fn stop(&mut self) -> bool {
        let torn_down = self.source.is_running() || !self.elements.is_empty();
        self.source.stop();
        self.strategy.remove_all_listeners();
        self.elements.clear();
        self.pending.append(&mut self.active);
        torn_down
    }

    pub fn restart(&mut self, dom: &dyn Dom, now: f64) -> bool {
        self.stop();
        self.start(dom, now)
    }

    pub fn is_tracking(&self) -> bool {
        !self.elements.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.source.is_running()
    }

    pub fn elements(&self) -> &[S::Element] {
        &self.elements
    }

    pub fn strategy(&self) -> &T {
        &self.strategy
    }

    pub fn source(&self) -> &S {
        self.source.source()
    }

    pub fn source_mut(&mut self) -> &mut S {
        self.source.source_mut()
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.source.next_deadline()
    }

    /// Run the source poll if due. A changed element set restarts the group;
    /// an empty one first tells every listener there is no element.
    pub fn on_timer(&mut self, dom: &dyn Dom, now: f64) -> Vec<Notification<T::Output>> {
        let Some(current) = self.source.poll(dom, now) else {
            return Vec::new();
        };

        let listeners = self.listeners();
        let mut notifications = Vec::new();
        if current.is_empty() {
            notifications.extend(listeners.iter().map(|listener| Notification {
                listener: *listener,
                event: GroupEvent::NoElement,
            }));
        }

        self.restart(dom, now);
        tracing::debug!(
            elements = self.elements.len(),
            nodes = ?self.elements.iter().map(SourceElement::node).collect::<Vec<_>>(),
            "Group restarted after element change"
        );

        notifications.extend(listeners.iter().map(|listener| Notification {
            listener: *listener,
            event: GroupEvent::ElementsChanged,
        }));
        notifications
    }

    /// Route a raw input through the strategy.
    pub fn dispatch(&self, input: &T::Input) -> Vec<Notification<T::Output>> {
        self.strategy
            .dispatch(input)
            .into_iter()
            .map(|(listener, output)| Notification {
                listener,
                event: GroupEvent::Observed(output),
            })
            .collect()
    }

    fn listeners(&self) -> Vec<ListenerId> {
        let mut listeners: Vec<ListenerId> =
            self.active.iter().chain(&self.pending).copied().collect();
        listeners.sort();
        listeners
    }
}
