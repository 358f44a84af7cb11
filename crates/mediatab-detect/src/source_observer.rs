use crate::dom::Dom;
use crate::source::{same_elements, ElementSource};
use crate::timer::Interval;

/// Polls an [`ElementSource`] and reports when its result changes.
#[derive(Debug, Clone)]
pub struct ElementSourceObserver<S: ElementSource> {
    source: S,
    interval: Interval,
    baseline: Vec<S::Element>,
}

impl<S: ElementSource> ElementSourceObserver<S> {
    pub fn new(source: S, period_ms: f64) -> Self {
        Self {
            source,
            interval: Interval::new(period_ms),
            baseline: Vec::new(),
        }
    }

    /// Run the immediate first check and start polling. The result becomes
    /// the baseline later polls are compared against.
    pub fn start(&mut self, dom: &dyn Dom, now: f64) -> Vec<S::Element> {
        self.baseline = self.source.get(dom);
        self.interval.start(now);
        self.baseline.clone()
    }

    /// Stop polling and forget the baseline.
    pub fn stop(&mut self) {
        self.interval.stop();
        self.baseline.clear();
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_running()
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.interval.deadline()
    }

    /// Poll if due. Returns the new element list when it differs from the
    /// baseline in length or in identity at any index.
    pub fn poll(&mut self, dom: &dyn Dom, now: f64) -> Option<Vec<S::Element>> {
        if !self.interval.fire(now) {
            return None;
        }
        let current = self.source.get(dom);
        if same_elements(&self.baseline, &current) {
            return None;
        }
        tracing::trace!(
            previous = self.baseline.len(),
            current = current.len(),
            "Element source changed"
        );
        self.baseline = current.clone();
        Some(current)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}
