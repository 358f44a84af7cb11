use crate::dom::{Dom, NodeId};

/// Unit a raw progress value is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Seconds,
    Milliseconds,
}

impl Precision {
    /// Units per second.
    pub fn per_second(self) -> f64 {
        match self {
            Self::Seconds => 1.0,
            Self::Milliseconds => 1000.0,
        }
    }
}

/// Which attribute triple an element exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    /// `<input type="range" min max value>`
    RangeInput,
    /// `role="progressbar"`/`role="slider"` with `aria-value*`
    Aria,
}

impl ProgressKind {
    pub fn min_attribute(self) -> &'static str {
        match self {
            Self::RangeInput => "min",
            Self::Aria => "aria-valuemin",
        }
    }

    pub fn max_attribute(self) -> &'static str {
        match self {
            Self::RangeInput => "max",
            Self::Aria => "aria-valuemax",
        }
    }

    pub fn value_attribute(self) -> &'static str {
        match self {
            Self::RangeInput => "value",
            Self::Aria => "aria-valuenow",
        }
    }

    pub fn attributes(self) -> [&'static str; 3] {
        [
            self.min_attribute(),
            self.max_attribute(),
            self.value_attribute(),
        ]
    }
}

/// A DOM node exposing a bounded numeric value.
///
/// Wrappers are rebuilt on every poll; equality is the wrapped node. Reads go
/// straight to the DOM and are scaled from `value_precision` into
/// `target_precision`.
#[derive(Debug, Clone)]
pub struct ProgressElement {
    node: NodeId,
    kind: ProgressKind,
    value_precision: Precision,
    target_precision: Precision,
    multiplier: f64,
}

impl PartialEq for ProgressElement {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl Eq for ProgressElement {}

impl ProgressElement {
    pub fn new(node: NodeId, kind: ProgressKind) -> Self {
        let mut element = Self {
            node,
            kind,
            value_precision: Precision::Seconds,
            target_precision: Precision::Milliseconds,
            multiplier: 1.0,
        };
        element.update_multiplier();
        element
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn kind(&self) -> ProgressKind {
        self.kind
    }

    pub fn value_attribute(&self) -> &'static str {
        self.kind.value_attribute()
    }

    pub fn value_precision(&self) -> Precision {
        self.value_precision
    }

    pub fn set_value_precision(&mut self, precision: Precision) {
        self.value_precision = precision;
        self.update_multiplier();
    }

    pub fn target_precision(&self) -> Precision {
        self.target_precision
    }

    pub fn set_target_precision(&mut self, precision: Precision) {
        self.target_precision = precision;
        self.update_multiplier();
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn min(&self, dom: &dyn Dom) -> Option<f64> {
        self.scaled(dom, self.kind.min_attribute())
    }

    pub fn max(&self, dom: &dyn Dom) -> Option<f64> {
        self.scaled(dom, self.kind.max_attribute())
    }

    pub fn value(&self, dom: &dyn Dom) -> Option<f64> {
        self.scaled(dom, self.kind.value_attribute())
    }

    /// Unscaled value attribute.
    pub fn raw_value(&self, dom: &dyn Dom) -> Option<f64> {
        parse_number(dom, self.node, self.kind.value_attribute())
    }

    fn scaled(&self, dom: &dyn Dom, attribute: &str) -> Option<f64> {
        parse_number(dom, self.node, attribute).map(|v| v * self.multiplier)
    }

    fn update_multiplier(&mut self) {
        self.multiplier = self.target_precision.per_second() / self.value_precision.per_second();
    }
}

fn parse_number(dom: &dyn Dom, node: NodeId, attribute: &str) -> Option<f64> {
    dom.attribute(node, attribute)?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
