//! Mapping from checkout states to whatever renders them.

use std::collections::BTreeMap;

use crate::{
    checkout::{CheckoutSnapshot, CheckoutStep},
    errors::{Error, Result},
};

/// Renderers keyed by checkout state.
///
/// A state without a renderer is reported as [`Error::NoRenderer`] instead of
/// showing nothing.
///
/// ```
/// use checkout_machine::{checkout::CheckoutStep, view::ViewRegistry};
///
/// let views = ViewRegistry::new()
///     .register(CheckoutStep::Select, "select")
///     .register(CheckoutStep::Payment, "payment");
///
/// assert_eq!(views.resolve("PAYMENT").unwrap(), &"payment");
/// assert!(views.resolve("MINTING").is_err());
/// assert!(!views.is_exhaustive());
/// ```
#[derive(Debug, Clone)]
pub struct ViewRegistry<R> {
    renderers: BTreeMap<CheckoutStep, R>,
}

impl<R> Default for ViewRegistry<R> {
    fn default() -> Self {
        Self {
            renderers: BTreeMap::new(),
        }
    }
}

impl<R> ViewRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, step: CheckoutStep, renderer: R) -> Self {
        self.renderers.insert(step, renderer);
        self
    }

    pub fn get(&self, step: CheckoutStep) -> Result<&R> {
        self.renderers
            .get(&step)
            .ok_or_else(|| Error::NoRenderer(step.name().to_string()))
    }

    /// Renderer for a state name such as `"SELECT"`.
    pub fn resolve(&self, name: &str) -> Result<&R> {
        self.get(name.parse()?)
    }

    /// Renderer for the state of `snapshot`.
    pub fn render(&self, snapshot: &CheckoutSnapshot) -> Result<&R> {
        self.get(snapshot.step)
    }

    /// States that have no renderer.
    pub fn missing(&self) -> Vec<CheckoutStep> {
        CheckoutStep::ALL
            .into_iter()
            .filter(|step| !self.renderers.contains_key(step))
            .collect()
    }

    pub fn is_exhaustive(&self) -> bool {
        self.missing().is_empty()
    }
}
