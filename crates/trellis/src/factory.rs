//! Ordered factory chains.
//!
//! Elements, components and layouts are all resolved the same way: a list
//! of factories is consulted front to back and the first one that answers
//! wins. Registering a factory puts it at the front, so later registrations
//! override earlier ones for the inputs they handle.

use std::rc::Rc;

use crate::{
    component::Component,
    element::{ElementBehavior, ElementKind},
    layout::{Layout, LayoutGraph},
};

/// Produces the behavior of an element of the given kind and type.
pub type ElementFactory = dyn Fn(ElementKind, &str) -> Option<Rc<dyn ElementBehavior>>;

/// Produces the visual component for an element of the given kind and type.
pub type ComponentFactory = dyn Fn(ElementKind, &str) -> Option<Rc<dyn Component>>;

/// Produces a layout instance for a layout type tag and the graph it will
/// be bound to.
pub type LayoutFactory = dyn Fn(&str, &LayoutGraph) -> Option<Box<dyn Layout>>;

/// Most-recent-first list of factories.
pub struct FactoryChain<F: ?Sized> {
    factories: Vec<Box<F>>,
}

impl<F: ?Sized> Default for FactoryChain<F> {
    fn default() -> Self {
        Self {
            factories: Vec::new(),
        }
    }
}

impl<F: ?Sized> FactoryChain<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` ahead of every factory registered so far.
    pub fn register(&mut self, factory: Box<F>) {
        self.factories.insert(0, factory);
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Returns the first answer produced by `probe`, trying the most recently
    /// registered factory first.
    pub fn resolve<T>(&self, mut probe: impl FnMut(&F) -> Option<T>) -> Option<T> {
        self.factories.iter().find_map(|factory| probe(factory.as_ref()))
    }
}
