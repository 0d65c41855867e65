//! Transaction scope and event batching.
//!
//! While a [`Transaction`] is open, structural notifications are buffered
//! in the controller's [`PendingBatch`] instead of being fired. The guard
//! restores the previous batching state when dropped, including on early
//! return through `?`.

use std::ops::{Deref, DerefMut};

use trellis_core::identifier::Id;

use crate::{controller::Controller, element::Element};

/// Notifications buffered during a transaction.
#[derive(Debug, Default)]
pub(crate) struct PendingBatch {
    pub added: Vec<Id>,
    pub removed: Vec<Element>,
    pub changed: Vec<Id>,
}

impl PendingBatch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Scoped batching guard over a controller.
pub(crate) struct Transaction<'a> {
    controller: &'a mut Controller,
    previous: bool,
}

impl<'a> Transaction<'a> {
    pub fn begin(controller: &'a mut Controller) -> Self {
        let previous = controller.set_in_transaction(true);
        Self {
            controller,
            previous,
        }
    }
}

impl Deref for Transaction<'_> {
    type Target = Controller;

    fn deref(&self) -> &Self::Target {
        self.controller
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.controller
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.controller.set_in_transaction(self.previous);
    }
}
