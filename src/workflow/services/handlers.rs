//! Action-to-handler registry.

use crate::workflow::{domain::StepAction, ports::StepHandler};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Maps each [`StepAction`] to the handler that executes it.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<StepAction, Arc<dyn StepHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `action`, returning the handler it replaced.
    pub fn register(
        &mut self,
        action: StepAction,
        handler: Arc<dyn StepHandler>,
    ) -> Option<Arc<dyn StepHandler>> {
        self.handlers.insert(action, handler)
    }

    /// Builder form of [`HandlerRegistry::register`].
    #[must_use]
    pub fn with_handler(mut self, action: StepAction, handler: Arc<dyn StepHandler>) -> Self {
        self.handlers.insert(action, handler);
        self
    }

    /// Returns the handler for `action`.
    #[must_use]
    pub fn get(&self, action: StepAction) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(&action).cloned()
    }

    /// Reports whether `action` has a handler.
    #[must_use]
    pub fn contains(&self, action: StepAction) -> bool {
        self.handlers.contains_key(&action)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<_> = self.handlers.keys().map(|action| action.as_str()).collect();
        actions.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("actions", &actions)
            .finish()
    }
}
