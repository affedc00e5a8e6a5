//! Intent handler capability and registry.
//!
//! A handler turns one remote match into domain slot values. Handlers are
//! registered under the intent name the service reports; matches for intents
//! without a registered handler are skipped silently, since the service may
//! know intents this process does not implement yet.
//!
//! The registry is built once at startup and treated as read-only afterwards.
//! It replaces the original deployment style of scanning a directory for
//! handler modules at process start: registration here is explicit code.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::accumulator::{Accumulator, FieldMap};

/// Everything a handler may consult when extracting slots from one match.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    /// The atomic input string the match belongs to.
    pub input: &'a str,
    /// The substring the service judged to match the intent.
    pub utterance: &'a str,
    /// Captured slot values, positionally ordered.
    pub arguments: &'a [String],
    /// The pattern that produced the match.
    pub pattern: &'a str,
    /// Caller-supplied field defaults. Handlers must not rely on mutating it.
    pub template: &'a Accumulator,
}

/// Per-intent slot extraction capability.
///
/// Implementations must be pure with respect to their inputs: they receive
/// the current per-item field map by value and return the updated map, and
/// they read the reference template without changing it.
pub trait IntentHandler: Send + Sync {
    /// The intent name this handler answers for.
    fn intent(&self) -> &str;

    /// Extract slot values for one match, returning the updated field map.
    ///
    /// Values may be scalars or lists; the merger coerces both shapes when
    /// folding the map into the accumulator.
    fn extract(&self, cx: &MatchContext<'_>, fields: FieldMap) -> FieldMap;
}

/// Immutable-after-init table of intent handlers, keyed by intent name.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn IntentHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("intents", &self.intents())
            .finish()
    }
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a collection of handlers.
    pub fn with_handlers(handlers: impl IntoIterator<Item = Arc<dyn IntentHandler>>) -> Self {
        let mut registry = Self::new();
        for handler in handlers {
            registry.register(handler);
        }
        registry
    }

    /// Register a handler under its intent name, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn IntentHandler>) {
        let intent = handler.intent().to_owned();
        debug!(intent = %intent, "intent handler registered");
        self.handlers.insert(intent, handler);
    }

    /// Look up the handler for an intent name.
    pub fn get(&self, intent: &str) -> Option<&Arc<dyn IntentHandler>> {
        self.handlers.get(intent)
    }

    /// Whether a handler is registered for an intent name.
    pub fn contains(&self, intent: &str) -> bool {
        self.handlers.contains_key(intent)
    }

    /// Number of registered handlers.
    pub fn count(&self) -> usize {
        self.handlers.len()
    }

    /// Registered intent names in sorted order.
    pub fn intents(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}
