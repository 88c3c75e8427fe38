//! Append-only delegate registry.
//!
//! Upstream components publish to downstream consumers through a list
//! of handlers invoked synchronously on the producer's thread. All
//! handlers must be appended before the producer starts emitting; the
//! registry is moved into the producer and cannot change afterwards.

/// An ordered list of handlers for values of type `T`.
pub struct Fanout<T> {
    handlers: Vec<Box<dyn Fn(&T) + Send + Sync>>,
}

impl<T> Fanout<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Append a handler. Handlers run in append order.
    pub fn append(&mut self, handler: impl Fn(&T) + Send + Sync + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Invoke every handler with a reference to `value`.
    pub fn emit(&self, value: &T) {
        for handler in &self.handlers {
            handler(value);
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<T> Default for Fanout<T> {
    fn default() -> Self {
        Self::new()
    }
}
