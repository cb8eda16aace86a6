//! # Frame Fan-out
//!
//! Synchronous notification of registered consumers after each recorded frame.
//!
//! Consumers run in registration order on the ingest task. There is no
//! queueing between them: a slow consumer holds up the ones after it and
//! the next frame.

use std::fmt;

use super::store::TelemetryStore;

/// Something that reacts to a newly recorded frame
///
/// The store is passed in so consumers pull the fields they need from the
/// latest frame. Closures taking `&TelemetryStore` implement this trait.
#[cfg_attr(test, mockall::automock)]
pub trait FrameConsumer: Send {
    /// Called once per recorded frame
    fn on_frame(&mut self, store: &TelemetryStore);
}

impl<F> FrameConsumer for F
where
    F: FnMut(&TelemetryStore) + Send,
{
    fn on_frame(&mut self, store: &TelemetryStore) {
        self(store)
    }
}

/// Ordered list of frame consumers
#[derive(Default)]
pub struct Fanout {
    consumers: Vec<Box<dyn FrameConsumer>>,
}

impl fmt::Debug for Fanout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fanout")
            .field("consumers", &self.consumers.len())
            .finish()
    }
}

impl Fanout {
    /// Create a fan-out with no consumers
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a consumer after all existing ones
    pub fn register<C: FrameConsumer + 'static>(&mut self, consumer: C) {
        self.consumers.push(Box::new(consumer));
    }

    /// Notify every consumer, in registration order
    ///
    /// Returns the number of consumers notified.
    pub fn notify(&mut self, store: &TelemetryStore) -> usize {
        for consumer in &mut self.consumers {
            consumer.on_frame(store);
        }
        self.consumers.len()
    }

    /// Number of registered consumers
    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    /// Whether no consumer is registered
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}
