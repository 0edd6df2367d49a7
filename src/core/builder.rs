use std::sync::Arc;

use crate::{
    core::Config,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

use super::kernel::Kernel;

/// Builder for constructing a [`Kernel`].
pub struct KernelBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl KernelBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (task and scope lifecycle, channel
    /// closure, shutdown) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the kernel: event bus, subscriber workers, alive tracker, the
    /// bus listener and the root scope.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Arc<Kernel> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        Arc::new(Kernel::new_internal(self.cfg, bus, subs))
    }
}
