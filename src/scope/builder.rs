use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::events::Bus;
use crate::scope::{Scope, ScopeMode};

/// Builder for a root [`Scope`].
///
/// ```rust,no_run
/// use scopekit::{Config, Scope, ScopeMode};
///
/// let pool = Config::default().build_pool().unwrap();
/// let scope = Scope::builder()
///     .name("io")
///     .mode(ScopeMode::Propagating)
///     .runtime(pool.handle().clone())
///     .build();
/// ```
pub struct ScopeBuilder {
    name: Arc<str>,
    mode: ScopeMode,
    bus: Option<Bus>,
    runtime: Option<Handle>,
    token: Option<CancellationToken>,
}

impl ScopeBuilder {
    pub(crate) fn new() -> Self {
        Self {
            name: Arc::from("scope"),
            mode: ScopeMode::Propagating,
            bus: None,
            runtime: None,
            token: None,
        }
    }

    /// Name used in events and logs.
    pub fn name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Failure propagation mode. Default: [`ScopeMode::Propagating`].
    pub fn mode(mut self, mode: ScopeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Publish lifecycle events to `bus` instead of a private one.
    pub fn bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Run tasks on `handle` instead of the ambient runtime.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Tie the scope to an existing token (the scope gets a child of it).
    pub fn parent_token(mut self, token: &CancellationToken) -> Self {
        self.token = Some(token.child_token());
        self
    }

    pub fn build(self) -> Scope {
        Scope::from_parts(
            self.name,
            self.mode,
            self.token.unwrap_or_default(),
            self.bus.unwrap_or_default(),
            self.runtime,
            None,
        )
    }
}
