//! Sink orchestration.
//!
//! Maps configured notification channels to live, reusable sink clients,
//! caches them with TTL and capacity bounds, rebuilds them when their
//! configuration changes, and fans notifications out to them.

pub mod dispatch;
pub mod error;
pub mod factory;
pub mod identity;
pub mod registry;
pub mod sink;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod testing;

pub use {
    dispatch::{DeliveryStatus, DispatchReport, Dispatcher, SinkOutcome},
    error::{Error, Result},
    factory::SinkFactory,
    identity::SinkIdentity,
    registry::{Insert, SinkRegistry},
    sink::{BuiltSink, ListenerHandle, Sink, SinkConnector},
};
