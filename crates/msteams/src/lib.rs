//! Microsoft Teams sink.
//!
//! Posts an Adaptive Card per event to a channel's incoming webhook.

pub mod card;
pub mod error;
pub mod sink;

pub use {
    error::{Error, Result},
    sink::{TeamsSink, connect},
};
