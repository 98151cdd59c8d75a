//! Slack sink.
//!
//! Posts event notifications through the Slack Web API and, when an
//! assistant is configured, answers "ask assistant" button clicks received
//! over Socket Mode.

pub mod api;
pub mod blocks;
pub mod error;
pub mod listener;
pub mod sink;
pub mod socket;

pub use {
    api::SlackApi,
    error::{Error, Result},
    listener::{InteractiveListener, ListenerState},
    sink::{SlackSink, connect, connect_with},
    socket::{Envelope, EventSource, SocketModeSource},
};
