//! Mattermost sink: REST v4 posts with message attachments.

pub mod error;
pub mod sink;

pub use {
    error::{Error, Result},
    sink::{MattermostSink, connect},
};
