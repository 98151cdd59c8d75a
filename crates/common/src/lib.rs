//! Types shared by every kvnts crate: the notification payload and its
//! well-known label keys.

pub mod payload;

pub use payload::{Labels, Payload, labels};
