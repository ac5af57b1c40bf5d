//! Helpdesk Protocol
//!
//! Shared types for the support desk REST API and its duplex event channel.
//! Channel frames are JSON objects of the form `{"event": ..., "data": ...}`.

use uuid::Uuid;

pub mod client;
pub mod rest;
pub mod server;
pub mod types;

pub use client::{ClientEvent, DEFAULT_ROOM};
pub use rest::{Envelope, MessageQuery, MessagesPage, ReplyRequest, StatusRequest};
pub use server::ServerEvent;
pub use types::*;

/// Generate a new unique ID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
