//! Helpdesk Sync
//!
//! Keeps an admin's view of support tickets and the open conversation in
//! step with the backend. REST loads and replies go through `SupportApi`,
//! pushed events arrive over the duplex `Channel`, and both are folded into
//! one state by the session actor.

pub mod channel;
pub mod config;
pub mod error;
pub mod logging;
pub mod message_store;
pub mod reconcile;
pub mod rest;
pub mod session_actor;
pub mod session_command;
pub mod ticket_store;

pub use channel::{Channel, ChannelTasks};
pub use config::{ConfigOverrides, SyncConfig};
pub use error::{ApiError, ChannelError, ConfigError, LoggingError, SessionError};
pub use logging::{init_logging, init_logging_with, LogFormat, LogSettings, LoggingHandle};
pub use message_store::MessageStore;
pub use reconcile::{transition, Effect, Input, Notification, RequestOp, SyncState};
pub use rest::{HttpSupportApi, SupportApi};
pub use session_actor::{SupportSession, SupportSessionHandle, SyncSnapshot};
pub use ticket_store::{filter_tickets, TicketFilter, TicketStore};
