//! IPC module for front-end communication
//!
//! A Unix domain socket carries length-prefixed JSON intents from a
//! front-end into the daemon and pushes change notifications back to
//! subscribed connections.

mod protocol;
mod server;

pub use protocol::{DaemonStatus, Notification, Request, Response};
pub use server::Server;
