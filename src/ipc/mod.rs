//! IPC module for client-daemon communication

mod protocol;
mod server;

pub use protocol::{error_codes, DaemonStatus, Notification, Request, Response};
pub use server::Server;
