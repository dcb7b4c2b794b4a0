pub mod handler;
pub mod connection;
pub mod msg_join_handler;
pub mod msg_leave_handler;
pub mod msg_code_change_handler;
pub mod msg_sync_code_handler;
pub mod msg_relay_handler;
pub mod msg_ping_handler;

pub use connection::{ConnState, ConnectionHandler, Flow};
