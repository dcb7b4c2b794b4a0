//! Room-based synchronization server for a shared text buffer.
//!
//! Clients join a room over a websocket, receive the current buffer from an
//! existing member, and relay full-buffer changes to everyone else in the room.

pub mod config;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;
pub mod websocket;
pub mod ws;

pub use config::Config;
pub use routes::create_app;
pub use state::AppState;
