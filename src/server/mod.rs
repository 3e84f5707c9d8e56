//! WebSocket transport and accept loop

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use listener::SignalServer;
