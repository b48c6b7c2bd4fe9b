//! Transport layer: HTTP routes, WebSocket subscriptions and the connection
//! registry that backs broadcasting.

pub mod connections;
pub mod http;
pub mod websocket;

pub use connections::ConnectionManager;
