//! Wire contracts shared between the engine and its clients.
//!
//! - [`envelope`] - broadcast envelope and topic naming
//! - [`messages`] - WebSocket client/server messages
//! - [`requests`] - HTTP request bodies and query strings
//! - [`responses`] - HTTP response DTOs and the error body

pub mod envelope;
pub mod messages;
pub mod requests;
pub mod responses;

pub use envelope::{channel_name, PlayEnvelope};
pub use messages::{ClientMessage, ServerMessage};
pub use responses::ErrorBody;
