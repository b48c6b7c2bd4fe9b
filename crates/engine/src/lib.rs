//! LivePlay Engine library.
//!
//! Server-side runtime for hosted live sessions: lifecycle, participants,
//! time bank, decisions, reveals and the live board.
//!
//! ## Structure
//!
//! - `use_cases/` - Operations callers invoke, one service per concern
//! - `infrastructure/` - Ports, storage backends, external clients, config
//! - `api/` - HTTP and WebSocket entry points
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod use_cases;

/// Shared harness for unit and router tests.
#[cfg(test)]
pub mod test_fixtures;

pub use app::App;
