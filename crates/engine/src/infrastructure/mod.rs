//! Infrastructure: storage backends, external clients, configuration.

pub mod clock;
pub mod config;
pub mod content;
pub mod gamification;
pub mod memory;
pub mod ports;
pub mod sqlite;
