//! SQLite persistence gateway

mod connection;
mod values;

pub use connection::SqliteGateway;
