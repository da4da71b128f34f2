pub mod connection;
pub mod helpers;
mod migrations;
mod repositories;
pub mod store;

pub use connection::Database;
pub use store::EventStore;
