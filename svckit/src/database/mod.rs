pub mod connection;
pub mod cursor;
pub mod factory;
pub mod protocol;
pub mod query_builder;

#[cfg(test)]
pub(crate) mod test_support;

pub use connection::{ConnectOptions, DatabaseConnection, RethinkConnection};
pub use cursor::DocumentCursor;
pub use factory::{ClusterTopology, DatabaseFactory, Session};
pub use query_builder::Term;
