//! Database initialization and the shared schema

pub mod init;

pub use init::*;
