//! # Kino Common Library
//!
//! Shared code for the Kino catalog services:
//! - Error type shared by every crate
//! - Configuration loading and root folder resolution
//! - Database initialization (schema and default settings)
//! - Catalog event types and the EventBus

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
