//! Test Helper Utilities
//!
//! Shared utilities for kino-catalog integration tests

pub mod db_utils;

#[allow(unused_imports)]
pub use db_utils::{count_rows, create_test_db, create_test_state, movie_genre_names};
