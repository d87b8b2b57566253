//! HTTP API handlers for kino-catalog
//!
//! Handlers parse requests and delegate; relational logic lives in services.

pub mod health;
pub mod ingest;
pub mod movies;
pub mod reviews;
pub mod users;

pub use health::health_routes;
pub use ingest::ingest_routes;
pub use movies::movie_routes;
pub use reviews::review_routes;
pub use users::user_routes;
