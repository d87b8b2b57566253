//! Data models for kino-catalog
//!
//! - Raw external movie records accepted by ingestion
//! - Ingestion state machine and report
//! - Composed read views

pub mod composed;
pub mod ingest_report;
pub mod ingest_session;
pub mod raw_record;

pub use composed::{ComposedMovie, Section};
pub use ingest_report::{IngestReport, LinkedPerson};
pub use ingest_session::{IngestSession, IngestState, StateTransition};
pub use raw_record::{RawGenre, RawImage, RawMovieRecord, RawPerson};
