//! Catalog services
//!
//! The resolution and association engine (resolver, ledger, reconciler,
//! orchestrator, composition reader) plus the user and review services.

pub mod association_ledger;
pub mod composition_reader;
pub mod entity_resolver;
pub mod image_store;
pub mod ingest_orchestrator;
pub mod reconciler;
pub mod reviews;
pub mod user_accounts;

pub use association_ledger::{AssociationKind, AssociationLedger, AssociationRef, Link, LinkOp};
pub use composition_reader::CompositionReader;
pub use entity_resolver::{EntityAttributes, EntityResolver, Resolution};
pub use image_store::{HttpImageSource, ImageStore, ImageSync, SqliteImageStore};
pub use ingest_orchestrator::IngestOrchestrator;
pub use reconciler::{ReconcileDiff, Reconciler};
pub use reviews::Reviews;
pub use user_accounts::{RoleAssignment, RoleChangeOutcome, RoleOp, UserAccounts};
