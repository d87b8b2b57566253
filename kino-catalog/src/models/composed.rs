//! Composed read views

use serde::{Deserialize, Serialize};

use crate::db::images::ImageRef;
use crate::db::movies::{CastMember, GenreRef, Movie};

/// A view section backed by a collaborator that may be unreachable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Available { items: Vec<T> },
    Unavailable { reason: String },
}

impl<T> Section<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Section::Available { .. })
    }

    /// Items if available, empty otherwise
    pub fn items(&self) -> &[T] {
        match self {
            Section::Available { items } => items,
            Section::Unavailable { .. } => &[],
        }
    }
}

/// Movie with its cast, genres and images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedMovie {
    pub movie: Movie,
    pub people: Vec<CastMember>,
    pub genres: Vec<GenreRef>,
    pub images: Section<ImageRef>,
}
