//! Raw external movie record
//!
//! Accepts both snake_case and the camelCase field names used by the
//! upstream parser payloads. Genres may be bare strings or `{ "name": ... }`.

use serde::{Deserialize, Serialize};

use crate::db::images::NewImage;
use crate::error::{CatalogError, CatalogResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMovieRecord {
    #[serde(alias = "externalId", alias = "extId")]
    pub external_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "releaseYear", alias = "year")]
    pub release_year: Option<i64>,
    #[serde(default)]
    pub people: Vec<RawPerson>,
    #[serde(default)]
    pub genres: Vec<RawGenre>,
    #[serde(default)]
    pub images: Vec<RawImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPerson {
    #[serde(alias = "personExternalId", alias = "externalId", alias = "extId")]
    pub external_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawGenre {
    Name(String),
    Object {
        #[serde(alias = "genreName")]
        name: String,
    },
}

impl RawGenre {
    pub fn name(&self) -> &str {
        match self {
            RawGenre::Name(name) | RawGenre::Object { name } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImage {
    #[serde(alias = "imageUrl")]
    pub url: String,
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
}

impl RawPerson {
    /// Role label as stored: trimmed and lower-cased
    pub fn normalized_role(&self) -> String {
        self.role.trim().to_lowercase()
    }
}

impl RawMovieRecord {
    /// Reject malformed records before anything is written
    pub fn validate(&self) -> CatalogResult<()> {
        if self.external_id.trim().is_empty() {
            return Err(CatalogError::InvalidInput(
                "Movie external id must not be empty".to_string(),
            ));
        }

        for (index, person) in self.people.iter().enumerate() {
            if person.external_id.trim().is_empty() {
                return Err(CatalogError::InvalidInput(format!(
                    "people[{}]: external id must not be empty",
                    index
                )));
            }
            if person.normalized_role().is_empty() {
                return Err(CatalogError::InvalidInput(format!(
                    "people[{}] ({}): role must not be empty",
                    index, person.external_id
                )));
            }
        }

        for (index, genre) in self.genres.iter().enumerate() {
            if genre.name().trim().is_empty() {
                return Err(CatalogError::InvalidInput(format!(
                    "genres[{}]: name must not be empty",
                    index
                )));
            }
        }

        for (index, image) in self.images.iter().enumerate() {
            if image.url.trim().is_empty() {
                return Err(CatalogError::InvalidInput(format!(
                    "images[{}]: url must not be empty",
                    index
                )));
            }
        }

        Ok(())
    }

    pub fn new_images(&self) -> Vec<NewImage> {
        self.images
            .iter()
            .map(|image| NewImage {
                url: image.url.trim().to_string(),
                kind: image
                    .kind
                    .as_deref()
                    .map(str::trim)
                    .filter(|kind| !kind.is_empty())
                    .unwrap_or("poster")
                    .to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_payload() {
        let json = r#"{
            "extId": "tt1",
            "title": "A",
            "releaseYear": 2001,
            "people": [{"personExternalId": "p1", "name": "Alice", "role": "Actor"}],
            "genres": ["Drama", {"genreName": "Comedy"}],
            "images": [{"imageUrl": "http://img/1.jpg", "type": "still"}]
        }"#;

        let record: RawMovieRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.external_id, "tt1");
        assert_eq!(record.release_year, Some(2001));
        assert_eq!(record.people[0].normalized_role(), "actor");
        let names: Vec<_> = record.genres.iter().map(RawGenre::name).collect();
        assert_eq!(names, vec!["Drama", "Comedy"]);
        assert_eq!(record.new_images()[0].kind, "still");
        record.validate().unwrap();
    }

    #[test]
    fn test_missing_collections_default_empty() {
        let record: RawMovieRecord = serde_json::from_str(r#"{"external_id": "tt2"}"#).unwrap();
        assert!(record.people.is_empty());
        assert!(record.genres.is_empty());
        assert!(record.images.is_empty());
    }

    #[test]
    fn test_blank_role_rejected() {
        let record: RawMovieRecord = serde_json::from_str(
            r#"{"external_id": "tt1", "people": [{"external_id": "p1", "role": "  "}]}"#,
        )
        .unwrap();
        assert!(matches!(record.validate(), Err(CatalogError::InvalidInput(_))));
    }

    #[test]
    fn test_image_kind_defaults_to_poster() {
        let record: RawMovieRecord = serde_json::from_str(
            r#"{"external_id": "tt1", "images": [{"url": " http://img/2.jpg "}]}"#,
        )
        .unwrap();
        let images = record.new_images();
        assert_eq!(images[0].url, "http://img/2.jpg");
        assert_eq!(images[0].kind, "poster");
    }
}
