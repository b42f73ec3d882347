//! Fixture files seeding the mock handler.
//!
//! A fixture is a JSON object keyed by resource type:
//!
//! ```json
//! { "articles": { "relationships": ["comments"], "attributes": ["title"],
//!                 "ignored": [], "records": [{ "id": 1, "title": "..." }] } }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::jsonapi::mock::MockHandler;
use crate::jsonapi::serializer::Serializer;
use crate::jsonapi::types::{value_to_id, Record};

const DEMO_FIXTURES: &str = include_str!("../fixtures/demo.json");

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Failed to read fixture file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid fixture JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid {resource_type} record at index {index}: {reason}")]
    InvalidRecord {
        resource_type: String,
        index: usize,
        reason: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeFixture {
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<String>,
    /// Added to the serializer's default ignored keys
    #[serde(default)]
    pub ignored: Vec<String>,
    #[serde(default)]
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fixtures {
    types: IndexMap<String, TypeFixture>,
}

impl Fixtures {
    /// The demo data compiled into the binary.
    pub fn demo() -> Result<Self, FixtureError> {
        Self::from_json(DEMO_FIXTURES)
    }

    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        let fixtures: Fixtures = serde_json::from_str(json)?;
        fixtures.validate()?;
        Ok(fixtures)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Load `path` when given, the embedded demo otherwise.
    pub fn load_or_demo(path: Option<&str>) -> Result<Self, FixtureError> {
        match path {
            Some(path) => {
                tracing::info!("Loading fixtures from {}", path);
                Self::load(path)
            }
            None => {
                tracing::info!("Loading embedded demo fixtures");
                Self::demo()
            }
        }
    }

    /// Every record needs a string or numeric id, unique within its type, and a
    /// `type` (when present) matching the collection it sits in.
    fn validate(&self) -> Result<(), FixtureError> {
        for (resource_type, fixture) in &self.types {
            let mut seen = HashSet::new();
            for (index, record) in fixture.records.iter().enumerate() {
                let invalid = |reason: String| FixtureError::InvalidRecord {
                    resource_type: resource_type.clone(),
                    index,
                    reason,
                };

                let id = record
                    .get("id")
                    .and_then(value_to_id)
                    .ok_or_else(|| invalid("missing string or numeric id".to_string()))?;

                if let Some(record_type) = record.get("type") {
                    if record_type.as_str() != Some(resource_type.as_str()) {
                        return Err(invalid(format!("type {} does not match collection", record_type)));
                    }
                }

                if !seen.insert(id.clone()) {
                    return Err(invalid(format!("duplicate id {}", id)));
                }
            }
        }
        Ok(())
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn counts(&self) -> Vec<(&str, usize)> {
        self.types
            .iter()
            .map(|(resource_type, fixture)| (resource_type.as_str(), fixture.records.len()))
            .collect()
    }

    /// One serializer per type, linking under `{prefix}/{type}`.
    pub fn serializers(&self, prefix: &str) -> IndexMap<String, Serializer> {
        self.types
            .iter()
            .map(|(resource_type, fixture)| {
                let serializer = Serializer::new(resource_type.as_str(), format!("{}/{}", prefix, resource_type))
                    .with_attributes(fixture.attributes.iter().cloned())
                    .with_relationships(fixture.relationships.iter().cloned())
                    .with_ignored_keys(fixture.ignored.iter().cloned());
                (resource_type.clone(), serializer)
            })
            .collect()
    }

    pub fn into_handler(self, prefix: &str) -> MockHandler {
        let serializers = self.serializers(prefix);
        let data = self
            .types
            .into_iter()
            .map(|(resource_type, fixture)| (resource_type, fixture.records))
            .collect();
        MockHandler::new(data, serializers)
    }
}
