use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::filters::Filters;

/// A storage-side record: `id`, `type`, attributes and relationship fields
/// flattened into one JSON object.
pub type Record = Map<String, Value>;

/// Per-type attribute allow-lists from `fields[type]=a,b`.
pub type Fields = BTreeMap<String, Vec<String>>;

pub type Links = IndexMap<String, String>;

/// Minimal `{id, type}` reference used in relationship data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
}

impl ResourceIdentifier {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
        }
    }

    /// Build an identifier from a record-like JSON object, stringifying numeric ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = value_to_id(obj.get("id")?)?;
        let resource_type = obj.get("type")?.as_str()?.to_string();
        Some(Self { id, resource_type })
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({ "id": self.id, "type": self.resource_type })
    }
}

/// Relationship linkage: a to-many list, or a to-one identifier that may be null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipData {
    Many(Vec<ResourceIdentifier>),
    One(Option<ResourceIdentifier>),
}

impl RelationshipData {
    pub fn identifiers(&self) -> Vec<&ResourceIdentifier> {
        match self {
            RelationshipData::Many(items) => items.iter().collect(),
            RelationshipData::One(Some(item)) => vec![item],
            RelationshipData::One(None) => vec![],
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RelationshipData::Many(items) => {
                Value::Array(items.iter().map(ResourceIdentifier::to_value).collect())
            }
            RelationshipData::One(Some(item)) => item.to_value(),
            RelationshipData::One(None) => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMeta {
    pub total: i64,
}

/// An embedded relationship as rendered inside a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// `None` means the key is absent (count-only relationships);
    /// `Some(One(None))` renders as `"data": null`.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<RelationshipData>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub links: Links,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RelationshipMeta>,
}

/// A wire resource. Identifier-only resources leave the optional parts empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<IndexMap<String, Relationship>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

impl Resource {
    /// Strip attributes, relationships and links.
    pub fn to_identifier_resource(&self) -> Resource {
        Resource {
            id: self.id.clone(),
            resource_type: self.resource_type.clone(),
            attributes: None,
            relationships: None,
            links: None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.as_ref().and_then(|a| a.get(name))
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.as_ref().and_then(|r| r.get(name))
    }
}

impl From<ResourceIdentifier> for Resource {
    fn from(identifier: ResourceIdentifier) -> Self {
        Resource {
            id: identifier.id,
            resource_type: identifier.resource_type,
            attributes: None,
            relationships: None,
            links: None,
        }
    }
}

/// Payload of a create request; the handler assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<IndexMap<String, Relationship>>,
}

impl NewResource {
    pub fn into_resource(self, id: impl Into<String>) -> Resource {
        Resource {
            id: id.into(),
            resource_type: self.resource_type,
            attributes: Some(self.attributes),
            relationships: self.relationships,
            links: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

pub const DEFAULT_PAGE_LIMIT: i64 = 5;

impl Default for PagingParams {
    fn default() -> Self {
        Self {
            limit: Some(DEFAULT_PAGE_LIMIT),
            offset: Some(0),
        }
    }
}

impl PagingParams {
    pub fn unbounded() -> Self {
        Self {
            limit: None,
            offset: None,
        }
    }

    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }
}

/// The normalized query handed to every handler operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(default)]
    pub page: PagingParams,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub sort: Vec<String>,
    #[serde(default)]
    pub fields: Fields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDetails {
    pub total_items: usize,
    pub page_items: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes: Option<Vec<Resource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub item: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes: Option<Vec<Resource>>,
}

impl ItemDetails {
    pub fn new(item: Resource) -> Self {
        Self {
            item: Some(item),
            includes: None,
        }
    }
}

/// Result of relationship traversal: to-one yields an item, to-many a list.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipDetails {
    Item(ItemDetails),
    List(ListDetails),
}

/// Primary document data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Many(Vec<Resource>),
    One(Option<Resource>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub status: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLinks {
    pub first: Option<String>,
    pub last: Option<String>,
    pub prev: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagingMeta {
    pub offset: i64,
    pub limit: i64,
    pub total: usize,
    pub links: PageLinks,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PagingMeta>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Meta {
    pub fn is_empty(&self) -> bool {
        self.page.is_none() && self.other.is_empty()
    }
}

/// errors/meta/included spliced into the top level of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentExtras {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorObject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<Resource>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonApiVersion {
    pub version: String,
}

impl Default for JsonApiVersion {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub jsonapi: JsonApiVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PrimaryData>,
    #[serde(flatten)]
    pub extra: DocumentExtras,
}

/// Request body envelope: `{ "data": ... }`.
#[derive(Debug, Clone, Deserialize)]
pub struct DataPayload<T> {
    pub data: T,
}

/// Stringify an id value; numbers render without quotes, strings pass through.
pub fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_id(&value).ok_or_else(|| serde::de::Error::custom("id must be a string or number"))
}

// Keeps an explicit `null` distinct from a missing key.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_ids_deserialize_as_strings() {
        let identifier: ResourceIdentifier =
            serde_json::from_value(json!({ "id": 7, "type": "articles" })).unwrap();
        assert_eq!(identifier.id, "7");
    }

    #[test]
    fn null_relationship_data_is_kept() {
        let rel: Relationship = serde_json::from_value(json!({ "data": null })).unwrap();
        assert_eq!(rel.data, Some(RelationshipData::One(None)));
        assert_eq!(serde_json::to_value(&rel).unwrap(), json!({ "data": null }));

        let rel: Relationship = serde_json::from_value(json!({ "meta": { "total": 3 } })).unwrap();
        assert!(rel.data.is_none());
    }

    #[test]
    fn document_flattens_extras() {
        let doc = Document {
            jsonapi: JsonApiVersion::default(),
            data: Some(PrimaryData::Many(vec![])),
            extra: DocumentExtras {
                included: Some(vec![]),
                ..Default::default()
            },
        };
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({ "jsonapi": { "version": "1.0" }, "data": [], "included": [] })
        );
    }
}
