use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::types::{
    Fields, Links, Record, Relationship, RelationshipData, RelationshipMeta, Resource,
    ResourceIdentifier,
};

/// Keys never rendered as attributes unless a fieldset asks for them.
pub const DEFAULT_IGNORED_KEYS: &[&str] = &["extra", "createdAt"];

/// `sourceId`, `externalSourceId`: ids from an upstream system, left as-is.
pub fn is_source_id_reference(key: &str) -> bool {
    key == "sourceId" || key.ends_with("SourceId")
}

/// Keys like `articleId` hold numeric foreign keys in storage and strings on the wire.
pub fn is_internal_id_reference(key: &str) -> bool {
    key.ends_with("Id") && !is_source_id_reference(key)
}

/// Storage → wire: numeric foreign keys become strings.
pub fn stringify_internal_id(key: &str, value: Value) -> Value {
    match value {
        Value::Number(n) if is_internal_id_reference(key) => Value::String(n.to_string()),
        other => other,
    }
}

/// Wire → storage: numeric strings for foreign keys become integers again.
pub fn parse_internal_id(key: &str, value: Value) -> Value {
    match value {
        Value::String(s) if is_internal_id_reference(key) => match s.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(s),
        },
        other => other,
    }
}

/// Maps storage records of one resource type to wire resources and back.
#[derive(Debug, Clone)]
pub struct Serializer {
    name: String,
    prefix: String,
    attributes: Vec<String>,
    relationships: Vec<String>,
    ignored_keys: Vec<String>,
}

impl Serializer {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            attributes: vec![],
            relationships: vec![],
            ignored_keys: DEFAULT_IGNORED_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Informational attribute list; serialization does not filter by it.
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_relationships<I, S>(mut self, relationships: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationships = relationships.into_iter().map(Into::into).collect();
        self
    }

    /// Extend the default ignored keys.
    pub fn with_ignored_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn relationships(&self) -> &[String] {
        &self.relationships
    }

    pub fn ignored_keys(&self) -> &[String] {
        &self.ignored_keys
    }

    pub fn has_relationship(&self, name: &str) -> bool {
        self.relationships.iter().any(|r| r == name)
    }

    pub fn serialize(&self, record: &Record, fields: Option<&Fields>) -> Resource {
        let fieldset = Fieldset::new(fields.and_then(|f| f.get(&self.name)));

        let id = record
            .get("id")
            .and_then(super::types::value_to_id)
            .unwrap_or_default();

        let mut attributes = Map::new();
        for (key, value) in record {
            if key == "id" || key == "type" || self.has_relationship(key) {
                continue;
            }
            let ignored = self.ignored_keys.iter().any(|k| k == key);
            if ignored && !fieldset.requests(key) {
                continue;
            }
            if !fieldset.keeps(key) {
                continue;
            }
            attributes.insert(key.clone(), stringify_internal_id(key, value.clone()));
        }

        let self_link = format!("{}/{}", self.prefix, id);

        let mut relationships = IndexMap::new();
        for name in &self.relationships {
            if !fieldset.keeps(name) {
                continue;
            }
            relationships.insert(name.clone(), self.relationship(&self_link, name, record.get(name)));
        }

        let mut links = Links::new();
        links.insert("self".to_string(), self_link);

        Resource {
            id,
            resource_type: self.name.clone(),
            attributes: Some(attributes),
            relationships: if self.relationships.is_empty() {
                None
            } else {
                Some(relationships)
            },
            links: Some(links),
        }
    }

    fn relationship(&self, self_link: &str, name: &str, value: Option<&Value>) -> Relationship {
        let mut links = Links::new();
        links.insert("self".to_string(), format!("{}/relationships/{}", self_link, name));
        links.insert("related".to_string(), format!("{}/{}", self_link, name));

        if let Some(Value::Number(total)) = value {
            return Relationship {
                data: None,
                links,
                meta: Some(RelationshipMeta {
                    total: total.as_i64().unwrap_or_default(),
                }),
            };
        }

        let data = match value {
            Some(Value::Array(items)) => RelationshipData::Many(
                items
                    .iter()
                    .filter_map(ResourceIdentifier::from_value)
                    .collect(),
            ),
            Some(item) => RelationshipData::One(ResourceIdentifier::from_value(item)),
            None => RelationshipData::One(None),
        };

        Relationship {
            data: Some(data),
            links,
            meta: None,
        }
    }

    pub fn deserialize(&self, resource: &Resource) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), Value::String(resource.id.clone()));
        record.insert("type".to_string(), Value::String(resource.resource_type.clone()));

        if let Some(attributes) = &resource.attributes {
            for (key, value) in attributes {
                record.insert(key.clone(), parse_internal_id(key, value.clone()));
            }
        }

        if let Some(relationships) = &resource.relationships {
            for (name, relationship) in relationships {
                if let Some(data) = &relationship.data {
                    record.insert(name.clone(), data.to_value());
                }
            }
        }

        record
    }
}

/// Parsed `fields[type]` entry: plain names select, `-name` drops.
struct Fieldset<'a> {
    include: Vec<&'a str>,
    exclude: Vec<&'a str>,
}

impl<'a> Fieldset<'a> {
    fn new(fields: Option<&'a Vec<String>>) -> Self {
        let mut include = vec![];
        let mut exclude = vec![];
        for field in fields.into_iter().flatten() {
            match field.strip_prefix('-') {
                Some(name) => exclude.push(name),
                None => include.push(field.as_str()),
            }
        }
        Self { include, exclude }
    }

    fn requests(&self, key: &str) -> bool {
        self.include.contains(&key)
    }

    fn keeps(&self, key: &str) -> bool {
        if self.exclude.contains(&key) {
            return false;
        }
        self.include.is_empty() || self.include.contains(&key)
    }
}
