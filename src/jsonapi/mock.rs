// In-memory model handler backed by fixture data

use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use rand::Rng;
use serde_json::Value;
use std::cmp::Ordering;
use tokio::sync::RwLock;

use super::filters::Filters;
use super::handler::{HandlerError, HandlerResult, ModelHandler};
use super::serializer::Serializer;
use super::types::{
    value_to_id, Fields, ItemDetails, ListDetails, NewResource, PagingParams, Params, Record,
    RelationshipData, RelationshipDetails, Resource, ResourceIdentifier,
};

type Collection = IndexMap<String, Record>;

const CREATED_ID_MAX: u32 = 999;
const CREATED_ID_ATTEMPTS: usize = 32;

fn created_id(n: u32) -> String {
    format!("created-{}", n)
}

/// Model handler holding every record in memory, one insertion-ordered
/// collection per type. Used by the demo server, the CLI and tests.
pub struct MockHandler {
    store: RwLock<IndexMap<String, Collection>>,
    serializers: IndexMap<String, Serializer>,
}

impl MockHandler {
    pub fn new(
        data: IndexMap<String, Vec<Record>>,
        serializers: IndexMap<String, Serializer>,
    ) -> Self {
        let mut store = IndexMap::new();

        for (resource_type, records) in data {
            let mut collection = Collection::new();
            for mut record in records {
                let Some(id) = record.get("id").and_then(value_to_id) else {
                    tracing::warn!("Skipping {} record without an id", resource_type);
                    continue;
                };
                if !record.contains_key("type") {
                    record.insert("type".to_string(), Value::String(resource_type.clone()));
                }
                collection.insert(id, record);
            }
            tracing::debug!("Seeded {} {} records", collection.len(), resource_type);
            store.insert(resource_type, collection);
        }

        Self {
            store: RwLock::new(store),
            serializers,
        }
    }

    pub fn serializer(&self, resource_type: &str) -> HandlerResult<&Serializer> {
        self.serializers
            .get(resource_type)
            .ok_or_else(HandlerError::not_found)
    }

    fn serialize_record(&self, record: &Record, fields: Option<&Fields>) -> Option<Resource> {
        let resource_type = record.get("type").and_then(Value::as_str)?;
        let serializer = self.serializers.get(resource_type)?;
        Some(serializer.serialize(record, fields))
    }

    fn serialize_items(&self, records: &[&Record], fields: &Fields) -> Vec<Resource> {
        records
            .iter()
            .filter_map(|record| self.serialize_record(record, Some(fields)))
            .collect()
    }

    /// Resolve `include` names against each record's relationships, deduplicated
    /// by type and id in first-seen order. Dangling references are skipped.
    fn load_includes(
        &self,
        store: &IndexMap<String, Collection>,
        records: &[&Record],
        include: &[String],
        fields: &Fields,
    ) -> Vec<Resource> {
        let mut seen = IndexSet::new();
        let mut includes = vec![];

        for record in records {
            let Some(serialized) = self.serialize_record(record, None) else {
                continue;
            };
            for name in include {
                let Some(data) = serialized.relationship(name).and_then(|r| r.data.as_ref()) else {
                    continue;
                };
                for identifier in data.identifiers() {
                    let Some(target) = lookup(store, identifier) else {
                        tracing::debug!(
                            "Include {} references missing {} {}",
                            name,
                            identifier.resource_type,
                            identifier.id
                        );
                        continue;
                    };
                    let key = (identifier.resource_type.clone(), identifier.id.clone());
                    if !seen.insert(key) {
                        continue;
                    }
                    if let Some(resource) = self.serialize_record(target, Some(fields)) {
                        includes.push(resource);
                    }
                }
            }
        }

        includes
    }

    fn list_details(
        &self,
        store: &IndexMap<String, Collection>,
        records: Vec<&Record>,
        params: &Params,
    ) -> ListDetails {
        let total_items = records.len();
        let page = paginate(records, &params.page);

        ListDetails {
            total_items,
            page_items: self.serialize_items(&page, &params.fields),
            includes: Some(self.load_includes(store, &page, &params.include, &params.fields)),
            extra: None,
        }
    }

    /// Current linkage of a declared relationship, or 404.
    fn relationship_data(
        &self,
        resource_type: &str,
        record: &Record,
        relationship: &str,
    ) -> HandlerResult<Option<RelationshipData>> {
        let serializer = self.serializer(resource_type)?;
        if !serializer.has_relationship(relationship) {
            return Err(HandlerError::not_found());
        }
        let serialized = serializer.serialize(record, None);
        Ok(serialized
            .relationship(relationship)
            .and_then(|r| r.data.clone()))
    }

    /// Apply `change` to a to-many relationship; anything else is left alone.
    async fn modify_many(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        change: impl FnOnce(&mut Vec<ResourceIdentifier>),
    ) -> HandlerResult<()> {
        let mut store = self.store.write().await;
        let record = store
            .get_mut(resource_type)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(HandlerError::not_found)?;

        match self.relationship_data(resource_type, record, relationship)? {
            Some(RelationshipData::Many(mut identifiers)) => {
                change(&mut identifiers);
                record.insert(
                    relationship.to_string(),
                    RelationshipData::Many(identifiers).to_value(),
                );
            }
            _ => {
                tracing::debug!(
                    "{} {} relationship {} is not to-many, leaving it unchanged",
                    resource_type,
                    id,
                    relationship
                );
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ModelHandler for MockHandler {
    async fn list(&self, resource_type: &str, params: &Params) -> HandlerResult<ListDetails> {
        let store = self.store.read().await;
        let collection = store.get(resource_type).ok_or_else(HandlerError::not_found)?;

        let mut records = filter_items(collection.values(), &params.filters);
        sort_items(&mut records, &params.sort);

        Ok(self.list_details(&store, records, params))
    }

    async fn search(
        &self,
        resource_type: &str,
        attribute: &str,
        value: &str,
        params: &Params,
    ) -> HandlerResult<ListDetails> {
        let store = self.store.read().await;
        let collection = store.get(resource_type).ok_or_else(HandlerError::not_found)?;

        let records: Vec<&Record> = collection
            .values()
            .filter(|record| {
                record
                    .get(attribute)
                    .and_then(Value::as_str)
                    .map(|s| s.contains(value))
                    .unwrap_or(false)
            })
            .collect();

        Ok(self.list_details(&store, records, params))
    }

    async fn get(&self, resource_type: &str, id: &str, params: &Params) -> HandlerResult<ItemDetails> {
        let store = self.store.read().await;
        let record = store
            .get(resource_type)
            .and_then(|c| c.get(id))
            .ok_or_else(HandlerError::not_found)?;

        let item = self
            .serialize_record(record, Some(&params.fields))
            .ok_or_else(HandlerError::not_found)?;

        Ok(ItemDetails {
            item: Some(item),
            includes: Some(self.load_includes(&store, &[record], &params.include, &params.fields)),
        })
    }

    async fn list_relationships(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        params: &Params,
    ) -> HandlerResult<RelationshipDetails> {
        let store = self.store.read().await;
        let record = store
            .get(resource_type)
            .and_then(|c| c.get(id))
            .ok_or_else(HandlerError::not_found)?;

        match self.relationship_data(resource_type, record, relationship)? {
            Some(RelationshipData::Many(identifiers)) => {
                let related = identifiers.iter().filter_map(|i| lookup(&store, i));
                let mut records = filter_items(related, &params.filters);
                sort_items(&mut records, &params.sort);
                Ok(RelationshipDetails::List(self.list_details(&store, records, params)))
            }
            Some(RelationshipData::One(Some(identifier))) => {
                let target = lookup(&store, &identifier);
                Ok(RelationshipDetails::Item(ItemDetails {
                    item: target.and_then(|t| self.serialize_record(t, Some(&params.fields))),
                    includes: target.map(|t| {
                        self.load_includes(&store, &[t], &params.include, &params.fields)
                    }),
                }))
            }
            Some(RelationshipData::One(None)) | None => Ok(RelationshipDetails::Item(ItemDetails {
                item: None,
                includes: None,
            })),
        }
    }

    async fn create(&self, resource_type: &str, data: NewResource) -> HandlerResult<ItemDetails> {
        let serializer = self.serializer(resource_type)?;
        if data.resource_type != resource_type {
            return Err(HandlerError::status(
                409,
                format!("Cannot create {} in {}", data.resource_type, resource_type),
            ));
        }

        let mut store = self.store.write().await;
        let collection = store.entry(resource_type.to_string()).or_default();

        let mut rng = rand::thread_rng();
        let id = std::iter::repeat_with(|| created_id(rng.gen_range(0..=CREATED_ID_MAX)))
            .take(CREATED_ID_ATTEMPTS)
            .find(|id| !collection.contains_key(id))
            .or_else(|| {
                (0..=CREATED_ID_MAX)
                    .map(created_id)
                    .find(|id| !collection.contains_key(id))
            })
            .ok_or_else(|| {
                HandlerError::status(409, format!("No free ids left for {}", resource_type))
            })?;

        let record = serializer.deserialize(&data.into_resource(id.clone()));
        let item = serializer.serialize(&record, None);
        collection.insert(id, record);

        Ok(ItemDetails::new(item))
    }

    async fn add_relationships(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        identifiers: Vec<ResourceIdentifier>,
    ) -> HandlerResult<()> {
        self.modify_many(resource_type, id, relationship, |current| {
            current.extend(identifiers)
        })
        .await
    }

    async fn update(&self, resource_type: &str, id: &str, data: Resource) -> HandlerResult<ItemDetails> {
        let serializer = self.serializer(resource_type)?;
        let mut store = self.store.write().await;
        let record = store
            .get_mut(resource_type)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(HandlerError::not_found)?;

        let mut patch = serializer.deserialize(&data);
        patch.remove("id");
        patch.remove("type");

        for (key, value) in patch {
            if serializer.has_relationship(&key) {
                record.insert(key, value);
                continue;
            }
            match record.get_mut(&key) {
                Some(existing) => merge_value(existing, value),
                None => {
                    record.insert(key, value);
                }
            }
        }

        Ok(ItemDetails::new(serializer.serialize(record, None)))
    }

    async fn update_relationships(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        data: RelationshipData,
    ) -> HandlerResult<()> {
        let mut store = self.store.write().await;
        let record = store
            .get_mut(resource_type)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(HandlerError::not_found)?;

        self.relationship_data(resource_type, record, relationship)?;
        record.insert(relationship.to_string(), data.to_value());

        Ok(())
    }

    async fn destroy(&self, resource_type: &str, id: &str) -> HandlerResult<()> {
        let mut store = self.store.write().await;
        store
            .get_mut(resource_type)
            .and_then(|c| c.shift_remove(id))
            .map(|_| ())
            .ok_or_else(HandlerError::not_found)
    }

    async fn destroy_relationships(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        identifiers: Vec<ResourceIdentifier>,
    ) -> HandlerResult<()> {
        self.modify_many(resource_type, id, relationship, |current| {
            current.retain(|item| !identifiers.iter().any(|i| i.id == item.id))
        })
        .await
    }
}

fn lookup<'a>(
    store: &'a IndexMap<String, Collection>,
    identifier: &ResourceIdentifier,
) -> Option<&'a Record> {
    store
        .get(&identifier.resource_type)
        .and_then(|c| c.get(&identifier.id))
}

fn filter_items<'a>(records: impl Iterator<Item = &'a Record>, filters: &Filters) -> Vec<&'a Record> {
    records
        .filter(|record| {
            filters
                .iter()
                .all(|(field, condition)| condition.matches(record.get(field)))
        })
        .collect()
}

/// Stable multi-key sort; `-field` sorts descending.
fn sort_items(records: &mut [&Record], sort: &[String]) {
    if sort.is_empty() {
        return;
    }

    records.sort_by(|a, b| {
        sort.iter()
            .map(|key| {
                let (field, descending) = match key.strip_prefix('-') {
                    Some(field) => (field, true),
                    None => (key.as_str(), false),
                };
                let ordering = compare_values(a.get(field), b.get(field));
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => locale_compare(a, b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

// Mixed kinds: missing and null first, containers last.
fn kind_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) | Some(Value::Object(_)) => 4,
    }
}

// Case-insensitive first; on ties lowercase sorts before uppercase.
fn locale_compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

fn paginate<T>(items: Vec<T>, page: &PagingParams) -> Vec<T> {
    match (page.offset, page.limit) {
        (Some(offset), Some(limit)) if limit >= 0 => items
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit as usize)
            .collect(),
        _ => items,
    }
}

/// Deep merge where `patch` wins: objects merge key by key, everything else is replaced.
fn merge_value(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}
