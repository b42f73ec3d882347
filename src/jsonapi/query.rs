//! Bracket-style query strings (`filter[article][id]=4&include=a,b`).
//!
//! Parsing produces a nested [`QueryValue`] tree in request order, and
//! [`QueryString::stringify`] writes it back without percent encoding so paging
//! links can echo the caller's query with only `page[offset]` changed.

use indexmap::IndexMap;
use std::fmt::Write;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("Invalid value for {param}: {value}")]
    InvalidInteger { param: String, value: String },

    #[error("Expected a single value for {0}")]
    ExpectedScalar(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    String(String),
    List(Vec<QueryValue>),
    Map(IndexMap<String, QueryValue>),
}

impl QueryValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, QueryValue>> {
        match self {
            QueryValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Flatten a scalar or list into strings, splitting each on commas.
    pub fn split_csv(&self) -> Vec<String> {
        match self {
            QueryValue::String(s) => split_csv(s),
            QueryValue::List(items) => items.iter().flat_map(QueryValue::split_csv).collect(),
            QueryValue::Map(_) => vec![],
        }
    }

    /// HTML-entity encode every key and string value.
    pub fn entity_encoded(&self) -> QueryValue {
        match self {
            QueryValue::String(s) => QueryValue::String(encode_entities(s)),
            QueryValue::List(items) => {
                QueryValue::List(items.iter().map(QueryValue::entity_encoded).collect())
            }
            QueryValue::Map(map) => QueryValue::Map(
                map.iter()
                    .map(|(k, v)| (encode_entities(k), v.entity_encoded()))
                    .collect(),
            ),
        }
    }
}

/// The parsed top level of a request query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryString {
    entries: IndexMap<String, QueryValue>,
}

impl QueryString {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut query = QueryString::default();
        let Some(raw) = raw else { return query };

        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            let segments = split_key(&key);
            if segments[0].is_empty() {
                continue;
            }
            insert(&mut query.entries, &segments, value.into_owned());
        }

        query
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<QueryValue> {
        self.entries.shift_remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read `name[key]` as an integer, e.g. `page[limit]`.
    pub fn nested_integer(&self, name: &str, key: &str) -> Result<Option<i64>, QueryError> {
        let Some(value) = self.get(name).and_then(QueryValue::as_map).and_then(|m| m.get(key)) else {
            return Ok(None);
        };
        let param = format!("{}[{}]", name, key);
        let raw = value
            .as_str()
            .ok_or_else(|| QueryError::ExpectedScalar(param.clone()))?;
        if raw.is_empty() {
            return Ok(None);
        }
        raw.trim()
            .parse()
            .map(Some)
            .map_err(|_| QueryError::InvalidInteger { param, value: raw.to_string() })
    }

    pub fn entity_encoded(&self) -> QueryString {
        QueryString {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (encode_entities(k), v.entity_encoded()))
                .collect(),
        }
    }

    /// Set `page[offset]`, creating the `page` map if needed.
    pub fn with_page_offset(&self, offset: i64) -> QueryString {
        let mut next = self.clone();
        let page = next
            .entries
            .entry("page".to_string())
            .or_insert_with(|| QueryValue::Map(IndexMap::new()));
        if !matches!(page, QueryValue::Map(_)) {
            *page = QueryValue::Map(IndexMap::new());
        }
        if let QueryValue::Map(page) = page {
            page.insert("offset".to_string(), QueryValue::String(offset.to_string()));
        }
        next
    }

    /// Serialize as `a[b]=c&d[0]=e`, leaving values unescaped.
    pub fn stringify(&self) -> String {
        let mut parts = Vec::new();
        for (key, value) in &self.entries {
            stringify_into(&mut parts, key, value);
        }
        parts.join("&")
    }
}

fn stringify_into(parts: &mut Vec<String>, prefix: &str, value: &QueryValue) {
    match value {
        QueryValue::String(s) => parts.push(format!("{}={}", prefix, s)),
        QueryValue::List(items) => {
            for (i, item) in items.iter().enumerate() {
                stringify_into(parts, &format!("{}[{}]", prefix, i), item);
            }
        }
        QueryValue::Map(map) => {
            for (key, item) in map {
                stringify_into(parts, &format!("{}[{}]", prefix, key), item);
            }
        }
    }
}

/// `filter[a][b]` → `["filter", "a", "b"]`; malformed brackets keep the raw key.
fn split_key(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        match stripped.find(']') {
            Some(close) => {
                segments.push(stripped[..close].to_string());
                rest = &stripped[close + 1..];
            }
            None => return vec![key.to_string()],
        }
    }
    if !rest.is_empty() {
        return vec![key.to_string()];
    }
    segments
}

fn is_list_segment(segment: &str) -> bool {
    segment.is_empty() || segment.chars().all(|c| c.is_ascii_digit())
}

fn insert(target: &mut IndexMap<String, QueryValue>, segments: &[String], value: String) {
    let key = segments[0].clone();
    let rest = &segments[1..];

    if rest.is_empty() {
        match target.get_mut(&key) {
            None => {
                target.insert(key, QueryValue::String(value));
            }
            Some(existing) => push_value(existing, value),
        }
        return;
    }

    if is_list_segment(&rest[0]) {
        let entry = target
            .entry(key)
            .or_insert_with(|| QueryValue::List(vec![]));
        push_value(entry, value);
        return;
    }

    let entry = target
        .entry(key)
        .or_insert_with(|| QueryValue::Map(IndexMap::new()));
    if !matches!(entry, QueryValue::Map(_)) {
        *entry = QueryValue::Map(IndexMap::new());
    }
    if let QueryValue::Map(map) = entry {
        insert(map, rest, value);
    }
}

/// Append to a list, promoting a lone string to a two-element list.
fn push_value(entry: &mut QueryValue, value: String) {
    let previous = std::mem::replace(entry, QueryValue::List(vec![]));
    *entry = match previous {
        QueryValue::List(mut items) => {
            items.push(QueryValue::String(value));
            QueryValue::List(items)
        }
        QueryValue::String(s) => {
            QueryValue::List(vec![QueryValue::String(s), QueryValue::String(value)])
        }
        map @ QueryValue::Map(_) => {
            tracing::debug!("Ignoring scalar query value for nested parameter");
            map
        }
    };
}

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Encode markup-significant and non-ASCII characters as hex entities (`&` → `&#x26;`).
pub fn encode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' | '<' | '>' | '"' | '\'' | '`' => {
                let _ = write!(out, "&#x{:X};", c as u32);
            }
            c if !c.is_ascii() => {
                let _ = write!(out, "&#x{:X};", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
