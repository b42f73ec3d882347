use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

use super::query::QueryValue;

pub type Filters = BTreeMap<String, FilterValue>;

/// A filter condition value. Query strings only ever produce strings, lists and
/// maps; `coerce` turns the `"true"`, `"false"` and `"null"` spellings into
/// their native variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<FilterValue>),
    Map(BTreeMap<String, FilterValue>),
}

impl FilterValue {
    pub fn string(s: impl Into<String>) -> Self {
        FilterValue::String(s.into())
    }

    /// Coerce boolean/null spellings recursively through lists and maps.
    pub fn coerce(self) -> Self {
        match self {
            FilterValue::String(s) => match s.as_str() {
                "true" => FilterValue::Bool(true),
                "false" => FilterValue::Bool(false),
                "null" => FilterValue::Null,
                _ => FilterValue::String(s),
            },
            FilterValue::List(items) => {
                FilterValue::List(items.into_iter().map(FilterValue::coerce).collect())
            }
            FilterValue::Map(map) => {
                FilterValue::Map(map.into_iter().map(|(k, v)| (k, v.coerce())).collect())
            }
            other => other,
        }
    }

    /// JavaScript-style truthiness: null, false, 0 and "" are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            FilterValue::Null => false,
            FilterValue::Bool(b) => *b,
            FilterValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
            FilterValue::String(s) => !s.is_empty(),
            FilterValue::List(_) | FilterValue::Map(_) => true,
        }
    }

    /// String form used for id comparisons.
    pub fn as_id(&self) -> Option<String> {
        match self {
            FilterValue::String(s) => Some(s.clone()),
            FilterValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Integer interpretation, used when the record field is numeric.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FilterValue::Number(n) => n.as_i64(),
            FilterValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Whether a record field value satisfies this condition.
    pub fn matches(&self, field: Option<&Value>) -> bool {
        if let FilterValue::List(options) = self {
            return options.iter().any(|option| option.matches(field));
        }

        match field {
            Some(Value::String(s)) => matches!(self, FilterValue::String(v) if v == s),
            Some(Value::Object(obj)) => match self {
                FilterValue::Map(nested) => nested
                    .iter()
                    .all(|(key, condition)| condition.matches(obj.get(key))),
                condition if condition.is_truthy() => {
                    let id = obj.get("id").and_then(super::types::value_to_id);
                    id.is_some() && id == condition.as_id()
                }
                _ => false,
            },
            None | Some(Value::Null) => !self.is_truthy(),
            Some(Value::Bool(b)) => matches!(self, FilterValue::Bool(v) if v == b),
            Some(Value::Number(n)) => match self.as_integer() {
                Some(parsed) => n.as_i64() == Some(parsed),
                None => false,
            },
            Some(Value::Array(_)) => false,
        }
    }
}

impl From<QueryValue> for FilterValue {
    fn from(value: QueryValue) -> Self {
        match value {
            QueryValue::String(s) => FilterValue::String(s),
            QueryValue::List(items) => {
                FilterValue::List(items.into_iter().map(FilterValue::from).collect())
            }
            QueryValue::Map(map) => FilterValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, FilterValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::String(s.to_string())
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        FilterValue::Number(n.into())
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        FilterValue::Bool(b)
    }
}

/// Build handler filters from the raw `filter` query value, coercing as we go.
pub fn filters_from_query(value: Option<&QueryValue>) -> Filters {
    match value {
        Some(QueryValue::Map(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), FilterValue::from(v.clone()).coerce()))
            .collect(),
        _ => Filters::new(),
    }
}
