use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A serializable predicate over an aggregate's JSON document.
///
/// Field names are dot separated paths (`"address.city"`). Missing fields
/// evaluate as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    #[default]
    All,
    Eq { field: String, value: Value },
    Ne { field: String, value: Value },
    Gt { field: String, value: Value },
    Ge { field: String, value: Value },
    Lt { field: String, value: Value },
    Le { field: String, value: Value },
    /// Substring match on strings, element match on arrays.
    Contains { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    IsNull { field: String },
    And { filters: Vec<Filter> },
    Or { filters: Vec<Filter> },
    Not { filter: Box<Filter> },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ge {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Le {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull {
            field: field.into(),
        }
    }

    /// Combines two filters with a logical AND, flattening nested ANDs.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Self::All, other) => other,
            (this, Self::All) => this,
            (Self::And { mut filters }, Self::And { filters: more }) => {
                filters.extend(more);
                Self::And { filters }
            }
            (Self::And { mut filters }, other) => {
                filters.push(other);
                Self::And { filters }
            }
            (this, other) => Self::And {
                filters: vec![this, other],
            },
        }
    }

    /// Combines two filters with a logical OR, flattening nested ORs.
    pub fn or(self, other: Filter) -> Self {
        match (self, other) {
            (Self::Or { mut filters }, Self::Or { filters: more }) => {
                filters.extend(more);
                Self::Or { filters }
            }
            (Self::Or { mut filters }, other) => {
                filters.push(other);
                Self::Or { filters }
            }
            (this, other) => Self::Or {
                filters: vec![this, other],
            },
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Self::Not { filter } => *filter,
            other => Self::Not {
                filter: Box::new(other),
            },
        }
    }

    /// Returns true if the filter matches every document.
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Checks that every field path in the filter is usable.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::All => Ok(()),
            Self::Eq { field, .. }
            | Self::Ne { field, .. }
            | Self::Gt { field, .. }
            | Self::Ge { field, .. }
            | Self::Lt { field, .. }
            | Self::Le { field, .. }
            | Self::Contains { field, .. }
            | Self::In { field, .. }
            | Self::IsNull { field } => validate_field(field),
            Self::And { filters } | Self::Or { filters } => {
                filters.iter().try_for_each(Filter::validate)
            }
            Self::Not { filter } => filter.validate(),
        }
    }

    /// Evaluates the filter against a JSON document.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Self::All => true,
            Self::Eq { field, value } => {
                compare(lookup(document, field), value) == Some(Ordering::Equal)
            }
            Self::Ne { field, value } => {
                compare(lookup(document, field), value) != Some(Ordering::Equal)
            }
            Self::Gt { field, value } => {
                compare(lookup(document, field), value) == Some(Ordering::Greater)
            }
            Self::Ge { field, value } => matches!(
                compare(lookup(document, field), value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Lt { field, value } => {
                compare(lookup(document, field), value) == Some(Ordering::Less)
            }
            Self::Le { field, value } => matches!(
                compare(lookup(document, field), value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Contains { field, value } => match (lookup(document, field), value) {
                (Value::String(haystack), Value::String(needle)) => haystack.contains(needle),
                (Value::Array(items), needle) => items
                    .iter()
                    .any(|item| compare(item, needle) == Some(Ordering::Equal)),
                _ => false,
            },
            Self::In { field, values } => {
                let actual = lookup(document, field);
                values
                    .iter()
                    .any(|candidate| compare(actual, candidate) == Some(Ordering::Equal))
            }
            Self::IsNull { field } => lookup(document, field).is_null(),
            Self::And { filters } => filters.iter().all(|filter| filter.matches(document)),
            Self::Or { filters } => filters.iter().any(|filter| filter.matches(document)),
            Self::Not { filter } => !filter.matches(document),
        }
    }
}

/// Checks that a field path has no empty segments.
pub fn validate_field(field: &str) -> Result<(), String> {
    if field.trim().is_empty() {
        return Err("field name cannot be empty".to_string());
    }
    if field.split('.').any(|segment| segment.trim().is_empty()) {
        return Err(format!("field path `{field}` has an empty segment"));
    }
    Ok(())
}

static NULL: Value = Value::Null;

/// Resolves a dot separated field path. Missing fields resolve to `null`.
pub fn lookup<'a>(document: &'a Value, field: &str) -> &'a Value {
    let mut current = document;
    for segment in field.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment).unwrap_or(&NULL),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .unwrap_or(&NULL),
            _ => &NULL,
        };
    }
    current
}

/// Orders two JSON scalars of the same kind.
///
/// Numbers compare numerically regardless of integer/float representation.
/// Values of different kinds are unordered.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            (left == right).then_some(Ordering::Equal)
        }
        _ => None,
    }
}
