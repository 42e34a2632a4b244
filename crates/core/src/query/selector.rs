use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::filter::{lookup, validate_field};

/// Projection applied by the `*_projection` reads.
///
/// `Field` yields the raw value of one field. `Fields` yields an object with
/// one entry per requested path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "fields", rename_all = "snake_case")]
pub enum Selector {
    Field(String),
    Fields(Vec<String>),
}

impl Selector {
    pub fn field(field: impl Into<String>) -> Self {
        Self::Field(field.into())
    }

    pub fn fields<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self::Fields(fields.into_iter().map(Into::into).collect())
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Field(field) => validate_field(field),
            Self::Fields(fields) if fields.is_empty() => {
                Err("selector must name at least one field".to_string())
            }
            Self::Fields(fields) => fields.iter().try_for_each(|field| validate_field(field)),
        }
    }

    /// Projects a document.
    pub fn apply(&self, document: &Value) -> Value {
        match self {
            Self::Field(field) => lookup(document, field).clone(),
            Self::Fields(fields) => {
                let projected: Map<String, Value> = fields
                    .iter()
                    .map(|field| (field.clone(), lookup(document, field).clone()))
                    .collect();
                Value::Object(projected)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_field_yields_raw_value() {
        let doc = json!({"name": "Tester", "age": 30});

        assert_eq!(Selector::field("name").apply(&doc), json!("Tester"));
    }

    #[test]
    fn test_multiple_fields_yield_object() {
        let doc = json!({"name": "Tester", "age": 30, "address": {"city": "X"}});

        let projected = Selector::fields(["name", "address.city"]).apply(&doc);

        assert_eq!(projected, json!({"name": "Tester", "address.city": "X"}));
    }

    #[test]
    fn test_validate() {
        assert!(Selector::fields(Vec::<String>::new()).validate().is_err());
        assert!(Selector::field("").validate().is_err());
        assert!(Selector::field("name").validate().is_ok());
    }
}
