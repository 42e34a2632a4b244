//! Pure query evaluation over JSON documents.
//!
//! Storage backends that cannot translate a [`Filter`] natively load the
//! candidate documents and run them through these functions.

use std::cmp::Ordering;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::filter::{compare, lookup};
use super::{Filter, Page, QueryOptions, SortDirection, SortOrder};
use crate::storage::{RepositoryError, Result};

/// Serializes an entity into the document form queries run against.
pub fn to_document<T: Serialize>(entity: &T) -> Result<Value> {
    serde_json::to_value(entity).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

/// Deserializes an entity from its stored document.
pub fn from_document<T: DeserializeOwned>(document: Value) -> Result<T> {
    serde_json::from_value(document).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

/// Filters, sorts and pages a set of documents.
pub fn select(documents: Vec<Value>, filter: &Filter, options: Option<&QueryOptions>) -> Vec<Value> {
    let mut matched: Vec<Value> = documents
        .into_iter()
        .filter(|document| filter.matches(document))
        .collect();

    let Some(options) = options else {
        return matched;
    };

    sort(&mut matched, &options.sort);
    paginate(matched, options.page)
}

/// Stable multi-key sort. Values of different JSON kinds order as
/// null < bool < number < string < array < object.
pub fn sort(documents: &mut [Value], orders: &[SortOrder]) {
    if orders.is_empty() {
        return;
    }

    documents.sort_by(|left, right| {
        for order in orders {
            let ordering = total_order(lookup(left, &order.field), lookup(right, &order.field));
            let ordering = match order.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

pub fn paginate(documents: Vec<Value>, page: Option<Page>) -> Vec<Value> {
    match page {
        Some(page) => documents
            .into_iter()
            .skip(page.offset())
            .take(page.size)
            .collect(),
        None => documents,
    }
}

/// Sums a numeric field. Null or missing values are skipped.
pub fn sum_field(documents: &[Value], field: &str) -> Result<f64> {
    Ok(numeric_values(documents, field)?.into_iter().sum())
}

/// Averages a numeric field. Returns `None` when no document has a value.
pub fn average_field(documents: &[Value], field: &str) -> Result<Option<f64>> {
    let values = numeric_values(documents, field)?;
    if values.is_empty() {
        return Ok(None);
    }
    Ok(Some(values.iter().sum::<f64>() / values.len() as f64))
}

fn numeric_values(documents: &[Value], field: &str) -> Result<Vec<f64>> {
    let mut values = Vec::with_capacity(documents.len());
    for document in documents {
        match lookup(document, field) {
            Value::Null => continue,
            Value::Number(number) => values.push(number.as_f64().ok_or_else(|| {
                RepositoryError::InvalidData(format!("Field `{field}` is not a finite number"))
            })?),
            other => {
                return Err(RepositoryError::InvalidData(format!(
                    "Field `{field}` is not numeric: {other}"
                )))
            }
        }
    }
    Ok(values)
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn total_order(left: &Value, right: &Value) -> Ordering {
    kind_rank(left)
        .cmp(&kind_rank(right))
        .then_with(|| compare(left, right).unwrap_or(Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> Vec<Value> {
        vec![
            json!({"name": "Carla", "age": 41}),
            json!({"name": "Ana", "age": 30}),
            json!({"name": "Bruno", "age": 30}),
            json!({"name": "Dora", "age": null}),
        ]
    }

    fn names(documents: &[Value]) -> Vec<&str> {
        documents
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_select_without_options_keeps_order() {
        let selected = select(people(), &Filter::ge("age", 30), None);

        assert_eq!(names(&selected), vec!["Carla", "Ana", "Bruno"]);
    }

    #[test]
    fn test_multi_key_sort() {
        let options = QueryOptions::new()
            .sort_by("age")
            .sort_by_descending("name");

        let selected = select(people(), &Filter::All, Some(&options));

        assert_eq!(names(&selected), vec!["Dora", "Bruno", "Ana", "Carla"]);
    }

    #[test]
    fn test_pagination() {
        let options = QueryOptions::new().sort_by("name").page(2, 3);

        let selected = select(people(), &Filter::All, Some(&options));

        assert_eq!(names(&selected), vec!["Dora"]);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let options = QueryOptions::new().page(5, 3);

        assert!(select(people(), &Filter::All, Some(&options)).is_empty());
    }

    #[test]
    fn test_sum_skips_nulls() {
        assert_eq!(sum_field(&people(), "age").unwrap(), 101.0);
    }

    #[test]
    fn test_average() {
        let average = average_field(&people(), "age").unwrap().unwrap();

        assert!((average - 101.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_average_of_nothing_is_none() {
        assert_eq!(average_field(&[], "age").unwrap(), None);
    }

    #[test]
    fn test_sum_of_text_field_fails() {
        let result = sum_field(&people(), "name");

        assert!(matches!(result, Err(RepositoryError::InvalidData(_))));
    }
}
