use serde::{Deserialize, Serialize};

use super::filter::validate_field;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: String,
    pub direction: SortDirection,
}

/// A 1-based page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    pub index: usize,
    pub size: usize,
}

impl Page {
    /// Number of items skipped before this page.
    pub fn offset(&self) -> usize {
        self.index.saturating_sub(1).saturating_mul(self.size)
    }
}

/// Sorting and paging applied to `find_*` queries.
///
/// Sort keys are applied in order; later keys break ties of earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<Page>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an ascending sort key.
    pub fn sort_by(mut self, field: impl Into<String>) -> Self {
        self.sort.push(SortOrder {
            field: field.into(),
            direction: SortDirection::Ascending,
        });
        self
    }

    /// Adds a descending sort key.
    pub fn sort_by_descending(mut self, field: impl Into<String>) -> Self {
        self.sort.push(SortOrder {
            field: field.into(),
            direction: SortDirection::Descending,
        });
        self
    }

    pub fn page(mut self, index: usize, size: usize) -> Self {
        self.page = Some(Page { index, size });
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        for order in &self.sort {
            validate_field(&order.field)?;
        }
        if let Some(page) = self.page {
            if page.index == 0 {
                return Err("page index starts at 1".to_string());
            }
            if page.size == 0 {
                return Err("page size must be greater than zero".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(Page { index: 1, size: 10 }.offset(), 0);
        assert_eq!(Page { index: 3, size: 10 }.offset(), 20);
    }

    #[test]
    fn test_validate_rejects_zero_page() {
        assert!(QueryOptions::new().page(0, 10).validate().is_err());
        assert!(QueryOptions::new().page(1, 0).validate().is_err());
        assert!(QueryOptions::new().page(1, 10).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_sort_field() {
        assert!(QueryOptions::new().sort_by("").validate().is_err());
    }

    #[test]
    fn test_empty_options_serialize_compactly() {
        let json = serde_json::to_string(&QueryOptions::new()).unwrap();

        assert_eq!(json, "{}");
    }
}
