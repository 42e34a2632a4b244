//! Storage-independent query model.
//!
//! Filters, selectors and options are plain serializable data. They double as
//! cache key material and as input to the in-process evaluator in
//! [`evaluate`].

pub mod evaluate;
mod filter;
mod options;
mod selector;

pub use filter::{compare, lookup, validate_field, Filter};
pub use options::{Page, QueryOptions, SortDirection, SortOrder};
pub use selector::Selector;
