//! Core building blocks for the repokit repository pipeline.
//!
//! Everything in this crate is either a plain data type, a trait that the
//! `repokit` crate implements, or a pure function. No I/O happens here.

pub mod cache;
pub mod entity;
pub mod interception;
pub mod options;
pub mod query;
pub mod serde;
pub mod storage;
pub mod validation;
