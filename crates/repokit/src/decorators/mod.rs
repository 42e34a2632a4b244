//! Repository decorators.
//!
//! Each decorator implements [`Repository`](repokit_core::storage::Repository)
//! over an `Arc<dyn Repository<T>>` holding the next layer inward. The
//! registry builds them in a fixed order, so a call flows
//!
//! ```text
//! Logging -> Guard -> Interception -> Validation -> DomainEvents -> Caching -> storage
//! ```
//!
//! Guard checks arguments as the caller passed them. Filters an interceptor
//! rewrites are checked again by the interception layer.
//!
//! Lifecycle calls (`is_disposed`, `dispose`) are forwarded to the storage
//! repository so every layer agrees on the disposed state.

mod caching;
mod events;
mod guard;
mod interception;
mod logging;
mod validation;

pub use caching::CachingRepository;
pub use events::DomainEventsRepository;
pub use guard::GuardRepository;
pub use interception::InterceptionRepository;
pub use logging::LoggingRepository;
pub use validation::ValidationRepository;
