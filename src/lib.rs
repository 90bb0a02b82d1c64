//! # Joinery
//!
//! Criteria compiler and row reconstruction engine for relationship-aware
//! SQL loads, built for the `may` coroutine runtime.
//!
//! A declarative [`Criteria`] tree is compiled against a [`Schema`] into a
//! single SELECT with one LEFT JOIN per loaded relationship. The flat rows
//! that come back are folded into an [`EntityGraph`] by
//! [`unjoin::unjoin_rows`], and relationships flagged `@loadSeparately` are
//! resolved with follow-up queries by [`Loader`].

pub mod config;
pub mod convert;
pub mod criteria;
pub mod error;
pub mod executor;
pub mod graph;
pub mod keys;
pub mod load;
pub mod metrics;
pub mod persist;
pub mod query;
pub mod schema;
pub mod store;
pub mod unjoin;
pub mod value;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_support;

pub use config::{Dialect, OrmConfig};
pub use criteria::Criteria;
pub use error::OrmError;
pub use executor::{MayPostgresExecutor, QueryExecutor};
pub use graph::EntityGraph;
pub use load::Loader;
pub use schema::Schema;
