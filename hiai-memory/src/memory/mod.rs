//! Persistent key/value memory with a typed relation graph.
//!
//! Records are addressed by a unique key and carry a category, a priority and
//! two timestamps. Relations are directed, typed, weighted edges between
//! records; deleting a record removes every relation that names it.
//!
//! On top of the two tables the module offers:
//!
//! - **Search**: case-insensitive substring match with pluggable ranking
//!   ([`SearchStrategy`])
//! - **Graph queries**: depth-bounded neighborhoods, shortest paths and a
//!   whole-graph projection with clusters ([`MemoryGraph`])
//! - **Timeline**: records newest first, grouped into days ([`TimelineDay`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use hiai_memory::memory::{MemoryStore, SearchOptions, SearchStrategy};
//!
//! let store = MemoryStore::in_memory()?;
//!
//! store.save("auth-design", "The API uses JWT for auth", "project", 2)?;
//! store.save("auth-impl", "middleware in src/auth.rs", "project", 0)?;
//! store.link("auth-impl", "auth-design", "implements", 1.0)?;
//!
//! let ranked = store.search_advanced(
//!     "auth",
//!     SearchStrategy::ContextAware,
//!     &SearchOptions::new().limit(5),
//! )?;
//! let path = store.find_path("auth-impl", "auth-design")?;
//! ```

mod graph;
mod migrate;
mod proptest;
mod ranking;
mod relations;
mod schema;
mod store;
mod timeline;
mod traversal;
mod types;

pub use migrate::{import_legacy_file, parse_legacy, LegacyRecord};
pub use ranking::{context_score, rank, SearchOptions, SearchStrategy};
pub use schema::{get_schema_version, initialize_schema, is_initialized, SCHEMA_VERSION};
pub use store::MemoryStore;
pub use timeline::{group_by_day, TimelineDay, TimelineQuery};
pub use traversal::{connected_components, neighborhood, shortest_path, Adjacency};
pub use types::{
    Direction, MemoryGraph, MemoryRecord, MemoryStats, Relation, DEFAULT_CATEGORY, DEFAULT_WEIGHT,
};
