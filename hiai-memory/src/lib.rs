//! # hiai-memory
//!
//! Persistent memory for assistant tool servers: a durable key/value store
//! with a typed, weighted relation graph on top.
//!
//! ## Core Components
//!
//! - **Memory**: records, relations, graph traversal, ranking and timelines
//!   backed by a single SQLite file
//! - **Tools**: JSON-schema tool definitions and handlers over the store
//! - **Service**: one store handle per process, async dispatch and graceful
//!   shutdown
//!
//! ## Example
//!
//! ```rust,ignore
//! use hiai_memory::{MemoryService, StoreConfig};
//! use serde_json::json;
//!
//! let service = MemoryService::new(StoreConfig::from_env())?;
//!
//! service
//!     .call("save_memory", json!({ "key": "api-auth", "value": "JWT", "category": "project" }))
//!     .await?;
//! let found = service
//!     .call("search_memories_advanced", json!({ "query": "auth", "strategy": "context_aware" }))
//!     .await?;
//!
//! service.run_until_shutdown().await?;
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod service;
pub mod tools;

// Re-exports for convenience
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use memory::{
    Direction, MemoryGraph, MemoryRecord, MemoryStats, MemoryStore, Relation, SearchOptions,
    SearchStrategy, TimelineDay, TimelineQuery,
};
pub use service::{shutdown_signal, MemoryService};
pub use tools::{ToolCategory, ToolHandler, ToolOutput, ToolRegistry, ToolSpec};
