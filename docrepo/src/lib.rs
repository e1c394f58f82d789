//! Main docrepo crate: a thin repository layer over document database
//! collections.
//!
//! This crate is the primary entry point for users of docrepo. It re-exports
//! the core types from the sub-crates and gives access to the storage backends.
//!
//! # Features
//!
//! - **Per-collection repositories** - Find, insert, update, soft delete and delete with one call each
//! - **Post-mutation reads** - Every write returns the document as it is after the write
//! - **Typed projection** - Decode results into serde structs through [`TypedRepository`]
//! - **Bounded operations** - A single per-operation timeout applies to every call
//! - **Multiple backends** - MongoDB, plus an in-memory engine for tests
//!
//! # Quick Start
//!
//! ```ignore
//! use docrepo::{prelude::*, memory::InMemoryStore};
//! use bson::oid::ObjectId;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     pub id: Option<ObjectId>,
//!     pub username: String,
//! }
//!
//! impl Model for User {
//!     fn collection_name() -> &'static str { "users" }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryStore::builder().build().await.unwrap();
//!     let users = TypedRepository::<_, User>::new(&store, "mongolang");
//!
//!     let user = users
//!         .insert_one(&User { id: None, username: "esnart".into() })
//!         .await
//!         .unwrap();
//!
//!     let user = users
//!         .update(Filter::by_id(user.id.unwrap()), Update::push("phone", "0955404864"))
//!         .await
//!         .unwrap();
//!
//!     println!("Updated user: {:?}", user);
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-process engine for development and testing
//! - [`mongodb`] - MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docrepo_core::{backend, document, error, query, repository};
pub use docrepo_core::{Repository, TypedRepository};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docrepo_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docrepo_mongodb::{
        Connector, DEFAULT_CONNECT_TIMEOUT, MongoConfig, MongoConfigBuilder, MongoDbStore, MongoDbStoreBuilder,
        config, connect,
    };
}
