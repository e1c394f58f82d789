//! In-memory document storage backend for docrepo.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `StoreBackend` trait. It evaluates filter and update documents in process,
//! which makes it a drop-in stand-in for a MongoDB server in tests and offline
//! development.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **MongoDB filter semantics** - Implicit equality, comparison and membership operators, dotted paths
//! - **Update operators** - `$set`, `$unset`, `$inc`, `$push` and `$pull`
//! - **`_id` uniqueness** - Duplicate ids are rejected the way the server rejects them
//!
//! # Quick Start
//!
//! ```ignore
//! use docrepo::{Repository, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::new();
//!     let users = Repository::new(&store, "mongolang", "users");
//!
//!     let user = users.insert_one(doc! { "username": "esnart" }).await?;
//!     assert!(user.get_object_id("_id").is_ok());
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrepo_memory;

pub mod evaluator;
pub mod store;
pub mod update;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
