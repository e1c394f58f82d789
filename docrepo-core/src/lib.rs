//! A thin repository layer over document database collections.
//!
//! This crate is the core of the docrepo project and provides:
//!
//! - **Error handling** ([`error`]) - The error taxonomy shared by every crate
//! - **Documents** ([`document`]) - Object id helpers and typed projection through [`document::Model`]
//! - **Filters and updates** ([`query`]) - Builders for filter and update documents
//! - **Store backend abstraction** ([`backend`]) - The trait storage engines implement
//! - **Repositories** ([`repository`]) - Per-collection CRUD operations, untyped and typed
//!
//! # Example
//!
//! ```ignore
//! use docrepo::{Repository, query::Update};
//! use bson::doc;
//!
//! let users = Repository::new(&store, "mongolang", "users");
//! let user = users.insert_one(doc! { "username": "esnart" }).await?;
//! let id = user.get_object_id("_id")?.to_hex();
//! let user = users.update_by_id(&id, Update::push("phone", "0955404864")).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrepo_core;

pub mod backend;
pub mod document;
pub mod error;
pub mod query;
pub mod repository;

pub use repository::{Repository, TypedRepository};
