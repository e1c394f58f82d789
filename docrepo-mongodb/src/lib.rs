//! MongoDB backend implementation for docrepo.
//!
//! This crate provides the connector and a MongoDB-based implementation of the
//! `StoreBackend` trait built on the official async driver. Filters and update
//! specifications are handed to the server unchanged.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docrepo = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! [`connect`] takes a connection string and a timeout (20 seconds by
//! default) and returns a store only once the cluster has answered a `ping`.
//! [`Connector`] does the same from a [`MongoConfig`], which can also be read
//! from the environment.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::{Repository, mongodb::{connect, DEFAULT_CONNECT_TIMEOUT}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = connect("mongodb://localhost:27017", DEFAULT_CONNECT_TIMEOUT).await?;
//!     let users = Repository::new(&store, "mongolang", "users");
//!
//!     let everyone = users.find_all(bson::doc! {}).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrepo_mongodb;

pub mod config;
pub mod connector;
pub mod store;

pub use config::{MongoConfig, MongoConfigBuilder};
pub use connector::{Connector, DEFAULT_CONNECT_TIMEOUT, connect};
pub use store::{MongoDbStore, MongoDbStoreBuilder};
