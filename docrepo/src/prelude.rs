//! Convenient re-exports of commonly used types from docrepo.
//!
//! ```ignore
//! use docrepo::prelude::*;
//! ```

pub use docrepo_core::{
    backend::{Namespace, StoreBackend, StoreBackendBuilder, UpdateOutcome},
    document::{Model, ModelExt, parse_object_id},
    error::{RepositoryError, RepositoryResult},
    query::{Filter, Update},
    repository::{DEFAULT_OPERATION_TIMEOUT, Repository, TypedRepository},
};
