//! Object-store contract for accrue.
//!
//! The backing store only supports whole-object operations: read an object,
//! replace an object, delete an object. There is no append primitive; the
//! appender and consolidator build that on top of this crate.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`LocalObjectStore`] -- one file per object under `<root>/<bucket>/`
//!
//! # Design Rules
//!
//! 1. `NotFound` and `AccessDenied` are distinct from every other failure so
//!    callers can treat them as "object absent".
//! 2. `delete` is idempotent.
//! 3. The store never interprets object contents.
//! 4. Keys handed to `get`/`delete` are expected to be normalized with
//!    [`normalize_key`] by the caller.

pub mod error;
pub mod key;
pub mod local;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use key::normalize_key;
pub use local::LocalObjectStore;
pub use memory::InMemoryObjectStore;
pub use traits::{ObjectStore, StoredObject};
