#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Corral Storage
//!
//! The durable-record contract the engine core consumes, and an in-memory
//! reference backend.
//!
//! - [`StorageGateway`] — async trait covering action CRUD, the
//!   compare-and-set ownership claim, terminal status marks, per-target
//!   try-locks, and the cluster / node / policy / binding records the
//!   handlers read and write
//! - [`MemoryStore`] — mutex-guarded tables with real CAS semantics, used
//!   by tests and single-process deployments
//!
//! The claim protocol is deliberately modeled as CAS against the persisted
//! record rather than an in-process mutex: a claim must survive worker
//! restarts, and a lost race is an expected outcome, not an error.

pub mod error;
pub mod gateway;
pub mod memory;
pub mod record;

pub use error::StorageError;
pub use gateway::StorageGateway;
pub use memory::MemoryStore;
pub use record::PolicyRecord;

/// Result alias for gateway operations.
pub type Result<T> = std::result::Result<T, StorageError>;
