//! Unique identifiers for Corral entities.
//!
//! Strongly-typed UUID identifiers built on
//! [`domain-key`](https://crates.io/crates/domain-key) `Uuid<D>` wrappers.
//! Each identifier type is parameterized by a unique domain marker, so an
//! `ActionId` can never be passed where a `ClusterId` is expected.
//!
//! All ID types are `Copy` (16 bytes, stack-allocated) and support:
//! - `v4()` for random UUID generation
//! - `nil()` for zero-valued default
//! - `parse(&str)` for string parsing
//! - Full serde support (serializes as UUID string)
//! - `Display`, `FromStr`, `Eq`, `Ord`, `Hash`

use domain_key::define_uuid;

// Re-export for downstream parse error handling
pub use domain_key::UuidParseError;

// Entity identifiers — UUID-based, Copy, 16 bytes each
define_uuid!(pub ActionIdDomain => ActionId);
define_uuid!(pub ClusterIdDomain => ClusterId);
define_uuid!(pub NodeIdDomain => NodeId);
define_uuid!(pub PolicyIdDomain => PolicyId);
define_uuid!(pub ProfileIdDomain => ProfileId);
define_uuid!(pub WorkerIdDomain => WorkerId);
