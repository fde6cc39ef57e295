#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Corral Core
//!
//! Core identifier types for the Corral cluster-lifecycle engine. This crate
//! provides the strongly-typed IDs used by every other Corral crate.
//!
//! ## Key Components
//!
//! - **Identifiers**: [`ActionId`], [`ClusterId`], [`NodeId`], [`PolicyId`],
//!   [`ProfileId`], [`WorkerId`]
//!
//! ## Usage
//!
//! ```rust
//! use corral_core::{ActionId, ClusterId, NodeId};
//!
//! let action_id = ActionId::v4();
//! let cluster_id = ClusterId::v4();
//! let node_id = NodeId::v4();
//! ```

pub mod id;

pub use id::*;
