#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Corral Engine
//!
//! The execution side of Corral: claims ready actions, runs them under
//! per-target locks and policy hooks, and propagates dependency completion.
//!
//! - [`EngineConfig`] — explicit configuration threaded through dispatcher
//!   construction (no ambient globals)
//! - [`DependencyGraph`] — cycle rejection and readiness analysis over a
//!   batch of related actions
//! - [`ActionHandler`] / [`HandlerRegistry`] — the kind → handler table,
//!   verified complete at startup
//! - [`Dispatcher`] — the worker pool: CAS claim, target lock, BEFORE
//!   hooks, execute, AFTER hooks, terminal transition, dependent promotion,
//!   timeout sweep, bounded retries
//! - [`EngineService`] — the surface the orchestration layer calls:
//!   `create_action`, `submit_batch`, `notify_ready`, `cancel_action`

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod graph;
pub mod handler;
pub mod handlers;
pub mod service;

pub use config::EngineConfig;
pub use context::ExecutionContext;
pub use dispatcher::Dispatcher;
pub use error::EngineError;
pub use graph::DependencyGraph;
pub use handler::{ActionHandler, HandlerRegistry};
pub use service::EngineService;
