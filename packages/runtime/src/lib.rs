//! Host runtime for `x-*` directive markup.
//!
//! Parses markup into a node arena, turns `x-data` elements into
//! components with their own reactive state and keeps `x-text`, `x-bind`
//! and `x-for` output in sync through the reactor. Plugins hook into
//! component initialisation through [`ComponentHook`].

pub mod config;
pub mod dom;
pub mod error;
pub mod hook;
mod list;
pub mod runtime;

pub use config::{RuntimeConfig, DEFAULT_CONFIG_NAME};
pub use dom::{Dom, NodeId, NodeKind};
pub use error::{RuntimeError, RuntimeResult};
pub use hook::{ComponentHook, ComponentInit};
pub use runtime::Runtime;
