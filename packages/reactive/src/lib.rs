//! Fine-grained reactivity and expression evaluation for markup directives.
//!
//! - [`Reactor`] schedules effects and tracks their dependencies
//! - [`Store`] is the reactive object/array every component state lives in
//! - [`EvalContext`] resolves identifiers through a component's scope chain
//! - [`evaluate`] / [`execute`] run directive expressions against a context

pub mod context;
pub mod error;
pub mod evaluator;
pub mod reactor;
pub mod store;
pub mod value;

pub use context::{EvalContext, DEFAULT_NAMESPACE};
pub use error::{EvalError, EvalResult};
pub use evaluator::{evaluate, evaluate_source, execute, execute_source, get_member};
pub use reactor::{DepKey, EffectId, Reactor, StoreId, WeakReactor, DEFAULT_MAX_FLUSH_ITERATIONS};
pub use store::{Store, MAX_ARRAY_LENGTH};
pub use value::{format_number, Value};
