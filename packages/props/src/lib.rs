//! Explicit, isolated props for nested components.
//!
//! A component root may declare `x-props="{name: expr, ...}"`. The
//! expressions are evaluated in the parent's scope, deep-copied into a
//! reactive [`PropsSnapshot`] owned by the child, and exposed to the child's
//! subtree as `$props`. The snapshot follows the parent's values but child
//! writes never reach the parent.
//!
//! ```no_run
//! use xprops_props::props_runtime;
//! use xprops_runtime::RuntimeConfig;
//!
//! let (runtime, _plugin) = props_runtime(RuntimeConfig::default());
//! runtime
//!     .mount(r#"<div x-data="{ foo: 'bar' }">
//!         <div x-data="{}" x-props="{foo: foo}"><span x-text="$props.foo"></span></div>
//!     </div>"#)
//!     .unwrap();
//! assert_eq!(runtime.text("span").unwrap(), "bar");
//! ```

pub mod plugin;
pub mod resolver;
pub mod snapshot;

pub use plugin::PropsPlugin;
pub use resolver::resolve_props;
pub use snapshot::{deep_clone, PropsSnapshot};

use std::rc::Rc;
use xprops_runtime::{ComponentHook, Runtime, RuntimeConfig};

/// Runtime with the props plugin registered
pub fn props_runtime(config: RuntimeConfig) -> (Runtime, Rc<PropsPlugin>) {
    let plugin = Rc::new(PropsPlugin::new());
    let hooks: Vec<Rc<dyn ComponentHook>> = vec![plugin.clone()];
    (Runtime::with_hooks(config, hooks), plugin)
}
