//! Extension point invoked around component lifecycles.

use crate::config::RuntimeConfig;
use crate::dom::NodeId;
use crate::error::RuntimeResult;
use crate::runtime::Runtime;
use xprops_reactive::{EffectId, EvalContext, Reactor, Store};

/// Plugin hook called once per component root
///
/// Hooks run in registration order; each receives the context produced by
/// the previous one and returns the context the component's subtree will
/// evaluate against.
pub trait ComponentHook {
    fn init_component(
        &self,
        init: &ComponentInit<'_>,
        context: EvalContext,
    ) -> RuntimeResult<EvalContext>;

    /// The component's node was removed; its effects are already disposed
    fn destroy_component(&self, _node: NodeId) {}
}

/// Everything a hook may use while a component initialises
pub struct ComponentInit<'a> {
    pub(crate) runtime: &'a Runtime,
    pub node: NodeId,
    pub attributes: &'a [(String, String)],
    /// The component's own reactive state
    pub local: &'a Store,
    /// Full context of the nearest enclosing component (with loop scopes)
    pub parent: Option<&'a EvalContext>,
}

impl<'a> ComponentInit<'a> {
    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn reactor(&self) -> &'a Reactor {
        self.runtime.reactor()
    }

    pub fn config(&self) -> &'a RuntimeConfig {
        self.runtime.config()
    }

    /// Create an effect owned by this component; it is disposed with the node
    pub fn effect(&self, f: impl Fn() + 'static) -> EffectId {
        self.runtime.effect_for(self.node, f)
    }
}
