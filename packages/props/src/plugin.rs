use crate::resolver::resolve_props;
use crate::snapshot::PropsSnapshot;
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::debug;
use xprops_reactive::EvalContext;
use xprops_runtime::{ComponentHook, ComponentInit, NodeId, RuntimeResult};

/// Component hook giving `x-props` components their isolated props
///
/// Components without a declaration are left untouched. Snapshots are
/// tracked per component node and released when the node is destroyed.
#[derive(Default)]
pub struct PropsPlugin {
    snapshots: RefCell<HashMap<NodeId, PropsSnapshot>>,
}

impl PropsPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot owned by the component rooted at `node`
    pub fn snapshot_for(&self, node: NodeId) -> Option<PropsSnapshot> {
        self.snapshots.borrow().get(&node).cloned()
    }

    /// Number of components currently holding a snapshot
    pub fn live_snapshots(&self) -> usize {
        self.snapshots.borrow().len()
    }
}

impl ComponentHook for PropsPlugin {
    fn init_component(
        &self,
        init: &ComponentInit<'_>,
        context: EvalContext,
    ) -> RuntimeResult<EvalContext> {
        let Some(declaration) = init.attribute(&init.config().props_attribute) else {
            return Ok(context);
        };

        let snapshot = resolve_props(init, declaration);
        self.snapshots.borrow_mut().insert(init.node, snapshot);
        Ok(context)
    }

    fn destroy_component(&self, node: NodeId) {
        if self.snapshots.borrow_mut().remove(&node).is_some() {
            debug!(node = %node, "Props snapshot released");
        }
    }
}
