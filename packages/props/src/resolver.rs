//! Scope chain resolution for components declaring props.
//!
//! The declaration is evaluated against the parent's full context, so a
//! parent's own `$props` can be forwarded one level further. The resulting
//! snapshot is installed under the namespace key of the child's local store;
//! from there ordinary identifier lookup and member access reach it.

use crate::snapshot::{deep_clone, PropsSnapshot};
use std::cell::OnceCell;
use std::rc::Rc;
use tracing::{debug, instrument, warn};
use xprops_parser::parse_expression;
use xprops_reactive::{evaluate, Store, Value};
use xprops_runtime::{ComponentInit, NodeId};

/// Build the component's snapshot and keep it in sync with its declaration
///
/// The refresh effect is owned by the component, so it is disposed together
/// with the component's node. It is created before any descendant effect and
/// therefore always re-runs ahead of them within a flush.
#[instrument(skip_all, fields(node = %init.node))]
pub fn resolve_props(init: &ComponentInit<'_>, declaration: &str) -> PropsSnapshot {
    let reactor = init.reactor();
    let namespace = init.config().props_namespace.clone();

    let expr = match parse_expression(declaration) {
        Ok(expr) => expr,
        Err(err) => {
            warn!(error = %err, declaration, "Prop declaration failed to parse, using empty props");
            let snapshot = PropsSnapshot::build(reactor, &Value::Undefined);
            install(init.local, &namespace, &snapshot, init.node);
            return snapshot;
        }
    };

    let parent = init.parent.cloned().unwrap_or_default();
    let local = init.local.clone();
    let node = init.node;
    let weak_reactor = reactor.downgrade();
    let slot: Rc<OnceCell<PropsSnapshot>> = Rc::new(OnceCell::new());

    let cell = slot.clone();
    let effect_namespace = namespace.clone();
    init.effect(move || {
        let Some(reactor) = weak_reactor.upgrade() else {
            return;
        };

        let raw = match evaluate(&expr, &parent) {
            Ok(value) => value,
            Err(err) => {
                warn!(node = %node, error = %err, "Prop declaration evaluation failed, using empty props");
                Value::Undefined
            }
        };
        // Copying here, while still tracked, subscribes to nested parent fields
        let props = deep_clone(&raw);

        reactor.untracked(|| match cell.get() {
            Some(snapshot) => snapshot.refresh(&props),
            None => {
                let snapshot = PropsSnapshot::build(&reactor, &props);
                install(&local, &effect_namespace, &snapshot, node);
                let _ = cell.set(snapshot);
            }
        });
    });

    match slot.get() {
        Some(snapshot) => snapshot.clone(),
        None => {
            let snapshot = PropsSnapshot::build(reactor, &Value::Undefined);
            install(init.local, &namespace, &snapshot, init.node);
            snapshot
        }
    }
}

/// Expose `snapshot` under `namespace` in the component's own store
fn install(local: &Store, namespace: &str, snapshot: &PropsSnapshot, node: NodeId) {
    if !local.peek(namespace).is_nullish() {
        warn!(
            node = %node,
            namespace,
            "Component state already defines the props namespace, replacing it"
        );
    }
    local.set(namespace, Value::Reactive(snapshot.store().clone()));
    debug!(node = %node, namespace, props = snapshot.keys().len(), "Props installed");
}

