//! Evaluation context: the scope chain used to resolve identifiers.
//!
//! A context is an ordered list of store layers (innermost first, the
//! component's own store last) plus an optional link to the nearest
//! ancestor component's context. Only the namespace identifier is ever
//! resolved through that link; every other ancestor key is invisible.

use crate::error::{EvalError, EvalResult};
use crate::store::Store;
use crate::value::Value;
use std::rc::Rc;

pub const DEFAULT_NAMESPACE: &str = "$props";

struct ContextInner {
    layers: Vec<Store>,
    ancestor: Option<EvalContext>,
    namespace: Rc<str>,
}

/// Identifier-resolution scope for expressions inside a component subtree
#[derive(Clone)]
pub struct EvalContext {
    inner: Rc<ContextInner>,
}

impl EvalContext {
    /// Context with no layers: every identifier is `undefined`
    pub fn empty() -> Self {
        Self {
            inner: Rc::new(ContextInner {
                layers: Vec::new(),
                ancestor: None,
                namespace: Rc::from(DEFAULT_NAMESPACE),
            }),
        }
    }

    /// Context for a component whose own state lives in `local`
    pub fn component(local: Store, ancestor: Option<EvalContext>, namespace: &str) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                layers: vec![local],
                ancestor,
                namespace: Rc::from(namespace),
            }),
        }
    }

    /// Child context with an extra innermost layer (loop item scopes)
    pub fn with_layer(&self, layer: Store) -> Self {
        let mut layers = Vec::with_capacity(self.inner.layers.len() + 1);
        layers.push(layer);
        layers.extend(self.inner.layers.iter().cloned());
        Self {
            inner: Rc::new(ContextInner {
                layers,
                ancestor: self.inner.ancestor.clone(),
                namespace: self.inner.namespace.clone(),
            }),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// The component's own store (outermost layer)
    pub fn local(&self) -> Option<&Store> {
        self.inner.layers.last()
    }

    pub fn ancestor(&self) -> Option<&EvalContext> {
        self.inner.ancestor.as_ref()
    }

    pub fn layers(&self) -> &[Store] {
        &self.inner.layers
    }

    /// Resolve an identifier
    ///
    /// Layers are searched innermost first. On a miss, the namespace
    /// identifier alone continues to the ancestor component.
    pub fn lookup(&self, name: &str) -> Value {
        if let Some(layer) = self.owning_layer(name) {
            return layer.get(name);
        }

        if name == self.namespace() {
            if let Some(ancestor) = self.ancestor() {
                return ancestor.lookup(name);
            }
        }

        Value::Undefined
    }

    pub fn has(&self, name: &str) -> bool {
        self.owning_layer(name).is_some()
    }

    fn owning_layer(&self, name: &str) -> Option<&Store> {
        self.inner.layers.iter().find(|layer| layer.has(name))
    }

    /// Assign to an identifier: the layer that owns it, else the component layer
    pub fn assign(&self, name: &str, value: Value) -> EvalResult<()> {
        let target = self.owning_layer(name).or_else(|| self.local());
        match target {
            Some(store) => {
                store.set(name, value);
                Ok(())
            }
            None => Err(EvalError::NoScope {
                name: name.to_string(),
            }),
        }
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::Reactor;
    use indexmap::IndexMap;

    fn store(reactor: &Reactor, entries: &[(&str, Value)]) -> Store {
        let map: IndexMap<String, Value> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Store::object(reactor, map)
    }

    #[test]
    fn test_local_lookup() {
        let reactor = Reactor::new();
        let ctx = EvalContext::component(store(&reactor, &[("foo", "bar".into())]), None, "$props");
        assert_eq!(ctx.lookup("foo"), Value::from("bar"));
        assert_eq!(ctx.lookup("nope"), Value::Undefined);
    }

    #[test]
    fn test_ancestor_raw_keys_are_isolated() {
        let reactor = Reactor::new();
        let parent = EvalContext::component(store(&reactor, &[("foo", "bar".into())]), None, "$props");
        let child = EvalContext::component(Store::new_object(&reactor), Some(parent), "$props");
        assert_eq!(child.lookup("foo"), Value::Undefined);
    }

    #[test]
    fn test_namespace_falls_through_to_ancestor() {
        let reactor = Reactor::new();
        let props = Store::new_object(&reactor);
        let parent = EvalContext::component(
            store(&reactor, &[("$props", Value::Reactive(props.clone()))]),
            None,
            "$props",
        );
        let child = EvalContext::component(Store::new_object(&reactor), Some(parent), "$props");
        assert_eq!(child.lookup("$props"), Value::Reactive(props));
    }

    #[test]
    fn test_local_namespace_shadows_ancestor() {
        let reactor = Reactor::new();
        let outer = Store::new_object(&reactor);
        let inner = Store::new_object(&reactor);
        let parent = EvalContext::component(
            store(&reactor, &[("$props", Value::Reactive(outer))]),
            None,
            "$props",
        );
        let child = EvalContext::component(
            store(&reactor, &[("$props", Value::Reactive(inner.clone()))]),
            Some(parent),
            "$props",
        );
        assert_eq!(child.lookup("$props"), Value::Reactive(inner));
    }

    #[test]
    fn test_loop_layer_shadows_and_assignment_targets_owner() {
        let reactor = Reactor::new();
        let local = store(&reactor, &[("item", "outer".into()), ("count", 1.0.into())]);
        let ctx = EvalContext::component(local.clone(), None, "$props");
        let layer = store(&reactor, &[("item", "inner".into())]);
        let looped = ctx.with_layer(layer.clone());

        assert_eq!(looped.lookup("item"), Value::from("inner"));
        assert_eq!(looped.lookup("count"), Value::from(1.0));

        looped.assign("item", "changed".into()).unwrap();
        assert_eq!(layer.get("item"), Value::from("changed"));
        assert_eq!(local.get("item"), Value::from("outer"));

        looped.assign("fresh", true.into()).unwrap();
        assert_eq!(local.get("fresh"), Value::Boolean(true));
    }

    #[test]
    fn test_assign_without_scope_fails() {
        let err = EvalContext::empty().assign("x", Value::Null).unwrap_err();
        assert!(matches!(err, EvalError::NoScope { .. }));
    }
}
