//! # Props Snapshot
//!
//! A child component's isolated, live copy of the values it declared.
//!
//! The snapshot is an ordinary reactive [`Store`] so descendant expressions
//! subscribe to it like any other component state. Its contents always come
//! from [`deep_clone`], which never carries a parent store into the copy:
//! writes on either side of the boundary stay on that side.

use indexmap::IndexMap;
use tracing::{debug, warn};
use xprops_reactive::{Reactor, Store, StoreId, Value};

/// Structural copy of `value` sharing no container with it
///
/// Reactive stores are enumerated through their public accessors, so
/// calling this inside an effect subscribes the effect to every field it
/// copied. Cyclic store graphs are cut with `undefined`.
pub fn deep_clone(value: &Value) -> Value {
    clone_value(value, &mut Vec::new())
}

fn clone_value(value: &Value, path: &mut Vec<StoreId>) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| clone_value(v, path)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| (key.clone(), clone_value(v, path)))
                .collect(),
        ),
        Value::Reactive(store) => {
            if path.contains(&store.id()) {
                warn!(store = %store.id(), "Cyclic value in props, cutting the cycle");
                return Value::Undefined;
            }
            path.push(store.id());
            let cloned = if store.is_array() {
                Value::Array(store.items().iter().map(|v| clone_value(v, path)).collect())
            } else {
                Value::Object(
                    store
                        .entries()
                        .into_iter()
                        .map(|(key, v)| (key, clone_value(&v, path)))
                        .collect(),
                )
            };
            path.pop();
            cloned
        }
        primitive => primitive.clone(),
    }
}

/// Top-level entries of a declaration result; anything but an object is empty
fn declared_entries(raw: &Value) -> IndexMap<String, Value> {
    match deep_clone(raw) {
        Value::Object(entries) => entries,
        other => {
            debug!(value_type = other.type_name(), "Props value is not an object, using empty props");
            IndexMap::new()
        }
    }
}

/// The reactive container holding one component's props
#[derive(Clone)]
pub struct PropsSnapshot {
    store: Store,
}

impl PropsSnapshot {
    /// Build a snapshot holding a deep copy of `raw`
    pub fn build(reactor: &Reactor, raw: &Value) -> Self {
        let entries = declared_entries(raw);
        debug!(props = entries.len(), "Props snapshot built");
        Self {
            store: Store::object(reactor, entries),
        }
    }

    /// Replace the contents with a deep copy of `raw`, keeping identity
    ///
    /// Keys missing from `raw` are removed; every other key is re-set, so a
    /// value written by the child is overwritten even if the parent's value
    /// did not change. Unchanged primitives do not re-run dependents.
    pub fn refresh(&self, raw: &Value) {
        let fresh = declared_entries(raw);
        let apply = || {
            for key in self.store.peek_keys() {
                if !fresh.contains_key(&key) {
                    self.store.remove(&key);
                }
            }
            for (key, value) in &fresh {
                self.store.set(key, value.clone());
            }
        };

        match self.store.reactor() {
            Some(reactor) => reactor.batch(apply),
            None => apply(),
        }
        debug!(store = %self.store.id(), props = fresh.len(), "Props snapshot refreshed");
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Current value of one prop, without subscribing
    pub fn get(&self, name: &str) -> Value {
        self.store.peek(name)
    }

    pub fn keys(&self) -> Vec<String> {
        self.store.peek_keys()
    }

    pub fn to_json(&self) -> serde_json::Value {
        Value::Reactive(self.store.clone()).to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn store(reactor: &Reactor, data: serde_json::Value) -> Store {
        match Store::wrap(reactor, Value::from_json(data)) {
            Value::Reactive(store) => store,
            other => panic!("Expected store, got {:?}", other),
        }
    }

    #[test]
    fn test_deep_clone_severs_store_references() {
        let reactor = Reactor::new();
        let parent = store(&reactor, json!({"user": {"name": "Ada"}, "tags": ["x"]}));

        let cloned = deep_clone(&Value::Reactive(parent.clone()));
        let Value::Object(map) = &cloned else {
            panic!("Expected plain object");
        };
        assert!(matches!(map.get("user"), Some(Value::Object(_))));
        assert!(matches!(map.get("tags"), Some(Value::Array(_))));
        assert_eq!(cloned.to_json(), json!({"user": {"name": "Ada"}, "tags": ["x"]}));
    }

    #[test]
    fn test_deep_clone_cuts_cycles() {
        let reactor = Reactor::new();
        let node = Store::new_object(&reactor);
        node.set("self", Value::Reactive(node.clone()));
        node.set("n", Value::from(1.0));

        let cloned = deep_clone(&Value::Reactive(node));
        assert_eq!(cloned.to_json(), json!({"self": null, "n": 1.0}));
    }

    #[test]
    fn test_build_from_non_object_is_empty() {
        let reactor = Reactor::new();
        assert!(PropsSnapshot::build(&reactor, &Value::from("nope")).keys().is_empty());
        assert!(PropsSnapshot::build(&reactor, &Value::Undefined).keys().is_empty());
        assert!(PropsSnapshot::build(&reactor, &Value::Array(vec![Value::Null])).keys().is_empty());
    }

    #[test]
    fn test_snapshot_is_isolated_from_source() {
        let reactor = Reactor::new();
        let parent = store(&reactor, json!({"user": {"name": "Ada"}}));
        let snapshot = PropsSnapshot::build(&reactor, &Value::Reactive(parent.clone()));

        let Value::Reactive(child_user) = snapshot.get("user") else {
            panic!("Expected nested store");
        };
        let Value::Reactive(parent_user) = parent.get("user") else {
            panic!("Expected nested store");
        };
        assert!(!child_user.ptr_eq(&parent_user));

        child_user.set("name", Value::from("Grace"));
        assert_eq!(parent_user.get("name"), Value::from("Ada"));

        parent_user.set("name", Value::from("Linus"));
        assert_eq!(child_user.get("name"), Value::from("Grace"));
    }

    #[test]
    fn test_refresh_replaces_all_keys_in_place() {
        let reactor = Reactor::new();
        let snapshot = PropsSnapshot::build(&reactor, &Value::from_json(json!({"a": 1, "b": 2})));
        let id = snapshot.store().id();

        snapshot.store().set("a", Value::from("written by child"));
        snapshot.refresh(&Value::from_json(json!({"a": 1, "c": 3})));

        assert_eq!(snapshot.store().id(), id);
        assert_eq!(snapshot.keys(), vec!["a", "c"]);
        assert_eq!(snapshot.to_json(), json!({"a": 1.0, "c": 3.0}));
    }

    #[test]
    fn test_refresh_reruns_dependents_once() {
        let reactor = Reactor::new();
        let snapshot = PropsSnapshot::build(&reactor, &Value::from_json(json!({"a": 1, "b": 2})));
        let runs = Rc::new(Cell::new(0));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let store = snapshot.store().clone();
        let (r, log) = (runs.clone(), seen.clone());
        reactor.effect(move || {
            r.set(r.get() + 1);
            log.borrow_mut().push(store.get("a").to_text() + &store.get("b").to_text());
        });

        snapshot.refresh(&Value::from_json(json!({"a": 1, "b": 2})));
        assert_eq!(runs.get(), 1);

        snapshot.refresh(&Value::from_json(json!({"a": 5, "b": 6})));
        assert_eq!(runs.get(), 2);
        assert_eq!(*seen.borrow(), vec!["12", "56"]);
    }
}
