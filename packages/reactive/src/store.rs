//! Reactive container.
//!
//! A [`Store`] is a shared, identity-stable object or array whose reads
//! register dependencies on the running effect and whose writes re-run
//! dependents. Plain objects and arrays written into a store are wrapped
//! into child stores, so nested reads are reactive too.

use crate::error::{EvalError, EvalResult};
use crate::reactor::{DepKey, Reactor, StoreId, WeakReactor};
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// Largest array length a store materialises; arrays are dense
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Validate a value written to an array's `length`
fn array_length(value: &Value) -> EvalResult<usize> {
    let len = value.to_number();
    if !(len.is_finite() && len >= 0.0 && len.fract() == 0.0 && len <= u32::MAX as f64) {
        return Err(EvalError::RangeError {
            message: "Invalid array length".to_string(),
        });
    }
    if len as usize > MAX_ARRAY_LENGTH {
        return Err(EvalError::RangeError {
            message: format!("Array length {} exceeds the supported length {}", len, MAX_ARRAY_LENGTH),
        });
    }
    Ok(len as usize)
}

enum StoreData {
    Object(IndexMap<String, Value>),
    Array(Vec<Value>),
}

struct StoreInner {
    id: StoreId,
    reactor: WeakReactor,
    data: RefCell<StoreData>,
}

/// Handle to a reactive object or array
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

enum Change {
    Field(bool),
    Shape,
}

impl Store {
    fn with_data(reactor: &Reactor, data: StoreData) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                id: reactor.next_store_id(),
                reactor: reactor.downgrade(),
                data: RefCell::new(data),
            }),
        }
    }

    pub fn new_object(reactor: &Reactor) -> Self {
        Self::with_data(reactor, StoreData::Object(IndexMap::new()))
    }

    /// Create a reactive object, wrapping nested containers
    pub fn object(reactor: &Reactor, entries: IndexMap<String, Value>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(key, value)| (key, Self::wrap(reactor, value)))
            .collect();
        Self::with_data(reactor, StoreData::Object(entries))
    }

    /// Create a reactive array, wrapping nested containers
    pub fn array(reactor: &Reactor, items: Vec<Value>) -> Self {
        let items = items
            .into_iter()
            .map(|value| Self::wrap(reactor, value))
            .collect();
        Self::with_data(reactor, StoreData::Array(items))
    }

    /// Wrap plain objects and arrays into fresh stores; other values pass through
    pub fn wrap(reactor: &Reactor, value: Value) -> Value {
        match value {
            Value::Object(entries) => Value::Reactive(Self::object(reactor, entries)),
            Value::Array(items) => Value::Reactive(Self::array(reactor, items)),
            other => other,
        }
    }

    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    pub fn is_array(&self) -> bool {
        matches!(&*self.inner.data.borrow(), StoreData::Array(_))
    }

    pub fn ptr_eq(&self, other: &Store) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn reactor(&self) -> Option<Reactor> {
        self.inner.reactor.upgrade()
    }

    fn track(&self, key: DepKey) {
        if let Some(reactor) = self.reactor() {
            reactor.track(self.id(), key);
        }
    }

    fn notify(&self, change: Change, key: &str) {
        let Some(reactor) = self.reactor() else {
            return;
        };
        let id = self.id();
        reactor.batch(|| match change {
            Change::Field(added) => {
                reactor.trigger(id, DepKey::Field(key.to_string()));
                if added {
                    reactor.trigger(id, DepKey::Shape);
                }
            }
            Change::Shape => reactor.trigger(id, DepKey::Shape),
        });
    }

    /// Read a field (objects) or an index / `length` (arrays)
    pub fn get(&self, key: &str) -> Value {
        let (value, dep) = self.read(key);
        self.track(dep);
        value
    }

    /// Read without registering a dependency
    pub fn peek(&self, key: &str) -> Value {
        self.read(key).0
    }

    fn read(&self, key: &str) -> (Value, DepKey) {
        match &*self.inner.data.borrow() {
            StoreData::Object(map) => (
                map.get(key).cloned().unwrap_or(Value::Undefined),
                DepKey::Field(key.to_string()),
            ),
            StoreData::Array(items) => {
                let value = if key == "length" {
                    Value::Number(items.len() as f64)
                } else {
                    key.parse::<usize>()
                        .ok()
                        .and_then(|i| items.get(i).cloned())
                        .unwrap_or(Value::Undefined)
                };
                (value, DepKey::Shape)
            }
        }
    }

    pub fn has(&self, key: &str) -> bool {
        let (present, dep) = match &*self.inner.data.borrow() {
            StoreData::Object(map) => (map.contains_key(key), DepKey::Field(key.to_string())),
            StoreData::Array(items) => (
                key.parse::<usize>().map(|i| i < items.len()).unwrap_or(false),
                DepKey::Shape,
            ),
        };
        self.track(dep);
        present
    }

    /// Write a field (objects) or an index / `length` (arrays)
    ///
    /// Dependents re-run only when the stored value actually changes. A
    /// rejected array write is logged and leaves the store untouched; use
    /// [`Store::try_set`] to observe the error.
    pub fn set(&self, key: &str, value: Value) {
        if let Err(err) = self.try_set(key, value) {
            warn!(store = %self.id(), key, error = %err, "Store write rejected");
        }
    }

    /// Like [`Store::set`], failing on an array length or index beyond
    /// [`MAX_ARRAY_LENGTH`]
    pub fn try_set(&self, key: &str, value: Value) -> EvalResult<()> {
        let value = match self.reactor() {
            Some(reactor) => Self::wrap(&reactor, value),
            None => value,
        };

        let change = {
            let mut data = self.inner.data.borrow_mut();
            match &mut *data {
                StoreData::Object(map) => match map.get(key) {
                    Some(existing) if existing.same_value(&value) => None,
                    Some(_) => {
                        map.insert(key.to_string(), value);
                        Some(Change::Field(false))
                    }
                    None => {
                        map.insert(key.to_string(), value);
                        Some(Change::Field(true))
                    }
                },
                StoreData::Array(items) => {
                    if key == "length" {
                        let len = array_length(&value)?;
                        if len != items.len() {
                            items.resize(len, Value::Undefined);
                            Some(Change::Shape)
                        } else {
                            None
                        }
                    } else if let Ok(index) = key.parse::<usize>() {
                        if index >= MAX_ARRAY_LENGTH {
                            return Err(EvalError::RangeError {
                                message: format!(
                                    "Array index {} exceeds the supported length {}",
                                    index, MAX_ARRAY_LENGTH
                                ),
                            });
                        }
                        if index >= items.len() {
                            items.resize(index + 1, Value::Undefined);
                        } else if items[index].same_value(&value) {
                            return Ok(());
                        }
                        items[index] = value;
                        Some(Change::Shape)
                    } else {
                        warn!(store = %self.id(), key, "Ignoring non-index write to array store");
                        None
                    }
                }
            }
        };

        if let Some(change) = change {
            self.notify(change, key);
        }
        Ok(())
    }

    /// Remove an object field, returning its previous value
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = match &mut *self.inner.data.borrow_mut() {
            StoreData::Object(map) => map.shift_remove(key),
            StoreData::Array(_) => None,
        };
        if removed.is_some() {
            self.notify(Change::Field(true), key);
        }
        removed
    }

    /// Append to an array store
    pub fn push(&self, value: Value) {
        let value = match self.reactor() {
            Some(reactor) => Self::wrap(&reactor, value),
            None => value,
        };
        let pushed = match &mut *self.inner.data.borrow_mut() {
            StoreData::Array(items) => {
                items.push(value);
                true
            }
            StoreData::Object(_) => false,
        };
        if pushed {
            self.notify(Change::Shape, "length");
        }
    }

    /// Field names (objects) or indices (arrays)
    pub fn keys(&self) -> Vec<String> {
        self.track(DepKey::Shape);
        self.peek_keys()
    }

    /// Keys without registering a dependency
    pub fn peek_keys(&self) -> Vec<String> {
        match &*self.inner.data.borrow() {
            StoreData::Object(map) => map.keys().cloned().collect(),
            StoreData::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.track(DepKey::Shape);
        match &*self.inner.data.borrow() {
            StoreData::Object(map) => map.len(),
            StoreData::Array(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element values (arrays) or field values (objects), in order
    pub fn items(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    /// Key/value pairs, in order; depends on the shape and every field
    pub fn entries(&self) -> Vec<(String, Value)> {
        let entries: Vec<(String, Value)> = match &*self.inner.data.borrow() {
            StoreData::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            StoreData::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
        };

        self.track(DepKey::Shape);
        if !self.is_array() {
            for (key, _) in &entries {
                self.track(DepKey::Field(key.clone()));
            }
        }
        entries
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner.data.borrow() {
            StoreData::Object(map) => f
                .debug_struct("Store")
                .field("id", &self.id())
                .field("object", map)
                .finish(),
            StoreData::Array(items) => f
                .debug_struct("Store")
                .field("id", &self.id())
                .field("array", items)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn object(reactor: &Reactor, json: serde_json::Value) -> Store {
        match Store::wrap(reactor, Value::from_json(json)) {
            Value::Reactive(store) => store,
            other => panic!("Expected store, got {:?}", other),
        }
    }

    #[test]
    fn test_get_set_roundtrip() {
        let reactor = Reactor::new();
        let store = object(&reactor, serde_json::json!({"foo": "bar"}));
        assert_eq!(store.get("foo"), Value::from("bar"));
        store.set("foo", Value::from("baz"));
        assert_eq!(store.get("foo"), Value::from("baz"));
        assert_eq!(store.get("missing"), Value::Undefined);
    }

    #[test]
    fn test_nested_containers_are_wrapped() {
        let reactor = Reactor::new();
        let store = object(&reactor, serde_json::json!({"user": {"name": "a"}, "tags": ["x"]}));
        assert!(matches!(store.get("user"), Value::Reactive(ref s) if !s.is_array()));
        assert!(matches!(store.get("tags"), Value::Reactive(ref s) if s.is_array()));
    }

    #[test]
    fn test_effect_reruns_on_field_change_only() {
        let reactor = Reactor::new();
        let store = object(&reactor, serde_json::json!({"foo": "bar", "other": 1}));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = store.clone();
        let log = seen.clone();
        reactor.effect(move || log.borrow_mut().push(s.get("foo").to_text()));

        store.set("other", Value::from(2.0));
        store.set("foo", Value::from("bar"));
        store.set("foo", Value::from("baz"));
        assert_eq!(*seen.borrow(), vec!["bar", "baz"]);
    }

    #[test]
    fn test_missing_key_read_tracks_later_insert() {
        let reactor = Reactor::new();
        let store = Store::new_object(&reactor);
        let runs = Rc::new(Cell::new(0));

        let s = store.clone();
        let r = runs.clone();
        reactor.effect(move || {
            s.has("late");
            r.set(r.get() + 1);
        });

        store.set("late", Value::from(true));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_keys_track_shape() {
        let reactor = Reactor::new();
        let store = object(&reactor, serde_json::json!({"a": 1}));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = store.clone();
        let log = seen.clone();
        reactor.effect(move || log.borrow_mut().push(s.keys().len()));

        store.set("b", Value::from(2.0));
        store.remove("a");
        assert_eq!(*seen.borrow(), vec![1, 2, 1]);
    }

    #[test]
    fn test_array_index_length_and_push() {
        let reactor = Reactor::new();
        let store = Store::array(&reactor, vec![Value::from("item1")]);
        let lengths = Rc::new(RefCell::new(Vec::new()));

        let s = store.clone();
        let log = lengths.clone();
        reactor.effect(move || log.borrow_mut().push(s.get("length").to_text()));

        store.push(Value::from("item2"));
        store.set("3", Value::from("item4"));
        assert_eq!(store.get("1"), Value::from("item2"));
        assert_eq!(store.get("2"), Value::Undefined);
        assert_eq!(*lengths.borrow(), vec!["1", "2", "4"]);
    }

    #[test]
    fn test_identity_is_stable_across_writes() {
        let reactor = Reactor::new();
        let store = Store::new_object(&reactor);
        let id = store.id();
        store.set("x", Value::from(1.0));
        store.remove("x");
        assert_eq!(store.id(), id);
        assert!(store.ptr_eq(&store.clone()));
    }

    #[test]
    fn test_store_outliving_reactor_stays_readable() {
        let store = {
            let reactor = Reactor::new();
            Store::new_object(&reactor)
        };
        store.set("plain", Value::from_json(serde_json::json!({"a": 1})));
        assert!(matches!(store.get("plain"), Value::Object(_)));
    }

    #[test]
    fn test_length_write_is_bounded() {
        let reactor = Reactor::new();
        let store = Store::array(&reactor, vec![Value::from("a")]);

        for len in [1e20, -1.0, 1.5, f64::NAN, (MAX_ARRAY_LENGTH + 1) as f64] {
            let err = store.try_set("length", Value::from(len)).unwrap_err();
            assert!(matches!(err, EvalError::RangeError { .. }), "length {}", len);
        }
        store.set("length", Value::from(1e20));
        assert_eq!(store.len(), 1);

        store.try_set("length", Value::from(3.0)).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("2"), Value::Undefined);
    }

    #[test]
    fn test_index_write_beyond_limit_is_rejected() {
        let reactor = Reactor::new();
        let store = Store::array(&reactor, vec![Value::from("a")]);
        let runs = Rc::new(Cell::new(0));

        let s = store.clone();
        let r = runs.clone();
        reactor.effect(move || {
            s.get("length");
            r.set(r.get() + 1);
        });

        let err = store.try_set("3000000000", Value::from(1.0)).unwrap_err();
        assert!(matches!(err, EvalError::RangeError { .. }));
        store.set(&MAX_ARRAY_LENGTH.to_string(), Value::from(1.0));
        assert_eq!(store.len(), 1);
        assert_eq!(runs.get(), 1);
    }
}
