use crate::reactor::StoreId;
use crate::store::Store;
use indexmap::IndexMap;
use std::fmt;

/// Runtime value
///
/// `Array` and `Object` are plain data owned by the value itself.
/// `Reactive` is a handle to a shared [`Store`]; cloning it clones the
/// handle, not the contents.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Reactive(Store),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Reactive(store) if store.is_array() => "array",
            Value::Reactive(_) => "object",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Reactive(_) => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Plain object or reactive object (not an array)
    pub fn is_object_like(&self) -> bool {
        match self {
            Value::Object(_) => true,
            Value::Reactive(store) => !store.is_array(),
            _ => false,
        }
    }

    pub fn is_array_like(&self) -> bool {
        match self {
            Value::Array(_) => true,
            Value::Reactive(store) => store.is_array(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric coercion used by arithmetic operators
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(_) | Value::Object(_) | Value::Reactive(_) => f64::NAN,
        }
    }

    /// String coercion used by `+` concatenation
    ///
    /// An array store that contains itself joins the inner reference as an
    /// empty string.
    pub fn to_js_string(&self) -> String {
        self.js_string_in(&mut Vec::new())
    }

    fn js_string_in(&self, path: &mut Vec<StoreId>) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => join_items(items, path),
            Value::Reactive(store) if store.is_array() => {
                if path.contains(&store.id()) {
                    return String::new();
                }
                path.push(store.id());
                let joined = join_items(&store.items(), path);
                path.pop();
                joined
            }
            Value::Object(_) | Value::Reactive(_) => "[object Object]".to_string(),
        }
    }

    /// Text rendered into the DOM (`x-text`, `x-bind`): nullish renders empty
    pub fn to_text(&self) -> String {
        if self.is_nullish() {
            String::new()
        } else {
            self.to_js_string()
        }
    }

    /// Structural equality; reactive handles compare by identity
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Reactive(a), Value::Reactive(b)) => a.ptr_eq(b),
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }

    /// Convert from JSON, producing plain (non-reactive) data
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON, reading through reactive stores
    ///
    /// A store reached again through its own contents becomes `null`.
    pub fn to_json(&self) -> serde_json::Value {
        self.json_in(&mut Vec::new())
    }

    fn json_in(&self, path: &mut Vec<StoreId>) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.json_in(path)).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.json_in(path))).collect(),
            ),
            Value::Reactive(store) => {
                if path.contains(&store.id()) {
                    return serde_json::Value::Null;
                }
                path.push(store.id());
                let json = if store.is_array() {
                    serde_json::Value::Array(store.items().iter().map(|v| v.json_in(path)).collect())
                } else {
                    serde_json::Value::Object(
                        store
                            .entries()
                            .into_iter()
                            .map(|(k, v)| (k, v.json_in(path)))
                            .collect(),
                    )
                };
                path.pop();
                json
            }
        }
    }
}

fn join_items(items: &[Value], path: &mut Vec<StoreId>) -> String {
    items
        .iter()
        .map(|item| {
            if item.is_nullish() {
                String::new()
            } else {
                item.js_string_in(path)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Format a number the way script engines print it (`1` not `1.0`)
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Reactive(a), Value::Reactive(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Reactive(store) => write!(f, "Reactive({})", store.id()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn test_text_rendering() {
        assert_eq!(Value::Undefined.to_text(), "");
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(Value::from("bar").to_text(), "bar");
        assert_eq!(Value::from(vec![Value::from(1.0), Value::Null]).to_text(), "1,");
        assert_eq!(Value::Undefined.to_js_string(), "undefined");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::from("").is_truthy());
        assert!(!Value::from(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(Value::Object(IndexMap::new()).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn test_json_conversion() {
        let value = Value::from_json(json!({"foo": "bar", "items": [1, 2], "nested": {"a": null}}));
        assert!(value.is_object_like());
        assert_eq!(
            value.to_json(),
            json!({"foo": "bar", "items": [1.0, 2.0], "nested": {"a": null}})
        );
    }

    #[test]
    fn test_object_key_order_is_preserved() {
        let value = Value::from_json(json!({"b": 1, "a": 2}));
        let Value::Object(map) = value else {
            panic!("Expected object");
        };
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_self_referencing_store_renders_finitely() {
        let reactor = crate::reactor::Reactor::new();
        let xs = crate::store::Store::array(&reactor, vec![Value::from(1.0)]);
        xs.push(Value::Reactive(xs.clone()));

        let value = Value::Reactive(xs.clone());
        assert_eq!(value.to_text(), "1,");
        assert_eq!(value.to_json(), json!([1.0, null]));
        assert!(format!("{:?}", xs).contains("Reactive("));

        let holder = crate::store::Store::new_object(&reactor);
        holder.set("list", value.clone());
        holder.set("me", Value::Reactive(holder.clone()));
        assert_eq!(
            Value::Reactive(holder).to_json(),
            json!({"list": [1.0, null], "me": null})
        );
    }
}
