//! Dynamic value trees for form values, errors and touched flags.
//!
//! Containers keep their children behind `Rc`, so a `Value` clone is cheap
//! and an update through [`crate::path::set`] copies only the containers on
//! the updated path. Every sibling stays shared with the previous tree.
//!
//! A missing map key is "absent". It is distinct from `Null` and from `""`,
//! and deep equality keeps those three apart.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type Map = BTreeMap<String, Value>;

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Rc<Vec<Value>>),
    Map(Rc<Map>),
}

impl Value {
    /// An empty map, the root shape of every values/errors/touched tree.
    pub fn map() -> Self {
        Value::Map(Rc::new(Map::new()))
    }

    pub fn list() -> Self {
        Value::List(Rc::new(Vec::new()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Loose truthiness, the way an input's `checked` state reads a value.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) => true,
        }
    }

    /// Reads the value at `path`. A path that does not parse reads as absent.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let path = crate::path::Path::parse(path).ok()?;
        crate::path::get(self, &path)
    }

    /// True when the tree carries nothing: `Null`, `""`, or containers made
    /// only of such entries. An errors tree that is blank means "no errors".
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
            Value::List(items) => items.iter().all(Value::is_blank),
            Value::Map(map) => map.values().all(Value::is_blank),
        }
    }

    /// Same shape as `self`, with every leaf replaced by `leaf`.
    pub fn mirror_leaves(&self, leaf: &Value) -> Value {
        match self {
            Value::List(items) => Value::List(Rc::new(
                items.iter().map(|v| v.mirror_leaves(leaf)).collect(),
            )),
            Value::Map(map) => Value::Map(Rc::new(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.mirror_leaves(leaf)))
                    .collect(),
            )),
            _ => leaf.clone(),
        }
    }

    /// Deep union of two trees. Maps merge key by key and lists merge index
    /// by index; anywhere else `overlay` wins.
    pub fn deep_merge(&self, overlay: &Value) -> Value {
        match (self, overlay) {
            (Value::Map(base), Value::Map(over)) => {
                if Rc::ptr_eq(base, over) {
                    return self.clone();
                }
                let mut merged = (**base).clone();
                for (key, value) in over.iter() {
                    let next = match merged.get(key) {
                        Some(existing) => existing.deep_merge(value),
                        None => value.clone(),
                    };
                    merged.insert(key.clone(), next);
                }
                Value::Map(Rc::new(merged))
            }
            (Value::List(base), Value::List(over)) => {
                let len = base.len().max(over.len());
                let merged = (0..len)
                    .map(|i| match (base.get(i), over.get(i)) {
                        (Some(a), Some(b)) if b.is_null() => a.clone(),
                        (Some(a), Some(b)) => a.deep_merge(b),
                        (Some(a), None) => a.clone(),
                        (None, Some(b)) => b.clone(),
                        (None, None) => Value::Null,
                    })
                    .collect();
                Value::List(Rc::new(merged))
            }
            (_, Value::Null) => self.clone(),
            _ => overlay.clone(),
        }
    }

    /// Drops blank map entries and turns blank list positions into `Null`
    /// placeholders. A blank input compacts to `Null`.
    pub fn compact(&self) -> Value {
        if self.is_blank() {
            return Value::Null;
        }
        match self {
            Value::Map(map) => Value::Map(Rc::new(
                map.iter()
                    .filter(|(_, v)| !v.is_blank())
                    .map(|(k, v)| (k.clone(), v.compact()))
                    .collect(),
            )),
            Value::List(items) => {
                Value::List(Rc::new(items.iter().map(Value::compact).collect()))
            }
            _ => self.clone(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            // NaN equals NaN so a field holding NaN never reads as dirty forever.
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::Value::from(self))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(Rc::new(map))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(Rc::new(items.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(map) => Value::Map(Rc::new(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            )),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => match integral(*n) {
                Some(i) => serde_json::Value::from(i),
                None => serde_json::Number::from_f64(*n)
                    .map_or(serde_json::Value::Null, serde_json::Value::Number),
            },
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        serde_json::Value::from(&v)
    }
}

fn integral(n: f64) -> Option<i64> {
    // 2^53: beyond this f64 no longer represents every integer.
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    (n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_EXACT).then_some(n as i64)
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => s.serialize_unit(),
            Value::Bool(b) => s.serialize_bool(*b),
            Value::Number(n) => match integral(*n) {
                Some(i) => s.serialize_i64(i),
                None => s.serialize_f64(*n),
            },
            Value::String(v) => s.serialize_str(v),
            Value::List(items) => s.collect_seq(items.iter()),
            Value::Map(map) => s.collect_map(map.iter()),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(d).map(Value::from)
    }
}
