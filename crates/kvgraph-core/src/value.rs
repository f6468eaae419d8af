use std::collections::BTreeMap;

use kvgraph_codec::NativeValue;

use crate::list::IndexedSequence;
use crate::map::KeyedMap;
use crate::object::Object;

/// An in-memory value tree.
///
/// Writes accept any variant: `Native` is encoded in place, `Object` is
/// stored as a pointer, `Map` and `List` are persisted as new composites.
/// Reads return `Native` or `Object`. [`Object::materialize`] returns a tree
/// made only of `Native`, `Map` and `List`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Native(NativeValue),
    Map(BTreeMap<String, Value>),
    List(Vec<Value>),
    Object(Object),
}

impl Value {
    /// Short description of the runtime shape, for error messages.
    pub fn shape(&self) -> String {
        match self {
            Self::Native(n) => format!("native {}", n.kind()),
            Self::Map(_) => "map".into(),
            Self::List(_) => "list".into(),
            Self::Object(o) => format!("{} object {}", o.kind(), o.name()),
        }
    }

    pub fn as_native(&self) -> Option<&NativeValue> {
        match self {
            Self::Native(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Native(NativeValue::Integer(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Native(NativeValue::Decimal(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Native(NativeValue::Boolean(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Native(NativeValue::String(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Native(NativeValue::Binary(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The persisted map behind this value, if it is one.
    pub fn into_map(self) -> Option<KeyedMap> {
        self.into_object().and_then(Object::into_map)
    }

    /// The persisted sequence behind this value, if it is one.
    pub fn into_list(self) -> Option<IndexedSequence> {
        self.into_object().and_then(Object::into_list)
    }
}

impl From<NativeValue> for Value {
    fn from(v: NativeValue) -> Self {
        Self::Native(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Native(NativeValue::Integer(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Native(NativeValue::Integer(i64::from(v)))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Native(NativeValue::Decimal(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Native(NativeValue::Boolean(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Native(NativeValue::String(v.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Native(NativeValue::String(v))
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Native(NativeValue::Binary(v.to_vec()))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Self::Map(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Self::Object(v)
    }
}

impl From<KeyedMap> for Value {
    fn from(v: KeyedMap) -> Self {
        Self::Object(Object::Map(v))
    }
}

impl From<IndexedSequence> for Value {
    fn from(v: IndexedSequence) -> Self {
        Self::Object(Object::List(v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
