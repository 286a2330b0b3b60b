//! Dynamic values flowing through checks, configs and the IoC container.
//!
//! Plain data is carried as `serde_json::Value`. Anything that is not data
//! (class instances, services handed out by the container) is carried as an
//! [`ObjectRef`]: a shared handle that knows its class name and lineage, so
//! `isInstanceOf`-style checks can inspect it without knowing its type.
//!
//! Absence is never a `Value`. Lookups return `Option<&Value>` and the
//! validation layer renders `None` as `undefined`.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as Json;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Contract for runtime objects that can travel inside a [`Value`].
pub trait RuntimeObject: Send + Sync {
    /// Fully-qualified class name (e.g. `Core.fs.Directory`).
    fn class_name(&self) -> &str;

    /// Whether this object derives from (or composes) `class_name`.
    fn is_instance_of(&self, class_name: &str) -> bool {
        self.class_name() == class_name
    }
}

struct Opaque {
    type_name: &'static str,
}

impl RuntimeObject for Opaque {
    fn class_name(&self) -> &str {
        self.type_name
    }
}

/// Shared handle to a runtime object.
///
/// Equality is identity: two handles are equal when they point at the same
/// allocation.
#[derive(Clone)]
pub struct ObjectRef {
    object: Arc<dyn RuntimeObject>,
    any: Arc<dyn Any + Send + Sync>,
}

impl ObjectRef {
    /// Wrap an object that implements [`RuntimeObject`].
    pub fn new<T: RuntimeObject + Any>(object: Arc<T>) -> Self {
        Self {
            object: object.clone(),
            any: object,
        }
    }

    /// Wrap an arbitrary service. Its class name is the Rust type name.
    pub fn opaque<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            object: Arc::new(Opaque {
                type_name: std::any::type_name::<T>(),
            }),
            any: value,
        }
    }

    pub fn class_name(&self) -> &str {
        self.object.class_name()
    }

    pub fn is_instance_of(&self, class_name: &str) -> bool {
        self.object.is_instance_of(class_name)
    }

    /// Recover the concrete type behind the handle.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.any.clone().downcast::<T>().ok()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.any, &other.any)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({})", self.class_name())
    }
}

/// A dynamic value: JSON data or a runtime object.
#[derive(Clone, PartialEq)]
pub enum Value {
    Json(Json),
    Object(ObjectRef),
}

impl Value {
    pub fn null() -> Self {
        Value::Json(Json::Null)
    }

    pub fn as_json(&self) -> Option<&Json> {
        match self {
            Value::Json(json) => Some(json),
            Value::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            Value::Json(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Json::as_str)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_json().and_then(Json::as_f64)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_json().and_then(Json::as_i64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_json().and_then(Json::as_bool)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Json(Json::Null))
    }

    /// Coarse type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Json(Json::Null) => "null",
            Value::Json(Json::Bool(_)) => "boolean",
            Value::Json(Json::Number(_)) => "number",
            Value::Json(Json::String(_)) => "string",
            Value::Json(Json::Array(_)) => "array",
            Value::Json(Json::Object(_)) => "object",
            Value::Object(_) => "instance",
        }
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.as_object().and_then(ObjectRef::downcast::<T>)
    }

    /// JSON projection. Runtime objects become `{"$object": "<class>"}`.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Json(json) => json.clone(),
            Value::Object(object) => {
                let mut map = serde_json::Map::new();
                map.insert(
                    "$object".to_string(),
                    Json::String(object.class_name().to_string()),
                );
                Json::Object(map)
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Json(json) => write!(f, "{json}"),
            Value::Object(object) => write!(f, "Object({})", object.class_name()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Json(json) => json.serialize(serializer),
            Value::Object(object) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$object", object.class_name())?;
                map.end()
            }
        }
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Value::Json(json)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Json(Json::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Json(Json::from(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Json(Json::from(b))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Json(Json::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Json(Json::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Json(Json::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Json(Json::from(n))
    }
}

/// Ordered `name → value` map used for explicit configuration, injected
/// dependencies and `$construct` overrides.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct Config {
    entries: BTreeMap<String, Value>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    /// Build a config from a JSON object. Returns `None` for non-objects.
    pub fn from_json(json: Json) -> Option<Self> {
        match json {
            Json::Object(map) => Some(Self::from(map)),
            _ => None,
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `overrides` into this config. Values in `overrides` win.
    pub fn merge(&mut self, overrides: Config) {
        self.entries.extend(overrides.entries);
    }

    pub fn to_json(&self) -> Json {
        Json::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl From<serde_json::Map<String, Json>> for Config {
    fn from(map: serde_json::Map<String, Json>) -> Self {
        Self {
            entries: map.into_iter().map(|(k, v)| (k, Value::Json(v))).collect(),
        }
    }
}

impl FromIterator<(String, Value)> for Config {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Config {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Directory;

    impl RuntimeObject for Directory {
        fn class_name(&self) -> &str {
            "Core.fs.Directory"
        }

        fn is_instance_of(&self, class_name: &str) -> bool {
            matches!(class_name, "Core.fs.Directory" | "Core.fs.Node")
        }
    }

    #[test]
    fn object_refs_compare_by_identity() {
        let dir = Arc::new(Directory);
        let a = ObjectRef::new(dir.clone());
        let b = ObjectRef::new(dir);
        let c = ObjectRef::new(Arc::new(Directory));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is_instance_of("Core.fs.Node"));
        assert!(a.downcast::<Directory>().is_some());
    }

    #[test]
    fn opaque_services_use_rust_type_name() {
        let object = ObjectRef::opaque(Arc::new(42_u32));
        assert_eq!(object.class_name(), "u32");
        assert_eq!(object.downcast::<u32>().as_deref(), Some(&42));
    }

    #[test]
    fn config_merge_prefers_overrides() {
        let mut config = Config::new().with("a", 1).with("b", "keep");
        config.merge(Config::new().with("a", 2));
        assert_eq!(config.get("a"), Some(&Value::from(2)));
        assert_eq!(config.get("b"), Some(&Value::from("keep")));
        assert_eq!(config.to_json(), json!({"a": 2, "b": "keep"}));
    }

    #[test]
    fn objects_serialize_as_class_markers() {
        let value = Value::Object(ObjectRef::new(Arc::new(Directory)));
        assert_eq!(
            serde_json::to_value(&value).expect("serialize"),
            json!({"$object": "Core.fs.Directory"})
        );
        assert_eq!(value.type_name(), "instance");
    }
}
