//! Field-level view filtering.
//!
//! Given an entity and a way to answer "may the requester see this field",
//! [`build_view`] produces the projection of the entity that only contains
//! visible fields plus the always-visible ones (e.g. `thingId`).
//!
//! # Rules
//!
//! For every field `f` of an object at key `k`:
//!
//! | Value of `f` | Kept when |
//! |--------------|-----------|
//! | object | whole, if unrestricted at `k/f`; filtered recursively, if partial at `k/f` |
//! | anything else | unrestricted at `k/f` |
//!
//! A recursively filtered object that ends up empty is only kept when the
//! permission takes effect at its own key. Applying the filter to its own
//! output yields the same output. Non-object entities are returned as-is.

use crate::ResourceKey;
use serde_json::{Map, Value};

/// Permission oracle for one requester and one permission set.
pub(crate) trait FieldAccess {
    /// The permission holds at `key` and nowhere below it is revoked.
    fn unrestricted(&self, key: &ResourceKey) -> bool;

    /// The permission holds at `key` or at least somewhere below it.
    fn partial(&self, key: &ResourceKey) -> bool;

    /// The permission holds at `key` itself.
    fn effective(&self, key: &ResourceKey) -> bool;
}

pub(crate) fn build_view(
    access: &impl FieldAccess,
    resource: &ResourceKey,
    entity: &Value,
    always_visible: &[String],
) -> Value {
    let Value::Object(obj) = entity else {
        return entity.clone();
    };

    let mut filtered = if access.unrestricted(resource) {
        obj.clone()
    } else {
        filter_object(access, resource, obj)
    };

    for field in always_visible {
        if let Some(value) = obj.get(field) {
            filtered.insert(field.clone(), value.clone());
        }
    }

    Value::Object(filtered)
}

fn filter_object(
    access: &impl FieldAccess,
    key: &ResourceKey,
    obj: &Map<String, Value>,
) -> Map<String, Value> {
    let mut out = Map::new();
    for (field, value) in obj {
        let child = key.child(field.as_str());
        match value {
            Value::Object(inner) => {
                if access.unrestricted(&child) {
                    out.insert(field.clone(), value.clone());
                } else if access.partial(&child) {
                    let nested = filter_object(access, &child, inner);
                    if !nested.is_empty() || access.effective(&child) {
                        out.insert(field.clone(), Value::Object(nested));
                    }
                }
            }
            _ => {
                if access.unrestricted(&child) {
                    out.insert(field.clone(), value.clone());
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use twinguard_types::JsonPointer;

    /// Visible: everything under the listed prefixes.
    struct Prefixes(Vec<ResourceKey>);

    impl FieldAccess for Prefixes {
        fn unrestricted(&self, key: &ResourceKey) -> bool {
            self.0.iter().any(|p| p.covers(key))
        }

        fn partial(&self, key: &ResourceKey) -> bool {
            self.0.iter().any(|p| p.covers(key) || key.covers(p))
        }

        fn effective(&self, key: &ResourceKey) -> bool {
            self.unrestricted(key)
        }
    }

    fn key(path: &str) -> ResourceKey {
        ResourceKey::thing(JsonPointer::parse(path))
    }

    #[test]
    fn keeps_only_visible_subtree_and_whitelist() {
        let access = Prefixes(vec![key("/features/temp")]);
        let thing = json!({
            "thingId": "ns:t",
            "attributes": {"owner": "x"},
            "features": {"temp": {"properties": {"v": 21}}, "door": {"properties": {}}}
        });
        let view = build_view(&access, &key("/"), &thing, &["thingId".to_string()]);
        assert_eq!(
            view,
            json!({"thingId": "ns:t", "features": {"temp": {"properties": {"v": 21}}}})
        );
    }

    #[test]
    fn whitelist_survives_when_nothing_is_visible() {
        let access = Prefixes(vec![]);
        let thing = json!({"thingId": "ns:t", "attributes": {"a": 1}});
        let view = build_view(&access, &key("/"), &thing, &["thingId".to_string()]);
        assert_eq!(view, json!({"thingId": "ns:t"}));
    }

    #[test]
    fn non_objects_pass_through() {
        let access = Prefixes(vec![]);
        let value = json!(42);
        assert_eq!(build_view(&access, &key("/attributes/a"), &value, &[]), value);
    }

    #[test]
    fn filtering_is_idempotent() {
        let access = Prefixes(vec![key("/attributes/public"), key("/features/temp/properties")]);
        let thing = json!({
            "thingId": "ns:t",
            "attributes": {"public": {"a": 1}, "secret": 2},
            "features": {"temp": {"definition": ["x"], "properties": {"v": 1}}}
        });
        let always = vec!["thingId".to_string()];
        let once = build_view(&access, &key("/"), &thing, &always);
        let twice = build_view(&access, &key("/"), &once, &always);
        assert_eq!(once, twice);
    }
}
