//! In-memory persistence.
//!
//! [`InMemoryPersistence`] keeps Things and Policies in process memory. It
//! is the worker behavior of a [`ThingShard`](super::ThingShard) and the
//! loader of both enforcer caches, so a complete enforcement stack can run
//! without an external store.

use super::{BehaviorFactory, ThingBehavior};
use crate::cache::{CacheEntry, CacheError, CacheKey, EntryLoader};
use crate::command::{
    ResponseStatus, ThingAction, ThingCommand, ThingResponse, ACL_FIELD, THING_ID_FIELD,
};
use crate::enforcement::consistency::inline_policy_id;
use crate::enforcement::registry;
use crate::error::ThingError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use twinguard_auth::{
    AccessControlList, AclEnforcer, EffectedPermissions, Enforcer, Permissions, Policy,
    PolicyEnforcer, PolicyEntry, ResourceKey, POLICY_ID_FIELD,
};
use twinguard_types::{AuthorizationContext, JsonPointer, PolicyId, ThingId};

#[derive(Default)]
struct MemoryState {
    things: RwLock<HashMap<ThingId, Value>>,
    policies: RwLock<HashMap<PolicyId, Policy>>,
}

/// Thing and Policy store shared by workers and cache loaders.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    state: Arc<MemoryState>,
}

impl InMemoryPersistence {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `thing` under `thing_id`, replacing any previous one.
    pub fn put_thing(&self, thing_id: ThingId, thing: Value) {
        self.state.things.write().insert(thing_id, thing);
    }

    /// Returns a copy of the stored Thing.
    #[must_use]
    pub fn thing(&self, thing_id: &ThingId) -> Option<Value> {
        self.state.things.read().get(thing_id).cloned()
    }

    /// Removes a Thing.
    pub fn remove_thing(&self, thing_id: &ThingId) -> Option<Value> {
        self.state.things.write().remove(thing_id)
    }

    /// Stores `policy` under `policy_id`, replacing any previous one.
    pub fn put_policy(&self, policy_id: PolicyId, mut policy: Policy) {
        policy.policy_id = Some(policy_id.clone());
        self.state.policies.write().insert(policy_id, policy);
    }

    /// Stores `policy` under `policy_id` unless a Policy with that id
    /// exists. Returns whether it was stored.
    pub fn insert_policy(&self, policy_id: PolicyId, mut policy: Policy) -> bool {
        match self.state.policies.write().entry(policy_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                policy.policy_id = Some(slot.key().clone());
                slot.insert(policy);
                true
            }
        }
    }

    /// Returns a copy of the stored Policy.
    #[must_use]
    pub fn policy(&self, policy_id: &PolicyId) -> Option<Policy> {
        self.state.policies.read().get(policy_id).cloned()
    }

    /// Removes a Policy.
    pub fn remove_policy(&self, policy_id: &PolicyId) -> Option<Policy> {
        self.state.policies.write().remove(policy_id)
    }
}

impl BehaviorFactory for InMemoryPersistence {
    type Behavior = InMemoryThing;

    fn create(&self, thing_id: &ThingId) -> InMemoryThing {
        InMemoryThing {
            thing_id: thing_id.clone(),
            store: self.clone(),
        }
    }
}

/// Resolves which enforcer governs a Thing.
#[async_trait]
impl EntryLoader<CacheKey, CacheKey> for InMemoryPersistence {
    async fn load(&self, key: &CacheKey) -> Result<CacheEntry<CacheKey>, CacheError> {
        let thing_id = key
            .thing_id()
            .map_err(|e| CacheError::load_failed(key, e.to_string()))?;
        let Some(thing) = self.thing(&thing_id) else {
            return Ok(CacheEntry::nonexistent());
        };

        if let Some(raw) = thing.get(POLICY_ID_FIELD).and_then(Value::as_str) {
            let policy_id =
                PolicyId::new(raw).map_err(|e| CacheError::load_failed(key, e.to_string()))?;
            return Ok(CacheEntry::present(CacheKey::policy(&policy_id)));
        }
        if has_acl(&thing) {
            return Ok(CacheEntry::present(CacheKey::thing(&thing_id)));
        }
        Ok(CacheEntry::present(CacheKey::policy(&PolicyId::from(thing_id))))
    }
}

/// Builds the enforcer an enforcer key denotes.
#[async_trait]
impl EntryLoader<CacheKey, Enforcer> for InMemoryPersistence {
    async fn load(&self, key: &CacheKey) -> Result<CacheEntry<Enforcer>, CacheError> {
        if key.is_thing() {
            let thing_id = key
                .thing_id()
                .map_err(|e| CacheError::load_failed(key, e.to_string()))?;
            let Some(acl) = self.thing(&thing_id).and_then(|t| t.get(ACL_FIELD).cloned()) else {
                return Ok(CacheEntry::nonexistent());
            };
            let acl = AccessControlList::from_json(&acl)
                .map_err(|e| CacheError::load_failed(key, e.to_string()))?;
            return Ok(CacheEntry::present(AclEnforcer::new(acl).into()));
        }
        if key.is_policy() {
            let policy_id = key
                .policy_id()
                .map_err(|e| CacheError::load_failed(key, e.to_string()))?;
            return Ok(self
                .policy(&policy_id)
                .map(|p| Enforcer::from(PolicyEnforcer::new(&p)))
                .into());
        }
        Ok(CacheEntry::nonexistent())
    }
}

/// Worker behavior applying commands to one Thing of an
/// [`InMemoryPersistence`].
pub struct InMemoryThing {
    thing_id: ThingId,
    store: InMemoryPersistence,
}

#[async_trait]
impl ThingBehavior for InMemoryThing {
    async fn handle(&mut self, command: ThingCommand) -> Result<ThingResponse, ThingError> {
        let current = self.store.thing(&self.thing_id);
        match (&command.action, current) {
            (ThingAction::CreateThing { .. }, Some(_)) => Err(ThingError::ThingConflict {
                thing_id: self.thing_id.clone(),
            }),
            (
                ThingAction::CreateThing {
                    thing,
                    initial_policy,
                }
                | ThingAction::ModifyThing {
                    thing,
                    initial_policy,
                },
                None,
            ) => self.create(&command, thing, initial_policy.as_ref()),
            (_, None) => Err(ThingError::ThingNotAccessible {
                thing_id: self.thing_id.clone(),
                missing_policy: None,
            }),
            (_, Some(thing)) => self.apply(&command, thing),
        }
    }
}

impl InMemoryThing {
    fn create(
        &self,
        command: &ThingCommand,
        thing: &Value,
        initial_policy: Option<&Value>,
    ) -> Result<ThingResponse, ThingError> {
        let mut obj = self.object(thing)?;
        obj.insert(THING_ID_FIELD.to_string(), json!(self.thing_id.as_str()));

        let policy = match initial_policy.filter(|p| !p.is_null()) {
            Some(inline) => {
                let policy =
                    Policy::from_json(inline).map_err(|e| ThingError::InlinePolicyInvalid {
                        thing_id: self.thing_id.clone(),
                        reason: e.to_string(),
                    })?;
                Some((inline_policy_id(&self.thing_id, thing, &policy), policy))
            }
            None if !obj.contains_key(POLICY_ID_FIELD) && !has_acl_field(&obj) => Some((
                PolicyId::from(self.thing_id.clone()),
                default_policy(command.auth_context()),
            )),
            None => None,
        };
        if let Some((policy_id, policy)) = policy {
            obj.insert(POLICY_ID_FIELD.to_string(), json!(policy_id.as_str()));
            if !self.store.insert_policy(policy_id.clone(), policy) {
                return Err(ThingError::PolicyConflict {
                    thing_id: self.thing_id.clone(),
                    policy_id,
                });
            }
        }

        let created = Value::Object(obj);
        self.store.put_thing(self.thing_id.clone(), created.clone());
        Ok(command.respond(ResponseStatus::Created, Some(created)))
    }

    fn apply(&self, command: &ThingCommand, mut thing: Value) -> Result<ThingResponse, ThingError> {
        let path = command.resource_path();
        match &command.action {
            ThingAction::CreateThing { .. } => Err(ThingError::ThingConflict {
                thing_id: self.thing_id.clone(),
            }),
            ThingAction::ModifyThing { thing: new, .. } => {
                let mut obj = self.object(new)?;
                obj.insert(THING_ID_FIELD.to_string(), json!(self.thing_id.as_str()));
                if !obj.contains_key(POLICY_ID_FIELD) && !has_acl_field(&obj) {
                    for field in [POLICY_ID_FIELD, ACL_FIELD] {
                        if let Some(previous) = thing.get(field) {
                            obj.insert(field.to_string(), previous.clone());
                        }
                    }
                }
                self.store.put_thing(self.thing_id.clone(), Value::Object(obj));
                Ok(command.respond(ResponseStatus::NoContent, None))
            }
            ThingAction::DeleteThing => {
                self.store.remove_thing(&self.thing_id);
                Ok(command.respond(ResponseStatus::NoContent, None))
            }
            ThingAction::RetrieveThing { selected_fields } => {
                let entity = match selected_fields {
                    Some(fields) => project(&thing, fields),
                    None => thing,
                };
                Ok(command.respond(ResponseStatus::Ok, Some(entity)))
            }
            _ if !command.is_modifying() => {
                let entity = get_at(&thing, &path)
                    .cloned()
                    .ok_or_else(|| registry::not_found(command))?;
                Ok(command.respond(ResponseStatus::Ok, Some(entity)))
            }
            action => match self.payload(action)? {
                Some(value) => {
                    let created = set_at(&mut thing, &path, value.clone()).map_err(|reason| {
                        ThingError::PayloadInvalid {
                            thing_id: self.thing_id.clone(),
                            reason,
                        }
                    })?;
                    self.store.put_thing(self.thing_id.clone(), thing);
                    Ok(if created {
                        command.respond(ResponseStatus::Created, Some(value))
                    } else {
                        command.respond(ResponseStatus::NoContent, None)
                    })
                }
                None => {
                    remove_at(&mut thing, &path).ok_or_else(|| registry::not_found(command))?;
                    self.store.put_thing(self.thing_id.clone(), thing);
                    Ok(command.respond(ResponseStatus::NoContent, None))
                }
            },
        }
    }

    /// Value written by a sub-resource modify; `None` for deletes.
    fn payload(&self, action: &ThingAction) -> Result<Option<Value>, ThingError> {
        use ThingAction as A;
        let value = match action {
            A::ModifyAttributes { attributes: v }
            | A::ModifyFeatures { features: v }
            | A::ModifyFeature { feature: v, .. } => Value::Object(self.object(v)?),
            A::ModifyAttribute { value, .. } | A::ModifyFeatureProperty { value, .. } => {
                value.clone()
            }
            A::ModifyAcl { acl } => {
                AccessControlList::from_json(acl).map_err(|e| ThingError::AclInvalid {
                    thing_id: self.thing_id.clone(),
                    reason: e.to_string(),
                })?;
                acl.clone()
            }
            A::ModifyAclEntry { permissions, .. } => AccessControlList::entry_to_json(*permissions),
            A::ModifyPolicyId { policy_id } => json!(policy_id.as_str()),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn object(&self, value: &Value) -> Result<Map<String, Value>, ThingError> {
        match value {
            Value::Object(obj) => Ok(obj.clone()),
            _ => Err(ThingError::PayloadInvalid {
                thing_id: self.thing_id.clone(),
                reason: "expected a JSON object".to_string(),
            }),
        }
    }
}

/// Policy given to a Thing created without any authorization source:
/// the creator may do everything on the Thing and the Policy.
fn default_policy(ctx: &AuthorizationContext) -> Policy {
    let all = EffectedPermissions::granted(
        Permissions::READ | Permissions::WRITE | Permissions::ADMINISTRATE,
    );
    let Some(creator) = ctx.first() else {
        return Policy::new(None);
    };
    Policy::new(None).with_entry(
        "DEFAULT",
        PolicyEntry::for_subjects([creator.clone()])
            .with_resource(ResourceKey::thing(JsonPointer::root()), all)
            .with_resource(ResourceKey::policy(JsonPointer::root()), all),
    )
}

fn has_acl(thing: &Value) -> bool {
    thing.as_object().is_some_and(has_acl_field)
}

fn has_acl_field(obj: &Map<String, Value>) -> bool {
    obj.get(ACL_FIELD).is_some_and(|acl| !acl.is_null())
}

fn get_at<'a>(value: &'a Value, path: &JsonPointer) -> Option<&'a Value> {
    path.segments().iter().try_fold(value, |current, segment| match current {
        Value::Object(obj) => obj.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Writes `new` at `path`, creating missing parent objects. Returns `true`
/// if nothing was at `path` before.
fn set_at(value: &mut Value, path: &JsonPointer, new: Value) -> Result<bool, String> {
    let Some((last, parents)) = path.segments().split_last() else {
        *value = new;
        return Ok(false);
    };
    let mut current = value;
    for segment in parents {
        current = match current {
            Value::Object(obj) => obj
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return Err(format!("'{path}' does not address an object member")),
        };
    }
    let Value::Object(obj) = current else {
        return Err(format!("'{path}' does not address an object member"));
    };
    Ok(obj.insert(last.clone(), new).is_none())
}

fn remove_at(value: &mut Value, path: &JsonPointer) -> Option<Value> {
    let (last, parents) = path.segments().split_last()?;
    let mut current = value;
    for segment in parents {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    current.as_object_mut()?.remove(last)
}

fn project(thing: &Value, fields: &[JsonPointer]) -> Value {
    let mut out = Value::Object(Map::new());
    for field in fields {
        if let Some(value) = get_at(thing, field) {
            // A selection below an already selected scalar is skipped.
            let _ = set_at(&mut out, field, value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinguard_types::ErrorCode;

    fn thing_id() -> ThingId {
        ThingId::new("ns:lamp").expect("valid thing id")
    }

    async fn run(
        store: &InMemoryPersistence,
        action: ThingAction,
    ) -> Result<ThingResponse, ThingError> {
        let command = ThingCommand::new(thing_id(), AuthorizationContext::new(["carol"]), action);
        store.create(&thing_id()).handle(command).await
    }

    #[tokio::test]
    async fn create_without_policy_installs_default_policy() {
        let store = InMemoryPersistence::new();
        let resp = run(
            &store,
            ThingAction::CreateThing {
                thing: json!({"attributes": {"a": 1}}),
                initial_policy: None,
            },
        )
        .await
        .expect("created");

        assert_eq!(resp.status, ResponseStatus::Created);
        let stored = store.thing(&thing_id()).expect("stored");
        assert_eq!(stored["thingId"], "ns:lamp");
        assert_eq!(stored["policyId"], "ns:lamp");

        let policy = store
            .policy(&PolicyId::from(thing_id()))
            .expect("default policy");
        let enforcer = PolicyEnforcer::new(&policy);
        let carol = AuthorizationContext::new(["carol"]);
        assert!(enforcer.has_unrestricted_permissions(
            &ResourceKey::thing(JsonPointer::root()),
            &carol,
            Permissions::WRITE | Permissions::ADMINISTRATE,
        ));
    }

    #[tokio::test]
    async fn inline_policy_is_stored_under_thing_id() {
        let store = InMemoryPersistence::new();
        run(
            &store,
            ThingAction::CreateThing {
                thing: json!({}),
                initial_policy: Some(json!({
                    "entries": {"owner": {
                        "subjects": {"carol": {}},
                        "resources": {"thing:/": {"grant": ["READ"]}}
                    }}
                })),
            },
        )
        .await
        .expect("created");

        let stored = store.thing(&thing_id()).expect("stored");
        assert_eq!(stored["policyId"], "ns:lamp");
        let policy = store.policy(&PolicyId::from(thing_id())).expect("stored policy");
        assert!(policy.entries.contains_key("owner"));
    }

    #[tokio::test]
    async fn create_twice_conflicts() {
        let store = InMemoryPersistence::new();
        let create = || ThingAction::CreateThing {
            thing: json!({}),
            initial_policy: None,
        };
        run(&store, create()).await.expect("created");
        assert!(matches!(
            run(&store, create()).await,
            Err(ThingError::ThingConflict { .. })
        ));
    }

    #[tokio::test]
    async fn replace_keeps_policy_id() {
        let store = InMemoryPersistence::new();
        store.put_thing(thing_id(), json!({"thingId": "ns:lamp", "policyId": "ns:p"}));
        let resp = run(
            &store,
            ThingAction::ModifyThing {
                thing: json!({"attributes": {"x": 1}}),
                initial_policy: None,
            },
        )
        .await
        .expect("replaced");
        assert_eq!(resp.status, ResponseStatus::NoContent);
        assert_eq!(
            store.thing(&thing_id()),
            Some(json!({"thingId": "ns:lamp", "policyId": "ns:p", "attributes": {"x": 1}}))
        );
    }

    #[tokio::test]
    async fn replace_keeps_acl() {
        let store = InMemoryPersistence::new();
        let acl = json!({"root": {"READ": true, "WRITE": true, "ADMINISTRATE": true}});
        store.put_thing(thing_id(), json!({"thingId": "ns:lamp", "acl": acl.clone()}));
        run(
            &store,
            ThingAction::ModifyThing {
                thing: json!({"attributes": {"on": true}}),
                initial_policy: None,
            },
        )
        .await
        .expect("replaced");
        assert_eq!(
            store.thing(&thing_id()),
            Some(json!({"thingId": "ns:lamp", "acl": acl, "attributes": {"on": true}}))
        );
    }

    #[tokio::test]
    async fn create_never_replaces_a_stored_policy() {
        let store = InMemoryPersistence::new();
        let victim = PolicyId::new("ns:victim").expect("valid policy id");
        store.put_policy(victim.clone(), Policy::new(None));

        let err = run(
            &store,
            ThingAction::CreateThing {
                thing: json!({"policyId": "ns:victim"}),
                initial_policy: Some(json!({"policyId": "ns:victim", "entries": {}})),
            },
        )
        .await
        .expect_err("conflict");
        assert_eq!(
            err,
            ThingError::PolicyConflict {
                thing_id: thing_id(),
                policy_id: victim.clone(),
            }
        );
        assert!(store.thing(&thing_id()).is_none());
        assert!(store.policy(&victim).is_some_and(|p| p.entries.is_empty()));

        store.put_policy(PolicyId::from(thing_id()), Policy::new(None));
        let err = run(
            &store,
            ThingAction::CreateThing {
                thing: json!({}),
                initial_policy: None,
            },
        )
        .await
        .expect_err("default policy conflict");
        assert_eq!(err.code(), "THING_POLICY_CONFLICT");
    }

    #[tokio::test]
    async fn sub_resource_lifecycle() {
        let store = InMemoryPersistence::new();
        store.put_thing(thing_id(), json!({"thingId": "ns:lamp", "policyId": "ns:p"}));
        let room = JsonPointer::parse("/location/room");

        let created = run(
            &store,
            ThingAction::ModifyAttribute {
                pointer: room.clone(),
                value: json!("kitchen"),
            },
        )
        .await
        .expect("modified");
        assert_eq!(created.status, ResponseStatus::Created);

        let updated = run(
            &store,
            ThingAction::ModifyAttribute {
                pointer: room.clone(),
                value: json!("hall"),
            },
        )
        .await
        .expect("modified");
        assert_eq!(updated.status, ResponseStatus::NoContent);

        let read = run(&store, ThingAction::RetrieveAttributes)
            .await
            .expect("retrieved");
        assert_eq!(read.entity, Some(json!({"location": {"room": "hall"}})));

        run(&store, ThingAction::DeleteAttribute { pointer: room.clone() })
            .await
            .expect("deleted");
        let missing = run(&store, ThingAction::RetrieveAttribute { pointer: room }).await;
        assert!(matches!(
            missing,
            Err(ThingError::AttributeNotAccessible { .. })
        ));
    }

    #[tokio::test]
    async fn commands_against_missing_thing_fail() {
        let store = InMemoryPersistence::new();
        assert!(matches!(
            run(&store, ThingAction::RetrieveFeatures).await,
            Err(ThingError::ThingNotAccessible {
                missing_policy: None,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn invalid_acl_is_rejected() {
        let store = InMemoryPersistence::new();
        store.put_thing(thing_id(), json!({"thingId": "ns:lamp", "acl": {}}));
        let result = run(
            &store,
            ThingAction::ModifyAcl {
                acl: json!({"alice": {"FLY": true}}),
            },
        )
        .await;
        assert!(matches!(result, Err(ThingError::AclInvalid { .. })));
    }

    #[tokio::test]
    async fn retrieve_projects_selected_fields() {
        let store = InMemoryPersistence::new();
        store.put_thing(
            thing_id(),
            json!({"thingId": "ns:lamp", "attributes": {"a": 1, "b": 2}, "features": {}}),
        );
        let resp = run(
            &store,
            ThingAction::RetrieveThing {
                selected_fields: Some(vec![
                    JsonPointer::parse("/thingId"),
                    JsonPointer::parse("/attributes/b"),
                ]),
            },
        )
        .await
        .expect("retrieved");
        assert_eq!(
            resp.entity,
            Some(json!({"thingId": "ns:lamp", "attributes": {"b": 2}}))
        );
    }

    #[tokio::test]
    async fn id_loader_prefers_policy_over_acl() {
        let store = InMemoryPersistence::new();
        let key = CacheKey::thing(&thing_id());

        store.put_thing(thing_id(), json!({"policyId": "ns:p"}));
        let resolved = EntryLoader::<CacheKey, CacheKey>::load(&store, &key)
            .await
            .expect("loaded");
        assert_eq!(
            resolved.into_value(),
            Some(CacheKey::policy(&PolicyId::new("ns:p").expect("valid policy id")))
        );

        store.put_thing(thing_id(), json!({"acl": {"alice": {"READ": true}}}));
        let resolved = EntryLoader::<CacheKey, CacheKey>::load(&store, &key)
            .await
            .expect("loaded");
        assert_eq!(resolved.into_value(), Some(key.clone()));

        let enforcer = EntryLoader::<CacheKey, Enforcer>::load(&store, &key)
            .await
            .expect("loaded");
        assert!(matches!(enforcer.into_value(), Some(Enforcer::Acl(_))));
    }

    #[tokio::test]
    async fn missing_thing_resolves_to_nothing() {
        let store = InMemoryPersistence::new();
        let key = CacheKey::thing(&thing_id());
        let resolved = EntryLoader::<CacheKey, CacheKey>::load(&store, &key)
            .await
            .expect("loaded");
        assert!(!resolved.exists());
    }
}
