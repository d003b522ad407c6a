//! Schema-backed configuration entities.
//!
//! A [`ConfigEntity`] is constructed from an untyped [`Value`] by interpreting
//! its [`EntitySchema`]: every field is coerced to its [`ValueType`], defaults
//! are filled in, nested entities are built recursively and polymorphic fields
//! are resolved to one of their variants. Construction is all-or-nothing, the
//! first problem is returned as a [`ValidationError`] naming the field path.
//!
//! Entities own their whole subtree, cloning one yields an independent copy.
//!
//! ```
//! use nuclio_spec::{entity::ConfigEntity, model};
//! use serde_json::json;
//!
//! let mut resources = ConfigEntity::from_value(
//!     model::resources::resource_list(),
//!     &json!({"cpu": 2, "nvidia.com/gpu": "1"}),
//! )
//! .unwrap();
//! assert_eq!(resources.get("gpu").and_then(|gpu| gpu.as_str()), Some("1"));
//!
//! resources.set("memory", "128Mi").unwrap();
//! assert!(resources.set("memory", json!(["128Mi"])).is_err());
//! ```
use std::fmt::Debug;

use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    path::KEY_SEPARATOR,
    schema::{
        EntitySchema, Mode, PolymorphicSchema, SchemaNode, ValidationError, Validator, ValueType,
    },
};

pub(crate) mod coerce;
mod polymorphic;
mod raw;
mod secret;

pub use raw::RawDocument;
pub use secret::{REDACTED, SecretString};

static UNSET: FieldValue = FieldValue::Unset;

/// The value held by a single field of a [`ConfigEntity`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FieldValue {
    /// No value, omitted from sparse documents
    #[default]
    Unset,
    String(String),
    Integer(i64),
    Boolean(bool),
    Secret(SecretString),
    Entity(ConfigEntity),
    List(Vec<FieldValue>),
    Map(IndexMap<String, FieldValue>),
    Raw(RawDocument),
}

impl FieldValue {
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_secret(&self) -> Option<&SecretString> {
        match self {
            Self::Secret(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&ConfigEntity> {
        match self {
            Self::Entity(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, FieldValue>> {
        match self {
            Self::Map(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&RawDocument> {
        match self {
            Self::Raw(value) => Some(value),
            _ => None,
        }
    }

    /// Steps one key down: into an entity field, a list index or a map entry.
    fn child(&self, key: &str) -> Option<&FieldValue> {
        match self {
            Self::Entity(entity) => entity.get(key),
            Self::List(values) => key.parse::<usize>().ok().and_then(|i| values.get(i)),
            Self::Map(values) => values.get(key),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<SecretString> for FieldValue {
    fn from(value: SecretString) -> Self {
        Self::Secret(value)
    }
}

impl From<ConfigEntity> for FieldValue {
    fn from(value: ConfigEntity) -> Self {
        Self::Entity(value)
    }
}

impl From<RawDocument> for FieldValue {
    fn from(value: RawDocument) -> Self {
        Self::Raw(value)
    }
}

/// A validated instance of an [`EntitySchema`].
#[derive(Clone)]
pub struct ConfigEntity {
    schema: &'static EntitySchema,
    values: IndexMap<&'static str, FieldValue>,
}

impl ConfigEntity {
    /// An entity holding only the schema defaults.
    ///
    /// # Errors
    ///
    /// Fails if the schema has required fields without defaults.
    pub fn with_defaults(schema: &'static EntitySchema) -> Result<Self, ValidationError> {
        Self::from_value_with_mode(schema, &Value::Null, Mode::Lenient)
    }

    /// Validates `input` against `schema`, rejecting unknown fields.
    pub fn from_value(
        schema: &'static EntitySchema,
        input: &Value,
    ) -> Result<Self, ValidationError> {
        Self::from_value_with_mode(schema, input, Mode::Strict)
    }

    pub fn from_value_with_mode(
        schema: &'static EntitySchema,
        input: &Value,
        mode: Mode,
    ) -> Result<Self, ValidationError> {
        coerce::entity(schema, input, mode, &Validator::root())
    }

    /// Resolves `input` to one of the variants of `schema`, rejecting unknown fields.
    pub fn from_polymorphic(
        schema: &'static PolymorphicSchema,
        input: &Value,
    ) -> Result<Self, ValidationError> {
        polymorphic::resolve(schema, input, Mode::Strict, &Validator::root())
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    /// Returns the value of a field, looked up by internal or wire name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let node = self.schema.lookup(name)?;
        Some(self.values.get(node.name()).unwrap_or(&UNSET))
    }

    /// Returns the value at a dotted path of internal names, list indices and map keys.
    pub fn get_in(&self, path: &str) -> Option<&FieldValue> {
        let mut keys = path.split(KEY_SEPARATOR);
        let first = self.get(keys.next()?)?;
        keys.try_fold(first, |current, key| current.child(key))
    }

    /// Iterates over all fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static SchemaNode, &FieldValue)> {
        let schema = self.schema;
        schema
            .fields()
            .iter()
            .map(|node| (node, self.values.get(node.name()).unwrap_or(&UNSET)))
    }

    /// Assigns a field, validating only that field. `null` resets it to its default.
    ///
    /// # Errors
    ///
    /// Fails if the field is unknown, read-only or `value` does not validate.
    /// The entity is left unchanged on failure.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ValidationError> {
        self.set_with(name, &value.into(), &Validator::root())
    }

    /// [`ConfigEntity::set`] for a dotted path into nested entities, lists and maps.
    ///
    /// Map entries may be added, list elements only replaced.
    pub fn set_in(&mut self, path: &str, value: impl Into<Value>) -> Result<(), ValidationError> {
        let keys = path.split(KEY_SEPARATOR).collect::<Vec<_>>();
        self.set_in_keys(&keys, &value.into(), &Validator::root())
    }

    fn set_in_keys(
        &mut self,
        keys: &[&str],
        value: &Value,
        validator: &Validator,
    ) -> Result<(), ValidationError> {
        match keys {
            [] => Err(validator.error_unknown_field()),
            [name] => self.set_with(name, value, validator),
            [name, rest @ ..] => {
                let schema = self.schema;
                let node = schema
                    .lookup(name)
                    .ok_or_else(|| validator.field(name).error_unknown_field())?;
                let wire_name = node.wire_name();
                let validator = validator.field(&wire_name);
                let target = self.values.entry(node.name()).or_default();
                set_in_value(target, node.value_type(), rest, value, &validator)
            }
        }
    }

    fn set_with(
        &mut self,
        name: &str,
        value: &Value,
        validator: &Validator,
    ) -> Result<(), ValidationError> {
        let schema = self.schema;
        let node = schema
            .lookup(name)
            .ok_or_else(|| validator.field(&name).error_unknown_field())?;
        let wire_name = node.wire_name();
        let field_validator = validator.field(&wire_name);
        if node.is_read_only() {
            return Err(field_validator.error_read_only());
        }

        let new_value = coerce::field(node, Some(value), Mode::Strict, &field_validator)?;
        let previous = self.values.insert(node.name(), new_value);
        if let Some(finalize) = schema.finalizer() {
            if let Err(err) = finalize(self, validator) {
                self.values.insert(node.name(), previous.unwrap_or_default());
                return Err(err);
            }
        }
        Ok(())
    }

    /// Mutable access to a field, bypassing validation and read-only protection.
    pub(crate) fn field_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        let node = self.schema.lookup(name)?;
        Some(self.values.entry(node.name()).or_default())
    }

    /// Nested entity at `name`, if the field holds one.
    pub(crate) fn entity_mut(&mut self, name: &str) -> Option<&mut ConfigEntity> {
        match self.field_mut(name)? {
            FieldValue::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Writes a field without validation, returns `false` if the schema has no such field.
    pub(crate) fn force_set(&mut self, name: &str, value: impl Into<FieldValue>) -> bool {
        match self.field_mut(name) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }
}

fn set_in_value(
    target: &mut FieldValue,
    value_type: &ValueType,
    keys: &[&str],
    value: &Value,
    validator: &Validator,
) -> Result<(), ValidationError> {
    let Some((key, rest)) = keys.split_first() else {
        return Err(validator.error_unknown_field());
    };

    match (target, value_type) {
        (FieldValue::Entity(entity), _) => entity.set_in_keys(keys, value, validator),
        (FieldValue::List(items), ValueType::List(element)) => {
            let validator = validator.field(key);
            let Some(item) = key.parse::<usize>().ok().and_then(|i| items.get_mut(i)) else {
                return Err(validator.error_unknown_field());
            };
            if rest.is_empty() {
                *item = coerce::value(element, value, Mode::Strict, &validator)?;
                Ok(())
            } else {
                set_in_value(item, element, rest, value, &validator)
            }
        }
        (FieldValue::Map(entries), ValueType::Map(element)) => {
            let validator = validator.field(key);
            if rest.is_empty() {
                let new_value = coerce::value(element, value, Mode::Strict, &validator)?;
                entries.insert((*key).to_owned(), new_value);
                Ok(())
            } else {
                let Some(entry) = entries.get_mut(*key) else {
                    return Err(validator.error_unknown_field());
                };
                set_in_value(entry, element, rest, value, &validator)
            }
        }
        _ => Err(validator.field(key).error_unknown_field()),
    }
}

impl PartialEq for ConfigEntity {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && self.values == other.values
    }
}

impl Eq for ConfigEntity {}

impl Debug for ConfigEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct(self.schema.name());
        for (node, value) in self.fields() {
            if !value.is_unset() {
                debug.field(node.name(), value);
            }
        }
        debug.finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use serde_json::json;

    use super::*;
    use crate::schema::{Rule, ValidationProblem, Variant};

    static LIMITS: LazyLock<EntitySchema> = LazyLock::new(|| {
        EntitySchema::new("Limits")
            .field(SchemaNode::new("cpu", ValueType::StringOrInteger))
            .field(SchemaNode::new("gpu", ValueType::String).with_wire_name("nvidia.com/gpu"))
    });

    static HOST: LazyLock<EntitySchema> = LazyLock::new(|| {
        EntitySchema::new("Host").field(SchemaNode::new("path", ValueType::String).required())
    });

    static CLAIM: LazyLock<EntitySchema> = LazyLock::new(|| {
        EntitySchema::new("Claim")
            .field(SchemaNode::new("claim_name", ValueType::String).required())
    });

    static SOURCE: LazyLock<PolymorphicSchema> = LazyLock::new(|| {
        PolymorphicSchema::new("Source")
            .variant(Variant::structural(|| &HOST))
            .variant(Variant::structural(|| &CLAIM))
    });

    static ROOT: LazyLock<EntitySchema> = LazyLock::new(|| {
        EntitySchema::new("Root")
            .field(SchemaNode::new("kind", ValueType::String).with_default("Root").read_only())
            .field(
                SchemaNode::new("name", ValueType::String)
                    .with_default("root")
                    .with_rule(Rule::Rfc1123Label),
            )
            .field(SchemaNode::new("min_replicas", ValueType::Integer).with_default(1))
            .field(SchemaNode::new("enabled", ValueType::Boolean))
            .field(SchemaNode::new("token", ValueType::Secret))
            .field(SchemaNode::new("limits", ValueType::Entity(|| &LIMITS)))
            .field(SchemaNode::new("source", ValueType::Polymorphic(|| &SOURCE)))
            .field(SchemaNode::new("args", ValueType::list_of(ValueType::String)))
            .field(SchemaNode::new(
                "labels",
                ValueType::map_of(ValueType::StringOrInteger),
            ))
            .field(SchemaNode::new("items", ValueType::list_of(ValueType::Entity(|| &LIMITS))))
    });

    fn root(input: Value) -> Result<ConfigEntity, ValidationError> {
        ConfigEntity::from_value(&ROOT, &input)
    }

    #[test]
    fn fills_defaults() {
        let entity = root(json!({})).unwrap();
        assert_eq!(entity.get("kind"), Some(&FieldValue::from("Root")));
        assert_eq!(entity.get("minReplicas"), Some(&FieldValue::Integer(1)));
        assert_eq!(entity.get("enabled"), Some(&FieldValue::Unset));
        assert!(entity.get("limits").and_then(FieldValue::as_entity).is_some());
        assert_eq!(entity.get("args"), Some(&FieldValue::List(Vec::new())));
        assert_eq!(entity.get("source"), Some(&FieldValue::Unset));
        assert_eq!(entity.get("unknown"), None);
    }

    #[test]
    fn defaults_are_not_shared() {
        let mut a = root(json!({})).unwrap();
        let b = root(json!({})).unwrap();
        a.set_in("limits.cpu", 4).unwrap();
        assert_eq!(b.get_in("limits.cpu"), Some(&FieldValue::Unset));

        let c = a.clone();
        a.set_in("limits.cpu", 8).unwrap();
        assert_eq!(c.get_in("limits.cpu"), Some(&FieldValue::Integer(4)));
    }

    #[test]
    fn accepts_wire_and_internal_names() {
        let entity = root(json!({
            "minReplicas": "3",
            "limits": {"nvidia.com/gpu": "1"},
            "labels": {"app": "x", "weight": 7},
        }))
        .unwrap();
        assert_eq!(entity.get_in("min_replicas").and_then(FieldValue::as_i64), Some(3));
        assert_eq!(entity.get_in("limits.gpu").and_then(FieldValue::as_str), Some("1"));
        assert_eq!(entity.get_in("labels.weight").and_then(FieldValue::as_i64), Some(7));
    }

    #[test]
    fn reports_wire_path_on_type_mismatch() {
        let err = root(json!({"items": [{"cpu": 1}, {"nvidia.com/gpu": []}]})).unwrap_err();
        assert_eq!(err.path().to_string(), "items.1.nvidia.com/gpu");
        assert!(matches!(err.problem(), ValidationProblem::TypeMismatch { .. }));
    }

    #[test]
    fn strict_rejects_unknown_fields_lenient_ignores_them() {
        let err = root(json!({"limits": {"bogus": 1}})).unwrap_err();
        assert_eq!(err.path().to_string(), "limits.bogus");
        assert_eq!(err.problem(), &ValidationProblem::UnknownField);

        let entity =
            ConfigEntity::from_value_with_mode(&ROOT, &json!({"bogus": 1}), Mode::Lenient)
                .unwrap();
        assert_eq!(entity, root(json!({})).unwrap());
    }

    #[test]
    fn set_revalidates_only_the_field() {
        let mut entity = root(json!({})).unwrap();
        entity.set("enabled", "TRUE").unwrap();
        assert_eq!(entity.get("enabled"), Some(&FieldValue::Boolean(true)));

        let before = entity.clone();
        let err = entity.set("min_replicas", "many").unwrap_err();
        assert_eq!(err.path().to_string(), "minReplicas");
        assert_eq!(entity, before);

        let err = entity.set("name", "Not_A_Label").unwrap_err();
        assert!(matches!(err.problem(), ValidationProblem::RuleViolation { .. }));

        entity.set("min_replicas", Value::Null).unwrap();
        assert_eq!(entity.get("min_replicas"), Some(&FieldValue::Integer(1)));
    }

    #[test]
    fn read_only_fields_cannot_be_set() {
        let mut entity = root(json!({"kind": "Root"})).unwrap();
        let err = entity.set("kind", "Other").unwrap_err();
        assert_eq!(err.problem(), &ValidationProblem::ReadOnly);
    }

    #[test]
    fn collections_are_all_or_nothing() {
        let mut entity = root(json!({"args": ["a"]})).unwrap();
        assert!(entity.set("args", json!(["b", {"not": "a string"}])).is_err());
        assert_eq!(
            entity.get("args"),
            Some(&FieldValue::List(vec![FieldValue::from("a")]))
        );
    }

    #[test]
    fn set_in_reaches_lists_and_maps() {
        let mut entity = root(json!({"items": [{"cpu": 1}], "labels": {"a": "b"}})).unwrap();
        entity.set_in("items.0.cpu", "500m").unwrap();
        entity.set_in("labels.c", 3).unwrap();
        assert_eq!(entity.get_in("items.0.cpu").and_then(FieldValue::as_str), Some("500m"));
        assert_eq!(entity.get_in("labels.c").and_then(FieldValue::as_i64), Some(3));

        let err = entity.set_in("items.4.cpu", 1).unwrap_err();
        assert_eq!(err.path().to_string(), "items.4");
        assert_eq!(err.problem(), &ValidationProblem::UnknownField);
    }

    #[test]
    fn resolves_structural_variants() {
        let entity = root(json!({"source": {"claimName": "data"}})).unwrap();
        let source = entity.get("source").and_then(FieldValue::as_entity).unwrap();
        assert_eq!(source.schema().name(), "Claim");
    }

    #[test]
    fn secrets_are_not_printed() {
        let entity = root(json!({"token": "hunter2"})).unwrap();
        assert!(!format!("{entity:?}").contains("hunter2"));
        assert_eq!(
            entity
                .get("token")
                .and_then(FieldValue::as_secret)
                .map(SecretString::expose_secret),
            Some("hunter2")
        );
    }

    #[test]
    fn equality_ignores_input_order() {
        let a = root(json!({"enabled": true, "min_replicas": 2})).unwrap();
        let b = root(json!({"min_replicas": 2, "enabled": true})).unwrap();
        assert_eq!(a, b);
    }
}
