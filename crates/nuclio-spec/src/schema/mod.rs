//! Explicit schema descriptions for configuration entities.
//!
//! Every entity is described by an [`EntitySchema`]: an ordered list of
//! [`SchemaNode`]s, each naming a field, its [`ValueType`], default and wire
//! name. Fields whose value may take one of several shapes refer to a
//! [`PolymorphicSchema`], which lists the candidate variants in the order in
//! which they are tried.
//!
//! The schemas are plain data and are interpreted by the generic validator in
//! [`crate::entity`]. Schemas are built once, stored in statics and referred to
//! through `fn() -> &'static _` accessors, so that entities can refer to each
//! other (and to themselves) without any initialization order concerns.
//!
//! ```
//! use nuclio_spec::schema::{EntitySchema, SchemaNode, ValueType};
//!
//! let schema = EntitySchema::new("Resources")
//!     .field(SchemaNode::new("cpu", ValueType::StringOrInteger))
//!     .field(SchemaNode::new("gpu", ValueType::String).with_wire_name("nvidia.com/gpu"));
//!
//! assert_eq!(schema.lookup("nvidia.com/gpu").map(|node| node.name()), Some("gpu"));
//! ```
use std::fmt::Display;

use crate::{
    entity::{ConfigEntity, FieldValue},
    naming, validation,
};

mod validator;

pub use validator::*;

/// Accessor for a statically stored [`EntitySchema`].
pub type SchemaRef = fn() -> &'static EntitySchema;

/// Accessor for a statically stored [`PolymorphicSchema`].
pub type PolymorphicRef = fn() -> &'static PolymorphicSchema;

/// Controls how fields that are not part of a schema are treated.
///
/// All public constructors validate in [`Mode::Strict`]. [`Mode::Lenient`] is
/// meant for internal defaulting and has to be requested explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    /// Unknown fields are rejected
    #[default]
    Strict,

    /// Unknown fields are ignored
    Lenient,
}

/// The semantic type of a field.
#[derive(Clone, Debug)]
pub enum ValueType {
    String,
    Integer,
    Boolean,

    /// A string that is redacted when serialized, unless explicitly revealed.
    Secret,

    /// Either a string or an integer, used for label and annotation values.
    StringOrInteger,

    /// A string restricted to a fixed set of values.
    Enum(&'static [&'static str]),

    Entity(SchemaRef),
    Polymorphic(PolymorphicRef),
    List(Box<ValueType>),

    /// A mapping from user-chosen keys (which are never translated) to values.
    Map(Box<ValueType>),

    /// Any document fragment, kept verbatim.
    Any,
}

impl ValueType {
    pub fn list_of(element: Self) -> Self {
        Self::List(Box::new(element))
    }

    pub fn map_of(element: Self) -> Self {
        Self::Map(Box::new(element))
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Integer => f.write_str("integer"),
            Self::Boolean => f.write_str("boolean"),
            Self::Secret => f.write_str("secret string"),
            Self::StringOrInteger => f.write_str("string or integer"),
            Self::Enum(allowed) => write!(f, "one of {allowed:?}"),
            Self::Entity(schema) => write!(f, "mapping ({})", schema().name()),
            Self::Polymorphic(schema) => write!(f, "mapping ({})", schema().name()),
            Self::List(element) => write!(f, "sequence of {element}"),
            Self::Map(element) => write!(f, "mapping of {element}"),
            Self::Any => f.write_str("any value"),
        }
    }
}

/// An additional check on a field value, run after type coercion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
    /// The string must be usable as a Kubernetes object name.
    Rfc1123Label,

    /// The integer must lie within `min..=max`.
    Range { min: i64, max: i64 },

    /// The string or collection must not be empty.
    NonEmpty,
}

impl Rule {
    /// Returns a human readable description of the violation, if any.
    pub(crate) fn check(&self, value: &FieldValue) -> Result<(), String> {
        match (self, value) {
            (Self::Rfc1123Label, FieldValue::String(value)) => {
                validation::is_rfc_1123_label(value).map_err(|err| err.to_string())
            }
            (Self::Range { min, max }, FieldValue::Integer(value)) => {
                if (*min..=*max).contains(value) {
                    Ok(())
                } else {
                    Err(format!("{value} is not within {min}..={max}"))
                }
            }
            (Self::NonEmpty, FieldValue::String(value)) if value.is_empty() => {
                Err("must not be empty".to_owned())
            }
            (Self::NonEmpty, FieldValue::List(values)) if values.is_empty() => {
                Err("must not be empty".to_owned())
            }
            (Self::NonEmpty, FieldValue::Map(values)) if values.is_empty() => {
                Err("must not be empty".to_owned())
            }
            // Rules only apply to the value types they are written for, unset values are never checked
            _ => Ok(()),
        }
    }
}

/// A typed, named field of an [`EntitySchema`].
#[derive(Clone, Debug)]
pub struct SchemaNode {
    name: &'static str,
    wire_name: String,
    value_type: ValueType,
    default: Option<FieldValue>,
    required: bool,
    read_only: bool,
    rule: Option<Rule>,
}

impl SchemaNode {
    /// Creates an optional field without a default. The wire name is derived
    /// using [`naming::to_wire_name`].
    pub fn new(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            wire_name: naming::to_wire_name(name),
            value_type,
            default: None,
            required: false,
            read_only: false,
            rule: None,
        }
    }

    /// Overrides the derived wire name. The override is emitted verbatim.
    pub fn with_wire_name(mut self, wire_name: &'static str) -> Self {
        self.wire_name = wire_name.to_owned();
        self
    }

    pub fn with_default(mut self, default: impl Into<FieldValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Marks the field as required: it has to be supplied unless it has a default.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the field as read-only: it can only be set while constructing the entity.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn wire_name(&self) -> &str {
        &self.wire_name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn default_value(&self) -> Option<&FieldValue> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn rule(&self) -> Option<Rule> {
        self.rule
    }

    /// Whether `key` refers to this field, either by internal or by wire name.
    pub fn matches(&self, key: &str) -> bool {
        self.name == key || self.wire_name == key
    }
}

/// Runs after all fields of an entity were validated, for constraints that span
/// several fields. It may fill in derived values.
pub type Finalizer = fn(&mut ConfigEntity, &Validator) -> Result<(), ValidationError>;

/// The ordered set of fields that make up one entity.
#[derive(Debug)]
pub struct EntitySchema {
    name: &'static str,
    fields: Vec<SchemaNode>,
    finalizer: Option<Finalizer>,
}

impl EntitySchema {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
            finalizer: None,
        }
    }

    pub fn field(mut self, node: SchemaNode) -> Self {
        self.fields.push(node);
        self
    }

    pub fn with_finalizer(mut self, finalizer: Finalizer) -> Self {
        self.finalizer = Some(finalizer);
        self
    }

    pub fn finalizer(&self) -> Option<Finalizer> {
        self.finalizer
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[SchemaNode] {
        &self.fields
    }

    /// Looks up a field by internal or wire name.
    pub fn lookup(&self, key: &str) -> Option<&SchemaNode> {
        self.fields.iter().find(|node| node.matches(key))
    }

    /// Fields that have to be present in the input.
    pub fn required_fields(&self) -> impl Iterator<Item = &SchemaNode> {
        self.fields
            .iter()
            .filter(|node| node.required && node.default.is_none())
    }
}

/// One candidate shape of a [`PolymorphicSchema`].
#[derive(Debug)]
pub struct Variant {
    tags: &'static [&'static str],
    schema: SchemaRef,
}

impl Variant {
    /// A variant that is only selected structurally.
    pub fn structural(schema: SchemaRef) -> Self {
        Self { tags: &[], schema }
    }

    /// A variant selected by any of its discriminator values.
    pub fn tagged(tags: &'static [&'static str], schema: SchemaRef) -> Self {
        Self { tags, schema }
    }

    pub fn tags(&self) -> &'static [&'static str] {
        self.tags
    }

    pub fn schema(&self) -> &'static EntitySchema {
        (self.schema)()
    }
}

/// A field whose value must be exactly one of a fixed, ordered set of shapes.
#[derive(Debug)]
pub struct PolymorphicSchema {
    name: &'static str,
    discriminator: Option<&'static str>,
    variants: Vec<Variant>,
}

impl PolymorphicSchema {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            discriminator: None,
            variants: Vec::new(),
        }
    }

    /// Selects variants by the value of `field` whenever the input carries it.
    pub fn with_discriminator(mut self, field: &'static str) -> Self {
        self.discriminator = Some(field);
        self
    }

    pub fn variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn discriminator(&self) -> Option<&'static str> {
        self.discriminator
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Finds the variant accepting the discriminator value `tag`.
    pub fn variant_for_tag(&self, tag: &str) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|variant| variant.tags.contains(&tag))
    }

    /// All accepted discriminator values, in declaration order.
    pub fn tags(&self) -> Vec<String> {
        self.variants
            .iter()
            .flat_map(|variant| variant.tags.iter().map(|tag| (*tag).to_owned()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn derives_and_overrides_wire_names() {
        let derived = SchemaNode::new("min_replicas", ValueType::Integer);
        assert_eq!(derived.wire_name(), "minReplicas");

        let overridden =
            SchemaNode::new("gpu", ValueType::String).with_wire_name("nvidia.com/gpu");
        assert_eq!(overridden.wire_name(), "nvidia.com/gpu");
        assert!(overridden.matches("gpu"));
        assert!(overridden.matches("nvidia.com/gpu"));
        assert!(!overridden.matches("nvidiaComGpu"));
    }

    #[test]
    fn required_fields_with_defaults_are_not_required_in_input() {
        let schema = EntitySchema::new("Test")
            .field(SchemaNode::new("name", ValueType::String).required())
            .field(
                SchemaNode::new("driver", ValueType::String)
                    .required()
                    .with_default("v3io/fuse"),
            );

        let required = schema
            .required_fields()
            .map(SchemaNode::name)
            .collect::<Vec<_>>();
        assert_eq!(required, ["name"]);
    }

    #[rstest]
    #[case(Rule::Range { min: 0, max: 100 }, FieldValue::Integer(0), true)]
    #[case(Rule::Range { min: 0, max: 100 }, FieldValue::Integer(100), true)]
    #[case(Rule::Range { min: 0, max: 100 }, FieldValue::Integer(101), false)]
    #[case(Rule::Range { min: 0, max: 100 }, FieldValue::Integer(-1), false)]
    #[case(Rule::Rfc1123Label, FieldValue::String("my-function".to_owned()), true)]
    #[case(Rule::Rfc1123Label, FieldValue::String("My_Function".to_owned()), false)]
    #[case(Rule::NonEmpty, FieldValue::String(String::new()), false)]
    #[case(Rule::NonEmpty, FieldValue::List(Vec::new()), false)]
    #[case(Rule::NonEmpty, FieldValue::Unset, true)]
    fn rules(#[case] rule: Rule, #[case] value: FieldValue, #[case] valid: bool) {
        assert_eq!(rule.check(&value).is_ok(), valid);
    }

    #[test]
    fn parses_modes() {
        assert_eq!("strict".parse::<Mode>().unwrap(), Mode::Strict);
        assert_eq!(Mode::Lenient.to_string(), "lenient");
    }
}
