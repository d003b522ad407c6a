//! Schemas of the `NuclioFunction` document.
//!
//! The schemas are exposed through accessor functions returning `'static`
//! references, so that they can be used with [`crate::entity::ConfigEntity`]
//! directly.
use std::sync::LazyLock;

use crate::schema::{EntitySchema, Rule, SchemaNode, ValueType};

pub mod build;
pub mod metadata;
pub mod resources;
pub mod trigger;
pub mod volume;

pub const API_VERSION: &str = "nuclio.io/v1";
pub const KIND: &str = "NuclioFunction";

pub const DEFAULT_RUNTIME: &str = "python:3.6";
pub const DEFAULT_HANDLER: &str = "main:handler";
pub const DEFAULT_MIN_REPLICAS: i64 = 1;
pub const DEFAULT_MAX_REPLICAS: i64 = 2;

static ENV_VARIABLE: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("EnvVariable")
        .field(
            SchemaNode::new("name", ValueType::String)
                .required()
                .with_rule(Rule::NonEmpty),
        )
        .field(SchemaNode::new("value", ValueType::String).required())
});

static FUNCTION_SPEC: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("FunctionSpec")
        .field(SchemaNode::new("runtime", ValueType::String).with_default(DEFAULT_RUNTIME))
        .field(SchemaNode::new("handler", ValueType::String).with_default(DEFAULT_HANDLER))
        .field(SchemaNode::new("description", ValueType::String))
        .field(SchemaNode::new("image", ValueType::String))
        .field(
            SchemaNode::new("min_replicas", ValueType::Integer)
                .with_default(DEFAULT_MIN_REPLICAS)
                .with_rule(Rule::Range { min: 0, max: i64::MAX }),
        )
        .field(
            SchemaNode::new("max_replicas", ValueType::Integer)
                .with_default(DEFAULT_MAX_REPLICAS)
                .with_rule(Rule::Range { min: 0, max: i64::MAX }),
        )
        .field(SchemaNode::new("replicas", ValueType::Integer))
        .field(
            SchemaNode::new("target_cpu", ValueType::Integer)
                .with_wire_name("targetCPU")
                .with_rule(Rule::Range { min: 1, max: 100 }),
        )
        .field(SchemaNode::new("readiness_timeout_seconds", ValueType::Integer))
        .field(SchemaNode::new("event_timeout", ValueType::Integer))
        .field(SchemaNode::new("avatar", ValueType::String))
        .field(SchemaNode::new(
            "env",
            ValueType::list_of(ValueType::Entity(env_variable)),
        ))
        .field(SchemaNode::new(
            "volumes",
            ValueType::list_of(ValueType::Entity(volume::volume)),
        ))
        .field(SchemaNode::new(
            "triggers",
            ValueType::map_of(ValueType::Polymorphic(trigger::trigger)),
        ))
        .field(SchemaNode::new(
            "resources",
            ValueType::Entity(resources::resources),
        ))
        .field(SchemaNode::new("platform", ValueType::Entity(resources::platform)))
        .field(SchemaNode::new(
            "security_context",
            ValueType::Entity(resources::security_context),
        ))
        .field(SchemaNode::new("build", ValueType::Entity(build::build_spec)))
});

static FUNCTION: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("NuclioFunction")
        .field(
            SchemaNode::new("api_version", ValueType::Enum(&[API_VERSION]))
                .with_default(API_VERSION)
                .read_only(),
        )
        .field(
            SchemaNode::new("kind", ValueType::Enum(&[KIND]))
                .with_default(KIND)
                .read_only(),
        )
        .field(SchemaNode::new(
            "metadata",
            ValueType::Entity(metadata::function_metadata),
        ))
        .field(SchemaNode::new("spec", ValueType::Entity(function_spec)))
});

/// The root of a function document.
pub fn function() -> &'static EntitySchema {
    &FUNCTION
}

pub fn function_spec() -> &'static EntitySchema {
    &FUNCTION_SPEC
}

pub fn env_variable() -> &'static EntitySchema {
    &ENV_VARIABLE
}
