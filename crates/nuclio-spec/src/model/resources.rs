//! Compute resources, security context and platform options of a function.
use std::sync::LazyLock;

use crate::schema::{EntitySchema, SchemaNode, ValueType};

pub const MOUNT_MODES: &[&str] = &["bind", "volume"];
pub const RESTART_POLICIES: &[&str] = &["no", "always", "on-failure", "unless-stopped"];

static RESOURCE_LIST: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("ResourceList")
        .field(SchemaNode::new("cpu", ValueType::StringOrInteger))
        .field(SchemaNode::new("memory", ValueType::String))
        .field(SchemaNode::new("gpu", ValueType::String).with_wire_name("nvidia.com/gpu"))
});

static RESOURCES: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("Resources")
        .field(SchemaNode::new("requests", ValueType::Entity(resource_list)))
        .field(SchemaNode::new("limits", ValueType::Entity(resource_list)))
});

static SECURITY_CONTEXT: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("SecurityContext")
        .field(SchemaNode::new("run_as_user", ValueType::Integer))
        .field(SchemaNode::new("run_as_group", ValueType::Integer))
        .field(SchemaNode::new("fs_group", ValueType::Integer))
});

static RESTART_POLICY: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("RestartPolicy")
        .field(SchemaNode::new("name", ValueType::Enum(RESTART_POLICIES)))
        .field(SchemaNode::new("maximum_retry_count", ValueType::Integer))
});

static PLATFORM_ATTRIBUTES: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("PlatformAttributes")
        .field(SchemaNode::new(
            "restart_policy",
            ValueType::Entity(|| &RESTART_POLICY),
        ))
        .field(SchemaNode::new("mount_mode", ValueType::Enum(MOUNT_MODES)).with_default("bind"))
});

static PLATFORM: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("Platform").field(SchemaNode::new(
        "attributes",
        ValueType::Entity(|| &PLATFORM_ATTRIBUTES),
    ))
});

/// Quantities of `cpu`, `memory` and `nvidia.com/gpu`.
pub fn resource_list() -> &'static EntitySchema {
    &RESOURCE_LIST
}

pub fn resources() -> &'static EntitySchema {
    &RESOURCES
}

pub fn security_context() -> &'static EntitySchema {
    &SECURITY_CONTEXT
}

pub fn platform() -> &'static EntitySchema {
    &PLATFORM
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        document::{SerializeOptions, to_document},
        entity::ConfigEntity,
        schema::ValidationProblem,
    };

    #[test]
    fn gpu_keeps_vendor_key() {
        let resources = ConfigEntity::from_value(
            resources(),
            &json!({"limits": {"cpu": 2, "memory": "1Gi", "nvidia.com/gpu": "1"}}),
        )
        .unwrap();
        assert_eq!(
            to_document(&resources, &SerializeOptions::default()),
            json!({"limits": {"cpu": 2, "memory": "1Gi", "nvidia.com/gpu": "1"}})
        );
    }

    #[test]
    fn mount_mode_defaults_to_bind() {
        let defaults = ConfigEntity::from_value(platform(), &json!({})).unwrap();
        assert_eq!(
            to_document(&defaults, &SerializeOptions::default()),
            json!({"attributes": {"mountMode": "bind"}})
        );

        let err = ConfigEntity::from_value(platform(), &json!({"attributes": {"mountMode": "copy"}}))
            .unwrap_err();
        assert_eq!(err.path().to_string(), "attributes.mountMode");
        assert!(matches!(err.problem(), ValidationProblem::TypeMismatch { .. }));
    }
}
