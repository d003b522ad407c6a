//! How the function image is built, and where its code comes from.
use std::sync::LazyLock;

use crate::{
    entity::{ConfigEntity, FieldValue},
    schema::{
        EntitySchema, PolymorphicSchema, SchemaNode, ValidationError, Validator, ValueType,
        Variant,
    },
};

pub const DEFAULT_BASE_IMAGE: &str = "python:3.6";
pub const CODE_ENTRY_TYPES: &[&str] = &["s3", "github", "archive"];

const CODE_ENTRY_TYPE: &str = "code_entry_type";
const CODE_ENTRY_ATTRIBUTES: &str = "code_entry_attributes";

static S3_ATTRIBUTES: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("S3Attributes")
        .field(SchemaNode::new("s3_bucket", ValueType::String).required())
        .field(SchemaNode::new("s3_item_key", ValueType::String).required())
        .field(SchemaNode::new("s3_access_key_id", ValueType::String))
        .field(SchemaNode::new("s3_secret_access_key", ValueType::Secret))
        .field(SchemaNode::new("s3_session_token", ValueType::Secret))
        .field(SchemaNode::new("s3_region", ValueType::String))
        .field(SchemaNode::new("work_dir", ValueType::String))
});

static GITHUB_HEADERS: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("GithubHeaders").field(
        SchemaNode::new("auth_token", ValueType::Secret).with_wire_name("Authorization"),
    )
});

static GITHUB_ATTRIBUTES: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("GithubAttributes")
        .field(SchemaNode::new("branch", ValueType::String).required())
        .field(SchemaNode::new("headers", ValueType::Entity(|| &GITHUB_HEADERS)))
        .field(SchemaNode::new("work_dir", ValueType::String))
});

static ARCHIVE_HEADERS: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("ArchiveHeaders").field(
        SchemaNode::new("v3io_key", ValueType::Secret).with_wire_name("X-V3io-Session-Key"),
    )
});

static ARCHIVE_ATTRIBUTES: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("ArchiveAttributes")
        .field(SchemaNode::new("headers", ValueType::Entity(|| &ARCHIVE_HEADERS)))
        .field(SchemaNode::new("work_dir", ValueType::String))
});

static CODE_ENTRY: LazyLock<PolymorphicSchema> = LazyLock::new(|| {
    PolymorphicSchema::new("CodeEntryAttributes")
        .variant(Variant::structural(|| &S3_ATTRIBUTES))
        .variant(Variant::structural(|| &GITHUB_ATTRIBUTES))
        .variant(Variant::structural(|| &ARCHIVE_ATTRIBUTES))
});

static BUILD_SPEC: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("BuildSpec")
        .field(SchemaNode::new("path", ValueType::String))
        .field(SchemaNode::new("function_source_code", ValueType::String))
        .field(SchemaNode::new("registry", ValueType::String))
        .field(SchemaNode::new("no_base_image_pull", ValueType::Boolean))
        .field(SchemaNode::new("no_cache", ValueType::Boolean))
        .field(SchemaNode::new("base_image", ValueType::String).with_default(DEFAULT_BASE_IMAGE))
        .field(
            SchemaNode::new("commands", ValueType::list_of(ValueType::String))
                .with_wire_name("Commands"),
        )
        .field(SchemaNode::new("onbuild_image", ValueType::String))
        .field(SchemaNode::new("image", ValueType::String))
        .field(SchemaNode::new(CODE_ENTRY_TYPE, ValueType::Enum(CODE_ENTRY_TYPES)))
        .field(SchemaNode::new(
            CODE_ENTRY_ATTRIBUTES,
            ValueType::Polymorphic(|| &CODE_ENTRY),
        ))
        .with_finalizer(match_code_entry_type)
});

pub fn build_spec() -> &'static EntitySchema {
    &BUILD_SPEC
}

fn code_entry_type_of(attributes: &ConfigEntity) -> Option<&'static str> {
    let schema = attributes.schema();
    if std::ptr::eq(schema, &*S3_ATTRIBUTES) {
        Some("s3")
    } else if std::ptr::eq(schema, &*GITHUB_ATTRIBUTES) {
        Some("github")
    } else if std::ptr::eq(schema, &*ARCHIVE_ATTRIBUTES) {
        Some("archive")
    } else {
        None
    }
}

/// Infers `codeEntryType` from the attributes, or checks that both agree.
fn match_code_entry_type(
    build: &mut ConfigEntity,
    validator: &Validator,
) -> Result<(), ValidationError> {
    let Some(inferred) = build
        .get(CODE_ENTRY_ATTRIBUTES)
        .and_then(FieldValue::as_entity)
        .and_then(code_entry_type_of)
    else {
        return Ok(());
    };

    match build.get(CODE_ENTRY_TYPE).and_then(FieldValue::as_str) {
        None => {
            build.force_set(CODE_ENTRY_TYPE, inferred);
            Ok(())
        }
        Some(declared) if declared == inferred => Ok(()),
        Some(declared) => Err(validator.field(&"codeEntryType").error_rule(format!(
            "code entry type {declared:?} does not match the {inferred:?} code entry attributes"
        ))),
    }
}
