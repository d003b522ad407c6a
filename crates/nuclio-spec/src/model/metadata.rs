use std::sync::LazyLock;

use crate::schema::{EntitySchema, Rule, SchemaNode, ValueType};

pub const DEFAULT_NAME: &str = "function";
pub const DEFAULT_NAMESPACE: &str = "nuclio";

static FUNCTION_METADATA: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("FunctionMetadata")
        .field(
            SchemaNode::new("name", ValueType::String)
                .with_default(DEFAULT_NAME)
                .with_rule(Rule::Rfc1123Label),
        )
        .field(
            SchemaNode::new("namespace", ValueType::String)
                .with_default(DEFAULT_NAMESPACE)
                .with_rule(Rule::Rfc1123Label),
        )
        .field(SchemaNode::new(
            "labels",
            ValueType::map_of(ValueType::StringOrInteger),
        ))
        .field(SchemaNode::new(
            "annotations",
            ValueType::map_of(ValueType::StringOrInteger),
        ))
});

pub fn function_metadata() -> &'static EntitySchema {
    &FUNCTION_METADATA
}
