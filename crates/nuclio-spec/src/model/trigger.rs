//! Triggers, discriminated by their `kind`.
//!
//! Every trigger carries the common fields (`kind`, `maxWorkers`, `disabled`,
//! `annotations`) and an `attributes` entity specific to its kind. `kind` is
//! read-only: switching the kind means replacing the whole trigger.
use std::sync::LazyLock;

use serde_json::Value;

use crate::{
    entity::{ConfigEntity, FieldValue, RawDocument},
    schema::{EntitySchema, PolymorphicSchema, SchemaNode, ValidationError, ValueType, Variant},
};

pub const HTTP_KINDS: &[&str] = &["http"];
pub const KAFKA_KINDS: &[&str] = &["kafka-cluster", "kafka"];
pub const V3IO_STREAM_KINDS: &[&str] = &["v3io-stream", "v3ioStream"];
pub const CRON_KINDS: &[&str] = &["cron"];

pub const KIND: &str = "kind";

pub const OFFSETS: &[&str] = &["earliest", "latest"];
pub const WORKER_ALLOCATION_MODES: &[&str] = &["static", "pool"];

/// The fields shared by all trigger kinds, followed by `extra` and `attributes`.
fn trigger_schema(
    name: &'static str,
    kinds: &'static [&'static str],
    extra: Vec<SchemaNode>,
    attributes: fn() -> &'static EntitySchema,
) -> EntitySchema {
    let canonical = kinds.first().copied().unwrap_or_default();
    let schema = EntitySchema::new(name)
        .field(
            SchemaNode::new(KIND, ValueType::String)
                .with_default(canonical)
                .read_only(),
        )
        .field(SchemaNode::new("max_workers", ValueType::Integer))
        .field(SchemaNode::new("disabled", ValueType::Boolean))
        .field(SchemaNode::new(
            "annotations",
            ValueType::map_of(ValueType::StringOrInteger),
        ));

    extra
        .into_iter()
        .fold(schema, EntitySchema::field)
        .field(SchemaNode::new("attributes", ValueType::Entity(attributes)))
}

static INGRESS: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("Ingress")
        .field(SchemaNode::new("host", ValueType::String))
        .field(SchemaNode::new("paths", ValueType::list_of(ValueType::String)))
        .field(SchemaNode::new("secret_name", ValueType::String))
});

static HTTP_ATTRIBUTES: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("HttpAttributes")
        .field(SchemaNode::new("port", ValueType::Integer))
        .field(SchemaNode::new(
            "ingresses",
            ValueType::map_of(ValueType::Entity(|| &INGRESS)),
        ))
        .field(SchemaNode::new(
            "service_type",
            ValueType::Enum(&["ClusterIP", "NodePort"]),
        ))
});

static HTTP: LazyLock<EntitySchema> =
    LazyLock::new(|| trigger_schema("HttpTrigger", HTTP_KINDS, Vec::new(), || &HTTP_ATTRIBUTES));

static SASL: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("Sasl")
        .field(SchemaNode::new("enable", ValueType::Boolean))
        .field(SchemaNode::new("user", ValueType::String))
        .field(SchemaNode::new("password", ValueType::Secret))
});

static KAFKA_ATTRIBUTES: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("KafkaAttributes")
        .field(SchemaNode::new("consumer_group", ValueType::String))
        .field(SchemaNode::new("topic", ValueType::String))
        .field(SchemaNode::new("topics", ValueType::list_of(ValueType::String)))
        .field(SchemaNode::new("brokers", ValueType::list_of(ValueType::String)))
        .field(SchemaNode::new("partitions", ValueType::list_of(ValueType::Integer)))
        .field(SchemaNode::new("initial_offset", ValueType::Enum(OFFSETS)))
        .field(SchemaNode::new("session_timeout", ValueType::String))
        .field(SchemaNode::new("heartbeat_interval", ValueType::String))
        .field(SchemaNode::new(
            "worker_allocation_mode",
            ValueType::Enum(WORKER_ALLOCATION_MODES),
        ))
        .field(SchemaNode::new("fetch_min", ValueType::Integer))
        .field(SchemaNode::new("fetch_default", ValueType::Integer))
        .field(SchemaNode::new("fetch_max", ValueType::Integer))
        .field(SchemaNode::new("channel_buffer_size", ValueType::Integer))
        .field(SchemaNode::new("max_processing_time", ValueType::String))
        .field(SchemaNode::new("rebalance_timeout", ValueType::String))
        .field(SchemaNode::new("rebalance_max_try", ValueType::Integer))
        .field(SchemaNode::new("rebalance_retry_timeout", ValueType::String))
        .field(SchemaNode::new(
            "max_wait_handler_during_rebalance",
            ValueType::String,
        ))
        .field(SchemaNode::new("sasl", ValueType::Entity(|| &SASL)))
});

static KAFKA: LazyLock<EntitySchema> = LazyLock::new(|| {
    trigger_schema(
        "KafkaTrigger",
        KAFKA_KINDS,
        vec![SchemaNode::new("url", ValueType::String)],
        || &KAFKA_ATTRIBUTES,
    )
});

static V3IO_STREAM_ATTRIBUTES: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("V3ioStreamAttributes")
        .field(SchemaNode::new("container_name", ValueType::String))
        .field(SchemaNode::new("stream_path", ValueType::String))
        .field(SchemaNode::new("consumer_group", ValueType::String))
        .field(SchemaNode::new("seek_to", ValueType::Enum(OFFSETS)))
        .field(SchemaNode::new("partitions", ValueType::list_of(ValueType::Integer)))
        .field(SchemaNode::new("polling_interval_ms", ValueType::Integer))
        .field(SchemaNode::new("read_batch_size", ValueType::Integer))
        .field(SchemaNode::new("session_timeout", ValueType::String))
        .field(SchemaNode::new("heartbeat_interval", ValueType::String))
        .field(SchemaNode::new(
            "worker_allocation_mode",
            ValueType::Enum(WORKER_ALLOCATION_MODES),
        ))
});

static V3IO_STREAM: LazyLock<EntitySchema> = LazyLock::new(|| {
    trigger_schema(
        "V3ioStreamTrigger",
        V3IO_STREAM_KINDS,
        vec![
            SchemaNode::new("url", ValueType::String),
            SchemaNode::new("password", ValueType::Secret),
        ],
        || &V3IO_STREAM_ATTRIBUTES,
    )
});

static CRON_EVENT: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("CronEvent")
        .field(SchemaNode::new("body", ValueType::String))
        .field(SchemaNode::new(
            "headers",
            ValueType::map_of(ValueType::StringOrInteger),
        ))
});

static CRON_ATTRIBUTES: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("CronAttributes")
        .field(SchemaNode::new("schedule", ValueType::String))
        .field(SchemaNode::new("interval", ValueType::String))
        .field(SchemaNode::new("concurrency", ValueType::String))
        .field(SchemaNode::new("job_back_off_limit", ValueType::Integer))
        .field(SchemaNode::new("event", ValueType::Entity(|| &CRON_EVENT)))
});

static CRON: LazyLock<EntitySchema> =
    LazyLock::new(|| trigger_schema("CronTrigger", CRON_KINDS, Vec::new(), || &CRON_ATTRIBUTES));

static TRIGGER: LazyLock<PolymorphicSchema> = LazyLock::new(|| {
    PolymorphicSchema::new("Trigger")
        .with_discriminator(KIND)
        .variant(Variant::tagged(HTTP_KINDS, || &HTTP))
        .variant(Variant::tagged(KAFKA_KINDS, || &KAFKA))
        .variant(Variant::tagged(V3IO_STREAM_KINDS, || &V3IO_STREAM))
        .variant(Variant::tagged(CRON_KINDS, || &CRON))
});

pub fn trigger() -> &'static PolymorphicSchema {
    &TRIGGER
}

/// A trigger as stored in a function: either validated against its kind, or a
/// raw document assembled by one of the trigger builders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerSpec {
    Validated(ConfigEntity),
    Raw(RawDocument),
}

impl TriggerSpec {
    /// Validates a trigger document, selecting the layout by its `kind`.
    pub fn from_value(input: &Value) -> Result<Self, ValidationError> {
        ConfigEntity::from_polymorphic(trigger(), input).map(Self::Validated)
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Validated(entity) => entity.get(KIND).and_then(FieldValue::as_str),
            Self::Raw(document) => document.value().get(KIND).and_then(Value::as_str),
        }
    }
}

impl From<ConfigEntity> for TriggerSpec {
    fn from(entity: ConfigEntity) -> Self {
        Self::Validated(entity)
    }
}

impl From<RawDocument> for TriggerSpec {
    fn from(document: RawDocument) -> Self {
        Self::Raw(document)
    }
}

impl From<TriggerSpec> for FieldValue {
    fn from(trigger: TriggerSpec) -> Self {
        match trigger {
            TriggerSpec::Validated(entity) => Self::Entity(entity),
            TriggerSpec::Raw(document) => Self::Raw(document),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{
        document::{OutputFormat, SerializeOptions, parse, to_document},
        schema::ValidationProblem,
    };

    #[rstest]
    #[case("http", "HttpTrigger")]
    #[case("kafka-cluster", "KafkaTrigger")]
    #[case("kafka", "KafkaTrigger")]
    #[case("v3io-stream", "V3ioStreamTrigger")]
    #[case("v3ioStream", "V3ioStreamTrigger")]
    #[case("cron", "CronTrigger")]
    fn selects_layout_by_kind(#[case] kind: &str, #[case] schema: &str) {
        let TriggerSpec::Validated(entity) = TriggerSpec::from_value(&json!({"kind": kind})).unwrap()
        else {
            panic!("expected a validated trigger");
        };
        assert_eq!(entity.schema().name(), schema);
        assert_eq!(entity.get(KIND).and_then(FieldValue::as_str), Some(kind));
    }

    #[test]
    fn attributes_follow_the_kind() {
        let err = TriggerSpec::from_value(&json!({"kind": "cron", "attributes": {"port": 8080}}))
            .unwrap_err();
        assert_eq!(err.path().to_string(), "attributes.port");
        assert_eq!(err.problem(), &ValidationProblem::UnknownField);
    }

    #[test]
    fn kind_is_read_only() {
        let TriggerSpec::Validated(mut entity) =
            TriggerSpec::from_value(&json!({"kind": "http"})).unwrap()
        else {
            panic!("expected a validated trigger");
        };
        let err = entity.set(KIND, "cron").unwrap_err();
        assert_eq!(err.problem(), &ValidationProblem::ReadOnly);
    }

    #[test]
    fn kafka_sasl_password_is_secret() {
        let input = parse(
            indoc! {"
                kind: kafka
                url: broker:9092
                maxWorkers: 2
                attributes:
                  topic: events
                  partitions: [0, 1]
                  sasl:
                    enable: true
                    user: admin
                    password: hunter2
            "},
            OutputFormat::Yaml,
        )
        .unwrap();
        let TriggerSpec::Validated(entity) = TriggerSpec::from_value(&input).unwrap() else {
            panic!("expected a validated trigger");
        };
        assert_eq!(
            to_document(&entity, &SerializeOptions::default()),
            json!({
                "kind": "kafka",
                "maxWorkers": 2,
                "url": "broker:9092",
                "attributes": {
                    "topic": "events",
                    "partitions": [0, 1],
                    "sasl": {"enable": true, "user": "admin", "password": "**********"},
                },
            })
        );
    }

    #[test]
    fn cron_attributes() {
        let input = json!({
            "kind": "cron",
            "attributes": {"schedule": "* * * * *", "concurrency": "Allow", "jobBackOffLimit": 2},
        });
        let trigger = TriggerSpec::from_value(&input).unwrap();
        let TriggerSpec::Validated(entity) = &trigger else {
            panic!("expected a validated trigger");
        };
        assert_eq!(
            entity.get_in("attributes.concurrency").and_then(FieldValue::as_str),
            Some("Allow")
        );
        assert_eq!(to_document(entity, &SerializeOptions::default()), input);
    }

    #[test]
    fn raw_kind() {
        let raw = TriggerSpec::from(RawDocument::new(json!({"kind": "cron"})));
        assert_eq!(raw.kind(), Some("cron"));
    }
}
