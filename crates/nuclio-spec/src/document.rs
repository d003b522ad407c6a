//! Rendering entities as YAML or JSON documents, and parsing documents back.
//!
//! Fields are emitted in declaration order under their wire names. By default
//! the output is sparse: unset fields, nested entities without any set field
//! and empty collections are left out, and secrets are replaced by
//! [`REDACTED`].
use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::{ResultExt, Snafu};

use crate::entity::{ConfigEntity, FieldValue, REDACTED};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },

    #[snafu(display("serialized YAML is not valid UTF-8"))]
    YamlNotUtf8 { source: std::string::FromUtf8Error },

    #[snafu(display("failed to serialize JSON"))]
    SerializeJson { source: serde_json::Error },

    #[snafu(display("failed to parse YAML document"))]
    ParseYaml { source: serde_yaml::Error },

    #[snafu(display("failed to parse JSON document"))]
    ParseJson { source: serde_json::Error },
}

/// The document encodings entities can be rendered as.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    PartialEq,
    Eq,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

/// Controls what ends up in a rendered document.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerializeOptions {
    /// Emit unset fields as `null` and keep empty entities and collections.
    pub include_unset: bool,

    /// Emit secret values instead of [`REDACTED`].
    pub reveal_secrets: bool,
}

/// Builds the document tree of `entity`.
pub fn to_document(entity: &ConfigEntity, options: &SerializeOptions) -> Value {
    entity_document(entity, options).unwrap_or_else(|| Value::Object(Map::new()))
}

/// Encodes `document` as `format`.
pub fn render(document: &Value, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => {
            let mut buffer = Vec::new();
            write_explicit_yaml(&mut buffer, document)?;
            String::from_utf8(buffer).context(YamlNotUtf8Snafu)
        }
        OutputFormat::Json => serde_json::to_string_pretty(document).context(SerializeJsonSnafu),
    }
}

/// Decodes a document encoded as `format`.
pub fn parse(input: &str, format: OutputFormat) -> Result<Value> {
    match format {
        OutputFormat::Yaml => serde_yaml::from_str(input).context(ParseYamlSnafu),
        OutputFormat::Json => serde_json::from_str(input).context(ParseJsonSnafu),
    }
}

/// Writes `document` as an explicit YAML document, starting with `---`.
fn write_explicit_yaml<W: Write>(mut writer: W, document: &Value) -> Result<()> {
    writer
        .write_all(b"---\n")
        .context(WriteDocumentSeparatorSnafu)?;
    let mut serializer = serde_yaml::Serializer::new(writer);
    serde_yaml::with::singleton_map_recursive::serialize(document, &mut serializer)
        .context(SerializeYamlSnafu)
}

/// Returns [`None`] if nothing of `entity` is left in a sparse document.
fn entity_document(entity: &ConfigEntity, options: &SerializeOptions) -> Option<Value> {
    let document = entity
        .fields()
        .filter_map(|(node, value)| {
            field_document(value, options).map(|value| (node.wire_name().to_owned(), value))
        })
        .collect::<Map<_, _>>();

    (options.include_unset || !document.is_empty()).then_some(Value::Object(document))
}

fn field_document(value: &FieldValue, options: &SerializeOptions) -> Option<Value> {
    let sparse = !options.include_unset;

    match value {
        FieldValue::Unset => options.include_unset.then_some(Value::Null),
        FieldValue::String(value) => Some(Value::String(value.clone())),
        FieldValue::Integer(value) => Some(Value::from(*value)),
        FieldValue::Boolean(value) => Some(Value::Bool(*value)),
        FieldValue::Secret(secret) if options.reveal_secrets => {
            Some(Value::String(secret.expose_secret().to_owned()))
        }
        FieldValue::Secret(_) => Some(Value::String(REDACTED.to_owned())),
        FieldValue::Entity(entity) => entity_document(entity, options),
        FieldValue::List(items) if sparse && items.is_empty() => None,
        FieldValue::List(items) => Some(Value::Array(
            items
                .iter()
                .map(|item| element_document(item, options))
                .collect(),
        )),
        FieldValue::Map(entries) if sparse && entries.is_empty() => None,
        FieldValue::Map(entries) => Some(Value::Object(
            entries
                .iter()
                .map(|(key, item)| (key.clone(), element_document(item, options)))
                .collect(),
        )),
        FieldValue::Raw(document) if options.reveal_secrets => Some(document.value().clone()),
        FieldValue::Raw(document) => Some(document.redacted()),
    }
}

/// Collection elements are never dropped, that would shift or lose keys.
fn element_document(value: &FieldValue, options: &SerializeOptions) -> Value {
    field_document(value, options).unwrap_or_else(|| match value {
        FieldValue::Entity(_) | FieldValue::Map(_) => Value::Object(Map::new()),
        FieldValue::List(_) => Value::Array(Vec::new()),
        _ => Value::Null,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use indoc::indoc;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::schema::{EntitySchema, SchemaNode, ValueType};

    static CREDENTIALS: LazyLock<EntitySchema> = LazyLock::new(|| {
        EntitySchema::new("Credentials")
            .field(SchemaNode::new("user", ValueType::String))
            .field(SchemaNode::new("access_key", ValueType::Secret))
    });

    static TARGET: LazyLock<EntitySchema> = LazyLock::new(|| {
        EntitySchema::new("Target")
            .field(SchemaNode::new("api_version", ValueType::String).with_default("v1"))
            .field(SchemaNode::new("description", ValueType::String))
            .field(SchemaNode::new("max_replicas", ValueType::Integer).with_default(2))
            .field(SchemaNode::new("credentials", ValueType::Entity(|| &CREDENTIALS)))
            .field(SchemaNode::new("hosts", ValueType::list_of(ValueType::String)))
            .field(SchemaNode::new("payload", ValueType::Any))
    });

    fn target(input: Value) -> ConfigEntity {
        ConfigEntity::from_value(&TARGET, &input).expect("test input is valid")
    }

    #[test]
    fn sparse_by_default() {
        let document = to_document(&target(json!({})), &SerializeOptions::default());
        assert_eq!(document, json!({"apiVersion": "v1", "maxReplicas": 2}));
    }

    #[test]
    fn includes_unset_when_requested() {
        let options = SerializeOptions {
            include_unset: true,
            ..Default::default()
        };
        let document = to_document(&target(json!({})), &options);
        assert_eq!(
            document,
            json!({
                "apiVersion": "v1",
                "description": null,
                "maxReplicas": 2,
                "credentials": {"user": null, "accessKey": null},
                "hosts": [],
                "payload": null,
            })
        );
    }

    #[rstest]
    #[case(false, "**********")]
    #[case(true, "hunter2")]
    fn secrets(#[case] reveal_secrets: bool, #[case] expected: &str) {
        let entity = target(json!({"credentials": {"accessKey": "hunter2"}}));
        let options = SerializeOptions {
            reveal_secrets,
            ..Default::default()
        };
        let document = to_document(&entity, &options);
        assert_eq!(document["credentials"], json!({"accessKey": expected}));
    }

    #[test]
    fn preserves_declaration_order() {
        let entity = target(json!({"hosts": ["a"], "description": "d", "apiVersion": "v2"}));
        let rendered = render(
            &to_document(&entity, &SerializeOptions::default()),
            OutputFormat::Yaml,
        )
        .unwrap();
        assert_eq!(
            rendered,
            indoc! {"
                ---
                apiVersion: v2
                description: d
                maxReplicas: 2
                hosts:
                - a
            "}
        );
    }

    #[test]
    fn renders_json() {
        let entity = target(json!({"payload": {"b": 1, "a": [true]}}));
        let rendered = render(
            &to_document(&entity, &SerializeOptions::default()),
            OutputFormat::Json,
        )
        .unwrap();
        assert_eq!(
            parse(&rendered, OutputFormat::Json).unwrap(),
            json!({"apiVersion": "v1", "maxReplicas": 2, "payload": {"b": 1, "a": [true]}})
        );
    }

    #[test]
    fn parses_yaml() {
        let document = parse(
            indoc! {"
                ---
                apiVersion: v1
                hosts: [a, b]
            "},
            OutputFormat::Yaml,
        )
        .unwrap();
        assert_eq!(document, json!({"apiVersion": "v1", "hosts": ["a", "b"]}));
        assert!(parse("hosts: [a", OutputFormat::Yaml).is_err());
    }

    #[test]
    fn parses_formats() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::Yaml.to_string(), "yaml");
    }

    #[test]
    fn options_from_config() {
        let options: SerializeOptions =
            serde_json::from_value(json!({"revealSecrets": true})).unwrap();
        assert_eq!(
            options,
            SerializeOptions {
                include_unset: false,
                reveal_secrets: true,
            }
        );
        assert_eq!(
            serde_json::from_value::<OutputFormat>(json!("json")).unwrap(),
            OutputFormat::Json
        );
    }
}
