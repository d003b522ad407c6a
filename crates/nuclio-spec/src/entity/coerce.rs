use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use super::{ConfigEntity, FieldValue, RawDocument, SecretString, polymorphic};
use crate::schema::{EntitySchema, Mode, SchemaNode, ValidationError, Validator, ValueType};

/// Builds an entity of `schema` from `input`, `null` being treated like an empty mapping.
pub(crate) fn entity(
    schema: &'static EntitySchema,
    input: &Value,
    mode: Mode,
    validator: &Validator,
) -> Result<ConfigEntity, ValidationError> {
    let empty = Map::new();
    let input = match input {
        Value::Object(input) => input,
        Value::Null => &empty,
        other => {
            return Err(
                validator.error_type_mismatch(format_args!("mapping ({})", schema.name()), other)
            );
        }
    };

    for key in input.keys() {
        if schema.lookup(key).is_none() {
            match mode {
                Mode::Strict => return Err(validator.field(key).error_unknown_field()),
                Mode::Lenient => {
                    debug!(entity = schema.name(), field = %key, "ignoring unknown field");
                }
            }
        }
    }

    let mut values = IndexMap::with_capacity(schema.fields().len());
    for node in schema.fields() {
        let wire_name = node.wire_name();
        let validator = validator.field(&wire_name);
        let value = field(node, supplied(input, node, mode, &validator)?, mode, &validator)?;
        values.insert(node.name(), value);
    }

    let mut entity = ConfigEntity { schema, values };
    if let Some(finalize) = schema.finalizer() {
        finalize(&mut entity, validator)?;
    }
    Ok(entity)
}

/// An entity holding only defaults, without checking for required fields.
pub(crate) fn defaults(schema: &'static EntitySchema) -> ConfigEntity {
    let values = schema
        .fields()
        .iter()
        .map(|node| {
            let value = match (node.default_value(), node.value_type()) {
                (Some(default), _) => default.clone(),
                (None, ValueType::Entity(schema)) => FieldValue::Entity(defaults(schema())),
                (None, ValueType::List(_)) => FieldValue::List(Vec::new()),
                (None, ValueType::Map(_)) => FieldValue::Map(IndexMap::new()),
                (None, _) => FieldValue::Unset,
            };
            (node.name(), value)
        })
        .collect();
    ConfigEntity { schema, values }
}

/// The input for `node`, given under either its wire name or its internal name.
///
/// Differing values under both names are rejected in strict mode. Lenient mode
/// takes the wire name.
fn supplied<'a>(
    input: &'a Map<String, Value>,
    node: &SchemaNode,
    mode: Mode,
    validator: &Validator,
) -> Result<Option<&'a Value>, ValidationError> {
    let present = |key: &str| input.get(key).filter(|value| !value.is_null());
    let by_wire_name = present(node.wire_name());
    let by_name = present(node.name()).filter(|_| node.name() != node.wire_name());

    match (by_wire_name, by_name) {
        (Some(wire), Some(internal)) if wire != internal => match mode {
            Mode::Strict => Err(validator.error_conflicting_keys(node.name(), node.wire_name())),
            Mode::Lenient => {
                debug!(
                    field = node.wire_name(),
                    "ignoring value given under the internal field name"
                );
                Ok(Some(wire))
            }
        },
        (by_wire_name, by_name) => Ok(by_wire_name.or(by_name)),
    }
}

/// Validates the value of a single field. Absent and `null` input fall back to the default.
pub(crate) fn field(
    node: &SchemaNode,
    input: Option<&Value>,
    mode: Mode,
    validator: &Validator,
) -> Result<FieldValue, ValidationError> {
    let coerced = match input.filter(|input| !input.is_null()) {
        Some(input) => value(node.value_type(), input, mode, validator)?,
        None => match node.default_value() {
            Some(default) => default.clone(),
            None if node.is_required() => return Err(validator.error_required()),
            None => absent(node.value_type(), mode, validator)?,
        },
    };

    if let Some(rule) = node.rule() {
        rule.check(&coerced)
            .map_err(|message| validator.error_rule(message))?;
    }
    Ok(coerced)
}

/// The value of a field that was not supplied and has no default.
fn absent(
    value_type: &ValueType,
    mode: Mode,
    validator: &Validator,
) -> Result<FieldValue, ValidationError> {
    Ok(match value_type {
        ValueType::Entity(schema) => {
            FieldValue::Entity(entity(schema(), &Value::Null, mode, validator)?)
        }
        ValueType::List(_) => FieldValue::List(Vec::new()),
        ValueType::Map(_) => FieldValue::Map(IndexMap::new()),
        _ => FieldValue::Unset,
    })
}

/// Coerces `input` to `value_type`.
pub(crate) fn value(
    value_type: &ValueType,
    input: &Value,
    mode: Mode,
    validator: &Validator,
) -> Result<FieldValue, ValidationError> {
    let mismatch = || validator.error_type_mismatch(value_type, input);

    match (value_type, input) {
        (ValueType::String, Value::String(value)) => Ok(FieldValue::String(value.clone())),
        (ValueType::String, Value::Number(value)) => Ok(FieldValue::String(value.to_string())),
        (ValueType::Integer, _) => integer(input).map(FieldValue::Integer).ok_or_else(mismatch),
        (ValueType::Boolean, Value::Bool(value)) => Ok(FieldValue::Boolean(*value)),
        (ValueType::Boolean, Value::String(value)) => match value.to_ascii_lowercase().as_str() {
            "true" => Ok(FieldValue::Boolean(true)),
            "false" => Ok(FieldValue::Boolean(false)),
            _ => Err(mismatch()),
        },
        (ValueType::Secret, Value::String(value)) => {
            Ok(FieldValue::Secret(SecretString::new(value.as_str())))
        }
        (ValueType::StringOrInteger, Value::String(value)) => Ok(FieldValue::String(value.clone())),
        (ValueType::StringOrInteger, Value::Number(value)) => {
            value.as_i64().map(FieldValue::Integer).ok_or_else(mismatch)
        }
        (ValueType::Enum(allowed), Value::String(value)) if allowed.contains(&value.as_str()) => {
            Ok(FieldValue::String(value.clone()))
        }
        (ValueType::Entity(schema), _) => {
            entity(schema(), input, mode, validator).map(FieldValue::Entity)
        }
        (ValueType::Polymorphic(schema), _) => {
            polymorphic::resolve(schema(), input, mode, validator).map(FieldValue::Entity)
        }
        (ValueType::List(element), Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| value(element, item, mode, &validator.field(&index)))
            .collect::<Result<Vec<_>, _>>()
            .map(FieldValue::List),
        (ValueType::Map(element), Value::Object(entries)) => entries
            .iter()
            .map(|(key, item)| Ok((key.clone(), value(element, item, mode, &validator.field(key))?)))
            .collect::<Result<IndexMap<_, _>, _>>()
            .map(FieldValue::Map),
        (ValueType::Any, _) => Ok(FieldValue::Raw(RawDocument::new(input.clone()))),
        _ => Err(mismatch()),
    }
}

fn integer(input: &Value) -> Option<i64> {
    match input {
        Value::Number(number) => number.as_i64(),
        Value::String(string) => string.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::schema::ValidationProblem;

    const SEVERITIES: &[&str] = &["low", "high"];

    #[rstest]
    #[case(ValueType::String, json!("a"), FieldValue::from("a"))]
    #[case(ValueType::String, json!(3), FieldValue::from("3"))]
    #[case(ValueType::Integer, json!(3), FieldValue::Integer(3))]
    #[case(ValueType::Integer, json!(" 42 "), FieldValue::Integer(42))]
    #[case(ValueType::Boolean, json!(false), FieldValue::Boolean(false))]
    #[case(ValueType::Boolean, json!("True"), FieldValue::Boolean(true))]
    #[case(ValueType::StringOrInteger, json!(7), FieldValue::Integer(7))]
    #[case(ValueType::StringOrInteger, json!("7"), FieldValue::from("7"))]
    #[case(ValueType::Enum(SEVERITIES), json!("high"), FieldValue::from("high"))]
    #[case(ValueType::list_of(ValueType::Integer), json!([1, "2"]), FieldValue::List(vec![FieldValue::Integer(1), FieldValue::Integer(2)]))]
    fn coerces(#[case] value_type: ValueType, #[case] input: Value, #[case] expected: FieldValue) {
        let coerced = value(&value_type, &input, Mode::Strict, &Validator::root()).unwrap();
        assert_eq!(coerced, expected);
    }

    #[rstest]
    #[case(ValueType::String, json!(true))]
    #[case(ValueType::String, json!(["a"]))]
    #[case(ValueType::Integer, json!("4.5"))]
    #[case(ValueType::Integer, json!(4.5))]
    #[case(ValueType::Boolean, json!("yes"))]
    #[case(ValueType::Boolean, json!(1))]
    #[case(ValueType::Secret, json!(1234))]
    #[case(ValueType::StringOrInteger, json!(1.5))]
    #[case(ValueType::Enum(SEVERITIES), json!("medium"))]
    #[case(ValueType::map_of(ValueType::String), json!(["a"]))]
    fn rejects(#[case] value_type: ValueType, #[case] input: Value) {
        let err = value(&value_type, &input, Mode::Strict, &Validator::root()).unwrap_err();
        assert!(
            matches!(err.problem(), ValidationProblem::TypeMismatch { .. }),
            "{err:?}"
        );
    }

    #[test]
    fn names_failing_element() {
        let err = value(
            &ValueType::map_of(ValueType::Integer),
            &json!({"a": 1, "b": "x"}),
            Mode::Strict,
            &Validator::root(),
        )
        .unwrap_err();
        assert_eq!(err.path().to_string(), "b");
    }

    #[test]
    fn required_without_default() {
        let node = SchemaNode::new("name", ValueType::String).required();
        let err = field(&node, Some(&Value::Null), Mode::Strict, &Validator::root()).unwrap_err();
        assert_eq!(err.problem(), &ValidationProblem::FieldRequired);
    }

    static REPLICAS: LazyLock<EntitySchema> = LazyLock::new(|| {
        EntitySchema::new("Replicas")
            .field(SchemaNode::new("min_replicas", ValueType::Integer).with_default(1_i64))
    });

    #[rstest]
    #[case(json!({"minReplicas": 3}), 3)]
    #[case(json!({"min_replicas": 3}), 3)]
    #[case(json!({"minReplicas": 3, "min_replicas": 3}), 3)]
    #[case(json!({"minReplicas": null, "min_replicas": 5}), 5)]
    #[case(json!({"minReplicas": null}), 1)]
    fn accepts_either_name(#[case] input: Value, #[case] expected: i64) {
        let replicas = entity(&REPLICAS, &input, Mode::Strict, &Validator::root()).unwrap();
        assert_eq!(
            replicas.get("min_replicas").and_then(FieldValue::as_i64),
            Some(expected)
        );
    }

    #[test]
    fn rejects_differing_values_under_both_names() {
        let input = json!({"minReplicas": 3, "min_replicas": 5});

        let err = entity(&REPLICAS, &input, Mode::Strict, &Validator::root()).unwrap_err();
        assert_eq!(err.path().to_string(), "minReplicas");
        assert_eq!(
            err.problem(),
            &ValidationProblem::ConflictingKeys {
                name: "min_replicas".to_owned(),
                wire_name: "minReplicas".to_owned(),
            }
        );

        let replicas = entity(&REPLICAS, &input, Mode::Lenient, &Validator::root()).unwrap();
        assert_eq!(
            replicas.get("min_replicas").and_then(FieldValue::as_i64),
            Some(3)
        );
    }

    #[test]
    fn any_is_kept_verbatim() {
        let input = json!({"nested": [1, {"a": null}]});
        let coerced = value(&ValueType::Any, &input, Mode::Strict, &Validator::root()).unwrap();
        assert_eq!(coerced.as_raw().map(RawDocument::value), Some(&input));
    }
}
