use serde_json::{Map, Value};

use super::{ConfigEntity, coerce};
use crate::schema::{EntitySchema, Mode, PolymorphicSchema, ValidationError, Validator};

/// Picks the variant of `schema` that describes `input` and validates `input` against it.
///
/// A present discriminator selects the variant directly. Otherwise variants are
/// tried in declaration order and the first one whose required fields are all
/// supplied, and which knows every supplied field, is chosen. In strict mode a
/// second matching variant makes the input ambiguous.
pub(super) fn resolve(
    schema: &'static PolymorphicSchema,
    input: &Value,
    mode: Mode,
    validator: &Validator,
) -> Result<ConfigEntity, ValidationError> {
    let Value::Object(fields) = input else {
        return Err(
            validator.error_type_mismatch(format_args!("mapping ({})", schema.name()), input)
        );
    };

    if let Some(discriminator) = schema.discriminator() {
        if let Some(tag) = fields.get(discriminator).filter(|tag| !tag.is_null()) {
            let tag_validator = validator.field(&discriminator);
            let Some(tag) = tag.as_str() else {
                return Err(tag_validator.error_type_mismatch("string", tag));
            };
            let Some(variant) = schema.variant_for_tag(tag) else {
                return Err(tag_validator.error_unknown_discriminator(tag, schema.tags()));
            };
            return coerce::entity(variant.schema(), input, mode, validator);
        }
    }

    let mut candidates = schema
        .variants()
        .iter()
        .filter(|variant| accepts(variant.schema(), fields));

    let Some(chosen) = candidates.next() else {
        let attempted = schema
            .variants()
            .iter()
            .map(|variant| variant.schema().name().to_owned())
            .collect();
        return Err(validator.error_unresolvable_variant(attempted));
    };

    if mode == Mode::Strict {
        let others = candidates
            .map(|variant| variant.schema().name().to_owned())
            .collect::<Vec<_>>();
        if !others.is_empty() {
            let mut matched = vec![chosen.schema().name().to_owned()];
            matched.extend(others);
            return Err(validator.error_ambiguous_variant(matched));
        }
    }

    coerce::entity(chosen.schema(), input, mode, validator)
}

/// Whether the supplied (non-null) fields fit the shape of `schema`.
fn accepts(schema: &EntitySchema, fields: &Map<String, Value>) -> bool {
    let supplied = || {
        fields
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, _)| key.as_str())
    };

    schema
        .required_fields()
        .all(|node| supplied().any(|key| node.matches(key)))
        && supplied().all(|key| schema.lookup(key).is_some())
}
