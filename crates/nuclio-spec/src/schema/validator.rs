use std::fmt::{Display, Write};

use snafu::Snafu;

/// Contains context used for generating validation errors
///
/// Constructed internally by the entity constructors, see [`Validator::root`].
pub struct Validator<'a> {
    ident: Option<&'a dyn Display>,
    parent: Option<&'a Validator<'a>>,
}

impl<'a> Validator<'a> {
    /// A `Validator` for the root of a document
    pub(crate) fn root() -> Self {
        Self {
            ident: None,
            parent: None,
        }
    }

    /// Creates a `Validator` for a subfield of the current object
    pub fn field<'b>(&'b self, ident: &'b dyn Display) -> Validator<'b> {
        Validator {
            ident: Some(ident),
            parent: Some(self),
        }
    }

    fn error_problem(&self, problem: ValidationProblem) -> ValidationError {
        let mut idents = Vec::new();
        let mut curr = Some(self);
        while let Some(curr_some) = curr {
            if let Some(ident) = curr_some.ident {
                idents.push(ident.to_string());
            }
            curr = curr_some.parent;
        }
        idents.reverse();
        ValidationError {
            path: FieldPath { idents },
            problem,
        }
    }

    /// Returns an error indicating that the `Validator` refers to a required field that is currently not provided
    pub fn error_required(&self) -> ValidationError {
        self.error_problem(ValidationProblem::FieldRequired)
    }

    pub fn error_type_mismatch(
        &self,
        expected: impl Display,
        found: &serde_json::Value,
    ) -> ValidationError {
        self.error_problem(ValidationProblem::TypeMismatch {
            expected: expected.to_string(),
            found: json_type_name(found),
        })
    }

    pub fn error_unknown_field(&self) -> ValidationError {
        self.error_problem(ValidationProblem::UnknownField)
    }

    pub fn error_conflicting_keys(
        &self,
        name: impl Into<String>,
        wire_name: impl Into<String>,
    ) -> ValidationError {
        self.error_problem(ValidationProblem::ConflictingKeys {
            name: name.into(),
            wire_name: wire_name.into(),
        })
    }

    pub fn error_read_only(&self) -> ValidationError {
        self.error_problem(ValidationProblem::ReadOnly)
    }

    pub fn error_unresolvable_variant(&self, attempted: Vec<String>) -> ValidationError {
        self.error_problem(ValidationProblem::UnresolvableVariant { attempted })
    }

    pub fn error_ambiguous_variant(&self, matched: Vec<String>) -> ValidationError {
        self.error_problem(ValidationProblem::AmbiguousVariant { matched })
    }

    pub fn error_unknown_discriminator(
        &self,
        value: impl Into<String>,
        allowed: Vec<String>,
    ) -> ValidationError {
        self.error_problem(ValidationProblem::UnknownDiscriminator {
            value: value.into(),
            allowed,
        })
    }

    pub fn error_rule(&self, message: impl Into<String>) -> ValidationError {
        self.error_problem(ValidationProblem::RuleViolation {
            message: message.into(),
        })
    }

    pub fn error_volume_name_mismatch(
        &self,
        mount_name: impl Into<String>,
        source_name: impl Into<String>,
    ) -> ValidationError {
        self.error_problem(ValidationProblem::VolumeNameMismatch {
            mount_name: mount_name.into(),
            source_name: source_name.into(),
        })
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "sequence",
        serde_json::Value::Object(_) => "mapping",
    }
}

/// The path from the document root to the field that failed to validate,
/// rendered with wire names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldPath {
    idents: Vec<String>,
}

impl FieldPath {
    pub fn idents(&self) -> &[String] {
        &self.idents
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.idents.is_empty() {
            return f.write_str("<root>");
        }
        for (i, ident) in self.idents.iter().enumerate() {
            if i > 0 {
                f.write_char('.')?;
            }
            f.write_str(ident)?;
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq, Snafu)]
#[snafu(display("failed to validate {path}"))]
/// An error that occurred when validating an entity.
///
/// It is constructed by calling one of the `error_*` methods on [`Validator`], such as [`Validator::error_required`].
pub struct ValidationError {
    path: FieldPath,
    #[snafu(source)]
    problem: ValidationProblem,
}

impl ValidationError {
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn problem(&self) -> &ValidationProblem {
        &self.problem
    }
}

/// A problem that was discovered during validation, with no additional context.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ValidationProblem {
    #[snafu(display("field is required"))]
    FieldRequired,

    #[snafu(display("expected {expected}, found {found}"))]
    TypeMismatch {
        expected: String,
        found: &'static str,
    },

    #[snafu(display("field is not part of the schema"))]
    UnknownField,

    #[snafu(display("field is given as both {wire_name:?} and {name:?} with different values"))]
    ConflictingKeys { name: String, wire_name: String },

    #[snafu(display("field is read-only once the entity is constructed"))]
    ReadOnly,

    #[snafu(display("input matches none of the variants {attempted:?}"))]
    UnresolvableVariant { attempted: Vec<String> },

    #[snafu(display("input matches more than one of the variants {matched:?}"))]
    AmbiguousVariant { matched: Vec<String> },

    #[snafu(display("unknown kind {value:?}, expected one of {allowed:?}"))]
    UnknownDiscriminator { value: String, allowed: Vec<String> },

    #[snafu(display("{message}"))]
    RuleViolation { message: String },

    #[snafu(display(
        "volume mount is named {mount_name:?} but its volume is named {source_name:?}"
    ))]
    VolumeNameMismatch {
        mount_name: String,
        source_name: String,
    },
}
