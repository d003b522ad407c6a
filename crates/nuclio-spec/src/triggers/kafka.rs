use serde_json::{Value, json};
use snafu::ensure;

use super::{ConstructionError, MissingFieldSnafu, TriggerBuilder, set};
use crate::{entity::RawDocument, model::trigger::TriggerSpec, path::KeyPath};

const SASL_PASSWORD: &[&str] = &["attributes", "sasl", "password"];

/// Builds a `kafka` trigger consuming one topic.
///
/// The SASL password is registered as secret and redacted unless secrets are
/// revealed explicitly.
#[derive(Clone, Debug)]
pub struct KafkaTriggerBuilder {
    document: RawDocument,
}

impl KafkaTriggerBuilder {
    /// Consumes `topic` from the brokers at `url`, optionally restricted to `partitions`.
    pub fn new(
        url: &str,
        topic: &str,
        partitions: impl IntoIterator<Item = i64>,
    ) -> Result<Self, ConstructionError> {
        ensure!(!url.is_empty(), MissingFieldSnafu { field: "url" });
        ensure!(!topic.is_empty(), MissingFieldSnafu { field: "topic" });

        let mut document = RawDocument::new(json!({
            "kind": "kafka",
            "url": url,
            "attributes": {"topic": topic},
        }));

        let partitions = partitions.into_iter().collect::<Vec<_>>();
        if !partitions.is_empty() {
            set(&mut document, &["attributes", "partitions"], Value::from(partitions));
        }

        Ok(Self { document })
    }

    pub fn sasl(mut self, user: &str, password: &str) -> Self {
        set(
            &mut self.document,
            &["attributes", "sasl"],
            json!({"enable": true, "user": user, "password": password}),
        );
        self.document.add_secret_path(KeyPath::literal(SASL_PASSWORD));
        self
    }
}

impl TriggerBuilder for KafkaTriggerBuilder {
    fn document_mut(&mut self) -> &mut RawDocument {
        &mut self.document
    }

    fn into_document(self) -> RawDocument {
        self.document
    }
}

impl From<KafkaTriggerBuilder> for TriggerSpec {
    fn from(builder: KafkaTriggerBuilder) -> Self {
        Self::Raw(builder.into_document())
    }
}
