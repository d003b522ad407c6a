use serde_json::{Value, json};
use snafu::{ResultExt, ensure};
use tracing::warn;

use super::{
    CanaryWeightOutOfRangeSnafu, ConstructionError, DEFAULT_WORKERS, InvalidIngressNameSnafu,
    InvalidPathsSnafu, TriggerBuilder, set,
};
use crate::{
    entity::RawDocument,
    environment::DomainName,
    model::trigger::TriggerSpec,
    path::{self, KeyPath},
};

pub const CANARY_ANNOTATION: &str = "nginx.ingress.kubernetes.io/canary";
pub const CANARY_WEIGHT_ANNOTATION: &str = "nginx.ingress.kubernetes.io/canary-weight";

pub const DEFAULT_INGRESS_NAME: &str = "0";
pub const DEFAULT_PATH: &str = "/";

/// What the canary weight annotation records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CanaryWeightSource {
    /// The canary weight itself
    #[default]
    Weight,

    /// The ingress host, which older tooling wrote into the weight annotation
    Host,
}

/// One ingress rule of an HTTP trigger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ingress {
    name: String,
    host: String,
    paths: Vec<String>,
    canary_weight: Option<i64>,
}

impl Ingress {
    /// An ingress for `host` serving `/`, stored under the name `0`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_INGRESS_NAME.to_owned(),
            host: host.into(),
            paths: vec![DEFAULT_PATH.to_owned()],
            canary_weight: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the served paths. No paths at all means `/`.
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        if self.paths.is_empty() {
            self.paths.push(DEFAULT_PATH.to_owned());
        }
        self
    }

    /// [`Ingress::with_paths`] for untyped input, which must be a sequence of strings or `null`.
    pub fn with_paths_value(self, paths: &Value) -> Result<Self, ConstructionError> {
        let invalid = || {
            InvalidPathsSnafu {
                found: paths.to_string(),
            }
            .build()
        };

        match paths {
            Value::Null => Ok(self.with_paths(Vec::<String>::new())),
            Value::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| item.as_str().map(ToOwned::to_owned).ok_or_else(invalid))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.with_paths(items))
            }
            _ => Err(invalid()),
        }
    }

    /// Marks the ingress as canary receiving `weight` percent of the traffic.
    pub fn with_canary_weight(mut self, weight: i64) -> Self {
        self.canary_weight = Some(weight);
        self
    }
}

/// Builds an `http` trigger.
///
/// ```
/// use nuclio_spec::triggers::{HttpTriggerBuilder, Ingress, TriggerBuilder};
/// use serde_json::json;
///
/// let document = HttpTriggerBuilder::new()
///     .port(8080)
///     .ingress(Ingress::new("svc").with_paths(["/a", "/b"]).with_canary_weight(25))
///     .unwrap()
///     .into_document();
///
/// assert_eq!(
///     document.value()["annotations"]["nginx.ingress.kubernetes.io/canary-weight"],
///     json!("25")
/// );
/// ```
#[derive(Clone, Debug)]
pub struct HttpTriggerBuilder {
    document: RawDocument,
    namespace_domain: Option<DomainName>,
    canary_weight_source: CanaryWeightSource,
}

impl HttpTriggerBuilder {
    pub fn new() -> Self {
        Self {
            document: RawDocument::new(json!({
                "kind": "http",
                "maxWorkers": DEFAULT_WORKERS,
                "attributes": {},
                "annotations": {},
            })),
            namespace_domain: None,
            canary_weight_source: CanaryWeightSource::default(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        set(&mut self.document, &["attributes", "port"], Value::from(port));
        self
    }

    /// Qualifies the hosts of subsequently added ingresses with `domain`.
    pub fn with_namespace_domain(mut self, domain: Option<DomainName>) -> Self {
        self.namespace_domain = domain;
        self
    }

    pub fn with_canary_weight_source(mut self, source: CanaryWeightSource) -> Self {
        self.canary_weight_source = source;
        self
    }

    /// Adds or replaces the ingress named like `ingress`.
    ///
    /// # Errors
    ///
    /// Fails if the canary weight is not within `0..=100` or the ingress name is
    /// empty. The builder is consumed, so nothing of it survives a failure.
    pub fn ingress(mut self, ingress: Ingress) -> Result<Self, ConstructionError> {
        let Ingress {
            name,
            host,
            paths,
            canary_weight,
        } = ingress;

        if let Some(weight) = canary_weight {
            ensure!(
                (0..=100).contains(&weight),
                CanaryWeightOutOfRangeSnafu { weight }
            );
        }
        let key = KeyPath::new(["attributes", "ingresses", name.as_str()])
            .context(InvalidIngressNameSnafu { name: name.as_str() })?;

        let host = match &self.namespace_domain {
            Some(domain) => format!("{host}.{domain}"),
            None => host,
        };

        if let Some(weight) = canary_weight {
            let recorded = match self.canary_weight_source {
                CanaryWeightSource::Weight => weight.to_string(),
                CanaryWeightSource::Host => {
                    warn!(%host, weight, "recording ingress host as canary weight");
                    host.clone()
                }
            };
            set(
                &mut self.document,
                &["annotations", CANARY_ANNOTATION],
                Value::from("true"),
            );
            set(
                &mut self.document,
                &["annotations", CANARY_WEIGHT_ANNOTATION],
                Value::from(recorded),
            );
        }

        path::set_path(
            self.document.value_mut(),
            &key,
            json!({"host": host, "paths": paths}),
        );
        Ok(self)
    }
}

impl Default for HttpTriggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerBuilder for HttpTriggerBuilder {
    fn document_mut(&mut self) -> &mut RawDocument {
        &mut self.document
    }

    fn into_document(self) -> RawDocument {
        self.document
    }
}

impl From<HttpTriggerBuilder> for TriggerSpec {
    fn from(builder: HttpTriggerBuilder) -> Self {
        Self::Raw(builder.into_document())
    }
}
