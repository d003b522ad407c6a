//! Builders assembling raw trigger documents.
//!
//! The builders write straight into a [`RawDocument`] through
//! [`crate::path::set_path`] instead of going through schema validation. They
//! check their own arguments when called and hand the finished document to
//! [`FunctionConfig::add_trigger`](crate::function::FunctionConfig::add_trigger).
//!
//! ```
//! use nuclio_spec::{
//!     function::FunctionConfig,
//!     triggers::{CronTriggerBuilder, TriggerBuilder},
//! };
//!
//! let cron = CronTriggerBuilder::new(None, Some("0 * * * *")).unwrap().workers(1);
//!
//! let mut function = FunctionConfig::new();
//! function.add_trigger("hourly", cron);
//! ```
use serde_json::Value;
use snafu::Snafu;

use crate::{
    entity::RawDocument,
    path::{self, KeyPath, KeyPathError},
};

mod cron;
mod http;
mod kafka;

pub use cron::CronTriggerBuilder;
pub use http::{CanaryWeightSource, HttpTriggerBuilder, Ingress};
pub use kafka::KafkaTriggerBuilder;

pub const DEFAULT_WORKERS: i64 = 4;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ConstructionError {
    #[snafu(display("either an interval or a schedule must be specified"))]
    MissingSchedule,

    #[snafu(display(
        "only one of interval {interval:?} and schedule {schedule:?} may be specified"
    ))]
    ConflictingSchedule { interval: String, schedule: String },

    #[snafu(display("canary weight {weight} is not within 0..=100"))]
    CanaryWeightOutOfRange { weight: i64 },

    #[snafu(display("paths must be a sequence of strings such as [\"/x\"], found {found}"))]
    InvalidPaths { found: String },

    #[snafu(display("invalid ingress name {name:?}"))]
    InvalidIngressName { source: KeyPathError, name: String },

    #[snafu(display("{field} must not be empty"))]
    MissingField { field: &'static str },
}

/// Behaviour shared by all trigger builders.
pub trait TriggerBuilder: Sized {
    fn document_mut(&mut self) -> &mut RawDocument;

    fn into_document(self) -> RawDocument;

    fn disable(mut self, disabled: bool) -> Self {
        set(self.document_mut(), &["disabled"], Value::Bool(disabled));
        self
    }

    fn workers(mut self, workers: i64) -> Self {
        set(self.document_mut(), &["maxWorkers"], Value::from(workers));
        self
    }
}

fn set(document: &mut RawDocument, keys: &[&'static str], value: Value) {
    path::set_path(document.value_mut(), &KeyPath::literal(keys), value);
}
