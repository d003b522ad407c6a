use serde_json::{Map, Value, json};

use super::{ConflictingScheduleSnafu, ConstructionError, MissingScheduleSnafu, TriggerBuilder, set};
use crate::{entity::RawDocument, model::trigger::TriggerSpec};

/// Builds a `cron` trigger firing on either a fixed interval or a cron schedule.
#[derive(Clone, Debug)]
pub struct CronTriggerBuilder {
    document: RawDocument,
}

impl CronTriggerBuilder {
    /// Exactly one of `interval` (such as `10s`) and `schedule` (such as
    /// `0 * * * *`) must be given. Empty strings count as not given.
    pub fn new(interval: Option<&str>, schedule: Option<&str>) -> Result<Self, ConstructionError> {
        let interval = interval.filter(|interval| !interval.is_empty());
        let schedule = schedule.filter(|schedule| !schedule.is_empty());

        let attributes = match (interval, schedule) {
            (Some(interval), None) => json!({"interval": interval}),
            (None, Some(schedule)) => json!({"schedule": schedule}),
            (None, None) => return MissingScheduleSnafu.fail(),
            (Some(interval), Some(schedule)) => {
                return ConflictingScheduleSnafu { interval, schedule }.fail();
            }
        };

        Ok(Self {
            document: RawDocument::new(json!({"kind": "cron", "attributes": attributes})),
        })
    }

    /// Attaches the event sent on every invocation. Nothing is attached if both
    /// `body` and `headers` are empty.
    pub fn with_event<I, K, V>(mut self, body: &str, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let headers = headers
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect::<Map<_, _>>();

        if !body.is_empty() || !headers.is_empty() {
            set(
                &mut self.document,
                &["attributes", "event"],
                json!({"body": body, "headers": headers}),
            );
        }
        self
    }
}

impl TriggerBuilder for CronTriggerBuilder {
    fn document_mut(&mut self) -> &mut RawDocument {
        &mut self.document
    }

    fn into_document(self) -> RawDocument {
        self.document
    }
}

impl From<CronTriggerBuilder> for TriggerSpec {
    fn from(builder: CronTriggerBuilder) -> Self {
        Self::Raw(builder.into_document())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn schedule() {
        let document = CronTriggerBuilder::new(None, Some("0 * * * *"))
            .unwrap()
            .into_document();
        assert_eq!(document.value()["attributes"]["schedule"], json!("0 * * * *"));
        assert_eq!(document.value()["attributes"].get("interval"), None);
    }

    #[test]
    fn interval() {
        let document = CronTriggerBuilder::new(Some("10s"), None)
            .unwrap()
            .into_document();
        assert_eq!(
            document.value(),
            &json!({"kind": "cron", "attributes": {"interval": "10s"}})
        );
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some(""), None)]
    #[case(None, Some(""))]
    #[case(Some(""), Some(""))]
    fn requires_interval_or_schedule(#[case] interval: Option<&str>, #[case] schedule: Option<&str>) {
        assert_eq!(
            CronTriggerBuilder::new(interval, schedule).unwrap_err(),
            ConstructionError::MissingSchedule
        );
    }

    #[test]
    fn rejects_interval_and_schedule() {
        assert_eq!(
            CronTriggerBuilder::new(Some("10s"), Some("0 * * * *")).unwrap_err(),
            ConstructionError::ConflictingSchedule {
                interval: "10s".to_owned(),
                schedule: "0 * * * *".to_owned(),
            }
        );
    }

    #[test]
    fn event() {
        let document = CronTriggerBuilder::new(Some("1m"), None)
            .unwrap()
            .with_event("{\"ping\": true}", [("Content-Type", "application/json")])
            .into_document();
        assert_eq!(
            document.value()["attributes"]["event"],
            json!({"body": "{\"ping\": true}", "headers": {"Content-Type": "application/json"}})
        );

        let document = CronTriggerBuilder::new(Some("1m"), None)
            .unwrap()
            .with_event("", Vec::<(String, Value)>::new())
            .into_document();
        assert_eq!(document.value()["attributes"].get("event"), None);
    }
}
