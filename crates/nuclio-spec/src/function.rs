//! The root `NuclioFunction` document and its typed mutators.
//!
//! ```
//! use nuclio_spec::{
//!     document::{OutputFormat, SerializeOptions},
//!     function::FunctionConfig,
//!     model::volume::Volume,
//!     triggers::{HttpTriggerBuilder, Ingress},
//! };
//!
//! let mut function = FunctionConfig::new();
//! function.set("metadata.name", "echo").unwrap();
//! function.add_environment_variable("GREETING", "hello").unwrap();
//!
//! let name = function
//!     .add_volume(Volume::host_path("/data", "/mnt/data").unwrap())
//!     .unwrap();
//! assert_eq!(name, "volume-0");
//!
//! let http = HttpTriggerBuilder::new()
//!     .ingress(Ingress::new("echo"))
//!     .unwrap();
//! function.add_trigger("default-http", http);
//!
//! let yaml = function
//!     .serialize(OutputFormat::Yaml, &SerializeOptions::default())
//!     .unwrap();
//! assert!(yaml.starts_with("---\napiVersion: nuclio.io/v1\n"));
//! ```
use std::collections::HashSet;

use serde_json::{Value, json};
use snafu::{ResultExt, Snafu, ensure};
use tracing::debug;

use crate::{
    document::{self, OutputFormat, SerializeOptions},
    entity::{ConfigEntity, FieldValue, coerce},
    model::{
        self,
        trigger::TriggerSpec,
        volume::{self, Volume},
    },
    schema::{Mode, ValidationError, Validator},
    validation,
};

const SPEC: &str = "spec";
const ENV: &str = "env";
const VOLUMES: &str = "volumes";
const TRIGGERS: &str = "triggers";

const GENERATED_VOLUME_PREFIX: &str = "volume-";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid function configuration"))]
    Validate { source: ValidationError },

    #[snafu(display("a volume named {name:?} already exists"))]
    DuplicateVolumeName { name: String },

    #[snafu(display("no volume named {name:?}"))]
    VolumeNotFound { name: String },

    #[snafu(display("invalid volume name {name:?}"))]
    InvalidVolumeName {
        source: validation::Errors,
        name: String,
    },

    #[snafu(display("failed to parse function document"))]
    Parse { source: document::Error },

    #[snafu(display("failed to render function document"))]
    Render { source: document::Error },
}

/// A complete function configuration.
///
/// Every volume of a function has a name, shared by its mount and its backing
/// store and unique within the function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionConfig {
    root: ConfigEntity,
}

impl FunctionConfig {
    /// A function holding only defaults.
    pub fn new() -> Self {
        Self {
            root: coerce::defaults(model::function()),
        }
    }

    /// Validates an existing function document, rejecting unknown fields.
    ///
    /// Unnamed volumes are given generated names.
    pub fn from_value(input: &Value) -> Result<Self> {
        let mut root =
            ConfigEntity::from_value(model::function(), input).context(ValidateSnafu)?;
        normalize_volumes(&mut root)?;
        Ok(Self { root })
    }

    pub fn from_yaml(input: &str) -> Result<Self> {
        Self::from_value(&document::parse(input, OutputFormat::Yaml).context(ParseSnafu)?)
    }

    pub fn from_json(input: &str) -> Result<Self> {
        Self::from_value(&document::parse(input, OutputFormat::Json).context(ParseSnafu)?)
    }

    pub fn entity(&self) -> &ConfigEntity {
        &self.root
    }

    /// Returns the value at a dotted path such as `spec.min_replicas` or `spec.env.0.name`.
    pub fn get(&self, path: &str) -> Option<&FieldValue> {
        self.root.get_in(path)
    }

    /// Assigns the value at a dotted path, validating only the assigned field.
    ///
    /// # Errors
    ///
    /// Fails if the path does not exist, the field is read-only, the value does
    /// not validate or the volumes end up with duplicate names. The function is
    /// left unchanged on failure.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let mut root = self.root.clone();
        root.set_in(path, value).context(ValidateSnafu)?;
        normalize_volumes(&mut root)?;
        self.root = root;
        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        self.get("metadata.name").and_then(FieldValue::as_str)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.get("metadata.namespace").and_then(FieldValue::as_str)
    }

    /// Appends an environment variable. Variables are never deduplicated.
    pub fn add_environment_variable(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.add_environment_variables([(name, value)])
    }

    /// Appends several environment variables, either all of them or none.
    pub fn add_environment_variables<I, K, V>(&mut self, variables: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let offset = self.environment_variables().len();
        let root = Validator::root();
        let spec = root.field(&SPEC);
        let env = spec.field(&ENV);

        let variables = variables
            .into_iter()
            .enumerate()
            .map(|(index, (name, value))| {
                let index = offset + index;
                let value: Value = value.into();
                let input = json!({"name": name.as_ref(), "value": value});
                coerce::entity(model::env_variable(), &input, Mode::Strict, &env.field(&index))
                    .map(FieldValue::Entity)
            })
            .collect::<Result<Vec<_>, _>>()
            .context(ValidateSnafu)?;

        if let Some(FieldValue::List(env)) = self.spec_field_mut(ENV) {
            env.extend(variables);
        }
        Ok(())
    }

    pub fn environment_variables(&self) -> &[FieldValue] {
        self.get("spec.env")
            .and_then(FieldValue::as_list)
            .unwrap_or_default()
    }

    /// Appends a volume and returns its name.
    ///
    /// An unnamed volume is named `volume-<n>`, `n` counting up from the number
    /// of existing volumes until the name is free.
    ///
    /// # Errors
    ///
    /// Fails if another volume already carries the name of `volume`.
    pub fn add_volume(&mut self, volume: Volume) -> Result<String> {
        let taken = self
            .volume_names()
            .map(ToOwned::to_owned)
            .collect::<HashSet<_>>();

        let mut entity = volume.into_entity();
        let name = match volume::name_of(&entity) {
            Some(name) => {
                ensure!(!taken.contains(name), DuplicateVolumeNameSnafu { name });
                name.to_owned()
            }
            None => {
                let name = free_volume_name(&taken, taken.len());
                debug!(volume = %name, "generated volume name");
                volume::write_name(&mut entity, &name);
                name
            }
        };

        if let Some(FieldValue::List(volumes)) = self.spec_field_mut(VOLUMES) {
            volumes.push(FieldValue::Entity(entity));
        }
        Ok(name)
    }

    /// Renames a volume, updating its mount and its backing store together.
    pub fn rename_volume(&mut self, old: &str, new: &str) -> Result<()> {
        validation::is_rfc_1123_label(new).context(InvalidVolumeNameSnafu { name: new })?;
        ensure!(self.volume(old).is_some(), VolumeNotFoundSnafu { name: old });
        if old == new {
            return Ok(());
        }
        ensure!(self.volume(new).is_none(), DuplicateVolumeNameSnafu { name: new });

        if let Some(FieldValue::List(volumes)) = self.spec_field_mut(VOLUMES) {
            for entry in volumes {
                if let FieldValue::Entity(entity) = entry {
                    if volume::name_of(entity) == Some(old) {
                        volume::write_name(entity, new);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn volumes(&self) -> impl Iterator<Item = &ConfigEntity> {
        self.get("spec.volumes")
            .and_then(FieldValue::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(FieldValue::as_entity)
    }

    pub fn volume(&self, name: &str) -> Option<&ConfigEntity> {
        self.volumes()
            .find(|volume| volume::name_of(volume) == Some(name))
    }

    fn volume_names(&self) -> impl Iterator<Item = &str> {
        self.volumes().filter_map(volume::name_of)
    }

    /// Adds a trigger, replacing any trigger of the same name as a whole.
    pub fn add_trigger(
        &mut self,
        name: impl Into<String>,
        trigger: impl Into<TriggerSpec>,
    ) -> &mut Self {
        let name = name.into();
        let trigger = FieldValue::from(trigger.into());
        if let Some(FieldValue::Map(triggers)) = self.spec_field_mut(TRIGGERS) {
            if triggers.insert(name.clone(), trigger).is_some() {
                debug!(trigger = %name, "replaced existing trigger");
            }
        }
        self
    }

    pub fn trigger(&self, name: &str) -> Option<&FieldValue> {
        self.get("spec.triggers")
            .and_then(FieldValue::as_map)
            .and_then(|triggers| triggers.get(name))
    }

    /// Builds the document tree of the function.
    pub fn to_document(&self, options: &SerializeOptions) -> Value {
        document::to_document(&self.root, options)
    }

    pub fn serialize(&self, format: OutputFormat, options: &SerializeOptions) -> Result<String> {
        document::render(&self.to_document(options), format).context(RenderSnafu)
    }

    fn spec_field_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.root.entity_mut(SPEC)?.field_mut(name)
    }
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Rejects duplicate volume names and names the unnamed volumes.
fn normalize_volumes(root: &mut ConfigEntity) -> Result<()> {
    let Some(FieldValue::List(volumes)) = root
        .entity_mut(SPEC)
        .and_then(|spec| spec.field_mut(VOLUMES))
    else {
        return Ok(());
    };

    let mut taken = HashSet::new();
    for name in volumes
        .iter()
        .filter_map(FieldValue::as_entity)
        .filter_map(volume::name_of)
    {
        ensure!(taken.insert(name.to_owned()), DuplicateVolumeNameSnafu { name });
    }

    for (index, entry) in volumes.iter_mut().enumerate() {
        if let FieldValue::Entity(entity) = entry {
            if volume::name_of(entity).is_none() {
                let name = free_volume_name(&taken, index);
                debug!(volume = %name, "generated volume name");
                volume::write_name(entity, &name);
                taken.insert(name);
            }
        }
    }
    Ok(())
}

fn free_volume_name(taken: &HashSet<String>, start: usize) -> String {
    let mut n = start;
    loop {
        let name = format!("{GENERATED_VOLUME_PREFIX}{n}");
        if !taken.contains(&name) {
            return name;
        }
        n += 1;
    }
}
