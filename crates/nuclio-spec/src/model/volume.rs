//! Volumes: where they are mounted and what backs them.
//!
//! A volume pairs a mount descriptor with one of several backing stores. Both
//! carry the volume name and the two names always agree: a name given on one
//! side only is copied to the other, conflicting names are rejected and both
//! name fields are read-only afterwards.
use std::sync::LazyLock;

use serde_json::{Value, json};

use crate::{
    entity::{ConfigEntity, FieldValue},
    schema::{
        EntitySchema, PolymorphicSchema, Rule, SchemaNode, ValidationError, Validator, ValueType,
        Variant,
    },
    validation,
};

pub const DEFAULT_V3IO_DRIVER: &str = "v3io/fuse";

const MOUNT: &str = "volume_mount";
const SOURCE: &str = "volume";
const NAME: &str = "name";

fn name_node() -> SchemaNode {
    SchemaNode::new(NAME, ValueType::String)
        .read_only()
        .with_rule(Rule::Rfc1123Label)
}

static VOLUME_MOUNT: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("VolumeMount")
        .field(name_node())
        .field(SchemaNode::new("read_only", ValueType::Boolean))
        .field(SchemaNode::new("mount_path", ValueType::String))
        .field(SchemaNode::new("sub_path", ValueType::String))
});

static CLAIM: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("PersistentVolumeClaimSource")
        .field(SchemaNode::new("claim_name", ValueType::String).required())
        .field(SchemaNode::new("read_only", ValueType::Boolean))
});

static PERSISTENT_VOLUME: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("PersistentVolume")
        .field(name_node())
        .field(SchemaNode::new("persistent_volume_claim", ValueType::Entity(|| &CLAIM)).required())
});

static HOST_PATH: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("HostPathSource")
        .field(SchemaNode::new("path", ValueType::String).required())
        .field(SchemaNode::new("type", ValueType::String))
});

static HOST_VOLUME: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("HostVolume")
        .field(name_node())
        .field(SchemaNode::new("host_path", ValueType::Entity(|| &HOST_PATH)).required())
});

static SECRET: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("SecretSource")
        .field(SchemaNode::new("secret_name", ValueType::String).required())
        .field(SchemaNode::new("optional", ValueType::Boolean))
});

static SECRET_VOLUME: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("SecretVolume")
        .field(name_node())
        .field(SchemaNode::new("secret", ValueType::Entity(|| &SECRET)).required())
});

static V3IO_OPTIONS: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("V3ioOptions")
        .field(SchemaNode::new("container", ValueType::String))
        .field(SchemaNode::new("sub_path", ValueType::String))
        .field(SchemaNode::new("access_key", ValueType::Secret))
});

static FLEX_VOLUME: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("FlexVolumeSource")
        .field(SchemaNode::new("driver", ValueType::String).with_default(DEFAULT_V3IO_DRIVER))
        .field(SchemaNode::new("options", ValueType::Entity(|| &V3IO_OPTIONS)))
});

static V3IO_VOLUME: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("V3ioVolume")
        .field(name_node())
        .field(SchemaNode::new("flex_volume", ValueType::Entity(|| &FLEX_VOLUME)).required())
});

static BACKING_STORE: LazyLock<PolymorphicSchema> = LazyLock::new(|| {
    PolymorphicSchema::new("VolumeSource")
        .variant(Variant::structural(|| &PERSISTENT_VOLUME))
        .variant(Variant::structural(|| &HOST_VOLUME))
        .variant(Variant::structural(|| &SECRET_VOLUME))
        .variant(Variant::structural(|| &V3IO_VOLUME))
});

static VOLUME: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("Volume")
        .field(SchemaNode::new(MOUNT, ValueType::Entity(|| &VOLUME_MOUNT)))
        .field(SchemaNode::new(SOURCE, ValueType::Polymorphic(|| &BACKING_STORE)).required())
        .with_finalizer(reconcile_names)
});

pub fn volume() -> &'static EntitySchema {
    &VOLUME
}

pub fn backing_store() -> &'static PolymorphicSchema {
    &BACKING_STORE
}

fn descriptor_name(volume: &ConfigEntity, descriptor: &str) -> Option<String> {
    volume
        .get(descriptor)?
        .as_entity()?
        .get(NAME)?
        .as_str()
        .map(ToOwned::to_owned)
}

/// Makes sure both descriptors carry the same name, copying it over if only one side has it.
fn reconcile_names(volume: &mut ConfigEntity, validator: &Validator) -> Result<(), ValidationError> {
    match (
        descriptor_name(volume, MOUNT),
        descriptor_name(volume, SOURCE),
    ) {
        (Some(mount_name), Some(source_name)) if mount_name != source_name => {
            Err(validator.error_volume_name_mismatch(mount_name, source_name))
        }
        (Some(name), None) | (None, Some(name)) => {
            write_name(volume, &name);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Writes `name` into both descriptors, bypassing the read-only protection.
pub(crate) fn write_name(volume: &mut ConfigEntity, name: &str) {
    for descriptor in [MOUNT, SOURCE] {
        if let Some(descriptor) = volume.entity_mut(descriptor) {
            descriptor.force_set(NAME, name);
        }
    }
}

/// The name shared by both descriptors of a volume entity.
pub(crate) fn name_of(volume: &ConfigEntity) -> Option<&str> {
    volume.get_in("volume_mount.name").and_then(FieldValue::as_str)
}

/// A validated volume, ready to be added to a function.
///
/// ```
/// use nuclio_spec::model::volume::Volume;
///
/// let volume = Volume::host_path("/data", "/mnt/data")
///     .unwrap()
///     .with_name("data")
///     .unwrap();
/// assert_eq!(volume.name(), Some("data"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Volume(ConfigEntity);

impl Volume {
    /// Validates a volume document such as `{"volumeMount": {...}, "volume": {...}}`.
    pub fn from_value(input: &Value) -> Result<Self, ValidationError> {
        ConfigEntity::from_value(volume(), input).map(Self)
    }

    pub fn persistent_volume_claim(
        claim_name: &str,
        mount_path: &str,
    ) -> Result<Self, ValidationError> {
        Self::from_value(&json!({
            "volumeMount": {"mountPath": mount_path},
            "volume": {"persistentVolumeClaim": {"claimName": claim_name}},
        }))
    }

    pub fn host_path(path: &str, mount_path: &str) -> Result<Self, ValidationError> {
        Self::from_value(&json!({
            "volumeMount": {"mountPath": mount_path},
            "volume": {"hostPath": {"path": path}},
        }))
    }

    pub fn secret(secret_name: &str, mount_path: &str) -> Result<Self, ValidationError> {
        Self::from_value(&json!({
            "volumeMount": {"mountPath": mount_path},
            "volume": {"secret": {"secretName": secret_name}},
        }))
    }

    /// A v3io fuse mount of `container`, optionally restricted to `sub_path`.
    pub fn v3io(
        container: &str,
        sub_path: Option<&str>,
        access_key: &str,
        mount_path: &str,
    ) -> Result<Self, ValidationError> {
        Self::from_value(&json!({
            "volumeMount": {"mountPath": mount_path},
            "volume": {"flexVolume": {"options": {
                "container": container,
                "subPath": sub_path,
                "accessKey": access_key,
            }}},
        }))
    }

    /// Names the volume. The name ends up on both the mount and the backing store.
    pub fn with_name(mut self, name: &str) -> Result<Self, ValidationError> {
        validation::is_rfc_1123_label(name).map_err(|err| {
            Validator::root()
                .field(&"volumeMount")
                .field(&NAME)
                .error_rule(err.to_string())
        })?;
        write_name(&mut self.0, name);
        Ok(self)
    }

    pub fn read_only(mut self, read_only: bool) -> Result<Self, ValidationError> {
        self.0.set_in("volume_mount.read_only", read_only)?;
        Ok(self)
    }

    pub fn name(&self) -> Option<&str> {
        name_of(&self.0)
    }

    pub fn entity(&self) -> &ConfigEntity {
        &self.0
    }

    pub(crate) fn into_entity(self) -> ConfigEntity {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{
        document::{SerializeOptions, to_document},
        schema::ValidationProblem,
    };

    fn source_name(volume: &Volume) -> Option<&str> {
        volume
            .entity()
            .get_in("volume.name")
            .and_then(FieldValue::as_str)
    }

    #[rstest]
    #[case(json!({"volume": {"persistentVolumeClaim": {"claimName": "c"}}}), "PersistentVolume")]
    #[case(json!({"volume": {"hostPath": {"path": "/p"}}}), "HostVolume")]
    #[case(json!({"volume": {"secret": {"secretName": "s"}}}), "SecretVolume")]
    #[case(json!({"volume": {"flexVolume": {}}}), "V3ioVolume")]
    fn resolves_backing_store(#[case] input: Value, #[case] expected: &str) {
        let volume = Volume::from_value(&input).unwrap();
        let source = volume.entity().get("volume").and_then(FieldValue::as_entity).unwrap();
        assert_eq!(source.schema().name(), expected);
    }

    #[test]
    fn backing_store_without_attributes_is_unresolvable() {
        let err = Volume::from_value(&json!({"volume": {"name": "x"}})).unwrap_err();
        assert_eq!(err.path().to_string(), "volume");
        assert!(matches!(
            err.problem(),
            ValidationProblem::UnresolvableVariant { .. }
        ));
    }

    #[rstest]
    #[case(json!({"volumeMount": {"name": "a"}, "volume": {"hostPath": {"path": "/p"}}}))]
    #[case(json!({"volume": {"name": "a", "hostPath": {"path": "/p"}}}))]
    #[case(json!({"volumeMount": {"name": "a"}, "volume": {"name": "a", "hostPath": {"path": "/p"}}}))]
    fn propagates_one_sided_names(#[case] input: Value) {
        let volume = Volume::from_value(&input).unwrap();
        assert_eq!(volume.name(), Some("a"));
        assert_eq!(source_name(&volume), Some("a"));
    }

    #[test]
    fn rejects_conflicting_names() {
        let err = Volume::from_value(&json!({
            "volumeMount": {"name": "a"},
            "volume": {"name": "b", "hostPath": {"path": "/p"}},
        }))
        .unwrap_err();
        assert_eq!(
            err.problem(),
            &ValidationProblem::VolumeNameMismatch {
                mount_name: "a".to_owned(),
                source_name: "b".to_owned(),
            }
        );
    }

    #[test]
    fn replacing_the_backing_store_keeps_names_in_sync() {
        let mut volume = Volume::host_path("/p", "/mnt").unwrap().with_name("data").unwrap();

        volume
            .0
            .set("volume", json!({"secret": {"secretName": "s"}}))
            .unwrap();
        assert_eq!(source_name(&volume), Some("data"));

        let before = volume.clone();
        let err = volume
            .0
            .set("volume", json!({"name": "other", "secret": {"secretName": "s"}}))
            .unwrap_err();
        assert!(matches!(
            err.problem(),
            ValidationProblem::VolumeNameMismatch { .. }
        ));
        assert_eq!(volume, before);
    }

    #[test]
    fn names_are_read_only() {
        let mut volume = Volume::host_path("/p", "/mnt").unwrap().with_name("data").unwrap();
        let err = volume.0.set_in("volume_mount.name", "other").unwrap_err();
        assert_eq!(err.path().to_string(), "volumeMount.name");
        assert_eq!(err.problem(), &ValidationProblem::ReadOnly);
        assert!(volume.clone().with_name("Not A Label").is_err());
    }

    #[test]
    fn v3io_defaults_and_redaction() {
        let volume = Volume::v3io("users", Some("/admin"), "secret-key", "/v3io")
            .unwrap()
            .with_name("fs")
            .unwrap();
        assert_eq!(
            to_document(volume.entity(), &SerializeOptions::default()),
            json!({
                "volumeMount": {"name": "fs", "mountPath": "/v3io"},
                "volume": {
                    "name": "fs",
                    "flexVolume": {
                        "driver": "v3io/fuse",
                        "options": {"container": "users", "subPath": "/admin", "accessKey": "**********"},
                    },
                },
            })
        );
    }
}
