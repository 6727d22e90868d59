// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{
    components, labels, DEFAULT_IMAGE_REPOSITORY, DEFAULT_INSTALL_NAMESPACE, DEFAULT_SENSOR_VERSION,
    OPERATOR_NAME,
};
use crate::status::Condition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{CustomResource, Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Desired installation of the sidecar injection sensor
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(group = "sensor.dev", version = "v1alpha1", kind = "SidecarSensor")]
#[kube(status = "SidecarSensorStatus")]
#[kube(shortname = "sidecar")]
#[serde(rename_all = "camelCase")]
pub struct SidecarSensorSpec {
    /// Namespace the injector and its supporting objects are installed into
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_namespace: Option<String>,
    /// Explicit sensor image; overrides every registry-based setting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Sensor version used as image tag when the image is registry-derived
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Credentials for the sensor vendor API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiCredentials>,
    #[serde(default)]
    pub registry: RegistrySpec,
    #[serde(default)]
    pub injector: InjectorSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiCredentials {
    pub client_id: String,
    pub client_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_region: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RegistryType {
    Ecr,
    Openshift,
    #[default]
    Generic,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySpec {
    #[serde(default, rename = "type")]
    pub registry_type: RegistryType,
    /// Repository the sensor image is pulled from (without tag)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_repository: Option<String>,
    /// Push a copy of the sensor image into the cluster registry
    #[serde(default)]
    pub mirror_image: bool,
    /// Secret holding the `.dockerconfigjson` used to pull the sensor image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_credentials: Option<SecretReference>,
    #[serde(default)]
    pub tls: RegistryTls,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistryTls {
    #[serde(default)]
    pub insecure_skip_verify: bool,
    /// PEM (raw or base64 encoded) CA certificate for the registry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_certificate: Option<String>,
    /// Existing ConfigMap with the registry CA; takes precedence over `caCertificate`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_certificate_config_map: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    pub name: String,
    pub namespace: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InjectorSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    /// ClusterRole granted to the injector service account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_role_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
    /// Extra sensor settings exposed to the injector through its ConfigMap
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sensor_config: BTreeMap<String, String>,
    /// Only inject into namespaces that explicitly opt in
    #[serde(default)]
    pub disable_default_namespace_injection: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SidecarSensorStatus {
    /// Operator version that first reconciled this resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Sensor image the injector was configured with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl SidecarSensor {
    pub fn install_namespace(&self) -> String {
        self.spec
            .install_namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DEFAULT_INSTALL_NAMESPACE.to_string())
    }

    /// The explicit image override, ignoring empty strings
    pub fn image_override(&self) -> Option<&str> {
        self.spec.image.as_deref().filter(|i| !i.is_empty())
    }

    pub fn sensor_version(&self) -> &str {
        self.spec
            .version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_SENSOR_VERSION)
    }

    pub fn image_repository(&self) -> &str {
        self.spec
            .registry
            .image_repository
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_IMAGE_REPOSITORY)
    }

    pub fn image_mirroring_enabled(&self) -> bool {
        self.spec.registry.mirror_image
    }

    /// The CA certificate value to publish, unless a ConfigMap reference overrides it
    pub fn registry_ca_certificate(&self) -> Option<&str> {
        let tls = &self.spec.registry.tls;
        if tls.ca_certificate_config_map.as_deref().is_some_and(|c| !c.is_empty()) {
            return None;
        }
        tls.ca_certificate.as_deref().filter(|c| !c.is_empty())
    }

    pub fn find_condition(&self, condition_type: &str) -> Option<&Condition> {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.iter().find(|c| c.type_ == condition_type))
    }

    // Object names are derived from the resource name so two instances never collide.

    pub fn injector_name(&self) -> String {
        format!("{}-injector", self.name_any())
    }

    pub fn injector_tls_secret_name(&self) -> String {
        format!("{}-injector-tls", self.name_any())
    }

    pub fn pull_secret_name(&self) -> String {
        format!("{}-pull-secret", self.name_any())
    }

    pub fn registry_ca_config_map_name(&self) -> String {
        format!("{}-registry-ca", self.name_any())
    }

    pub fn service_account_name(&self) -> String {
        self.spec
            .injector
            .service_account_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.injector_name())
    }

    pub fn cluster_role_binding_name(&self) -> String {
        format!("{}-injector", self.name_any())
    }

    pub fn webhook_name(&self) -> String {
        format!("{}.injector.sensor.dev", self.name_any())
    }

    /// The fixed label set for a subordinate object of the given component
    pub fn labels(&self, component: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (labels::INSTANCE_NAME.to_string(), labels::INSTANCE_NAME_VALUE.to_string()),
            (labels::INSTANCE_KEY.to_string(), self.name_any()),
            (labels::COMPONENT.to_string(), component.to_string()),
            (labels::MANAGED_BY.to_string(), OPERATOR_NAME.to_string()),
            (labels::PROVIDER.to_string(), labels::PROVIDER_VALUE.to_string()),
            (labels::PART_OF.to_string(), labels::PART_OF_VALUE.to_string()),
            (labels::CREATED_BY.to_string(), OPERATOR_NAME.to_string()),
        ])
    }

    /// Label selector matching the injector pods of this instance
    pub fn injector_selector(&self) -> String {
        self.labels(components::INJECTOR)
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Metadata for a subordinate object: name, namespace, labels and owner reference
    pub fn child_meta(&self, name: &str, namespace: Option<&str>, component: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: namespace.map(str::to_string),
            labels: Some(self.labels(component)),
            owner_references: self.owner_reference().map(|o| vec![o]),
            ..Default::default()
        }
    }

    fn owner_reference(&self) -> Option<OwnerReference> {
        // Only persisted objects have a uid to point at
        self.meta().uid.as_ref()?;
        self.controller_owner_ref(&())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_sensor(spec: SidecarSensorSpec) -> SidecarSensor {
        SidecarSensor {
            metadata: ObjectMeta {
                name: Some("default".to_string()),
                uid: Some("uid-1".to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    #[test]
    fn test_install_namespace_defaults() {
        let sensor = make_sensor(SidecarSensorSpec::default());
        assert_eq!(sensor.install_namespace(), DEFAULT_INSTALL_NAMESPACE);
    }

    #[test]
    fn test_install_namespace_from_spec() {
        let sensor = make_sensor(SidecarSensorSpec {
            install_namespace: Some("custom".to_string()),
            ..Default::default()
        });
        assert_eq!(sensor.install_namespace(), "custom");
    }

    #[test]
    fn test_empty_image_is_not_an_override() {
        let sensor = make_sensor(SidecarSensorSpec {
            image: Some(String::new()),
            ..Default::default()
        });
        assert!(sensor.image_override().is_none());
    }

    #[test]
    fn test_ca_config_map_takes_precedence_over_ca_value() {
        let mut spec = SidecarSensorSpec::default();
        spec.registry.tls.ca_certificate = Some("PEM".to_string());
        assert_eq!(make_sensor(spec.clone()).registry_ca_certificate(), Some("PEM"));

        spec.registry.tls.ca_certificate_config_map = Some("existing-ca".to_string());
        assert!(make_sensor(spec).registry_ca_certificate().is_none());
    }

    #[test]
    fn test_labels_carry_fixed_set() {
        let sensor = make_sensor(SidecarSensorSpec::default());
        let labels = sensor.labels(components::INJECTOR);

        assert_eq!(labels.len(), 7);
        assert_eq!(labels.get(labels::INSTANCE_KEY).unwrap(), "default");
        assert_eq!(labels.get(labels::COMPONENT).unwrap(), "injector");
        assert_eq!(labels.get(labels::MANAGED_BY).unwrap(), OPERATOR_NAME);
    }

    #[test]
    fn test_injector_selector_matches_labels() {
        let sensor = make_sensor(SidecarSensorSpec::default());
        let selector = sensor.injector_selector();

        assert!(selector.contains("app.kubernetes.io/component=injector"));
        assert!(selector.contains("app.kubernetes.io/instance=default"));
        assert_eq!(selector.split(',').count(), 7);
    }

    #[test]
    fn test_child_meta_sets_controller_owner() {
        let sensor = make_sensor(SidecarSensorSpec::default());
        let meta = sensor.child_meta("x", Some("ns"), components::INJECTOR);

        let owners = meta.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "SidecarSensor");
        assert_eq!(owners[0].controller, Some(true));
    }

    #[test]
    fn test_child_meta_without_uid_has_no_owner() {
        let mut sensor = make_sensor(SidecarSensorSpec::default());
        sensor.metadata.uid = None;
        let meta = sensor.child_meta("x", None, components::INJECTOR);
        assert!(meta.owner_references.is_none());
    }

    #[test]
    fn test_registry_type_deserializes_lowercase() {
        let spec: RegistrySpec = serde_json::from_str(r#"{"type":"openshift"}"#).unwrap();
        assert_eq!(spec.registry_type, RegistryType::Openshift);
    }

    #[test]
    fn test_derived_names() {
        let sensor = make_sensor(SidecarSensorSpec::default());
        assert_eq!(sensor.injector_name(), "default-injector");
        assert_eq!(sensor.injector_tls_secret_name(), "default-injector-tls");
        assert_eq!(sensor.service_account_name(), "default-injector");
        assert_eq!(sensor.webhook_name(), "default.injector.sensor.dev");
    }
}
