// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The closed set of object kinds the operator manages, and what "drifted" means for each.

use k8s_openapi::api::admissionregistration::v1::{MutatingWebhook, MutatingWebhookConfiguration};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    ConfigMap, LocalObjectReference, Namespace, PodSpec, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubordinateKind {
    Namespace,
    Secret,
    ConfigMap,
    ServiceAccount,
    ClusterRoleBinding,
    Deployment,
    Service,
    MutatingWebhookConfiguration,
}

impl SubordinateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Namespace => "Namespace",
            Self::Secret => "Secret",
            Self::ConfigMap => "ConfigMap",
            Self::ServiceAccount => "ServiceAccount",
            Self::ClusterRoleBinding => "ClusterRoleBinding",
            Self::Deployment => "Deployment",
            Self::Service => "Service",
            Self::MutatingWebhookConfiguration => "MutatingWebhookConfiguration",
        }
    }

    /// The `<Kind>Ready` condition type mirrored on the SidecarSensor status
    pub fn condition_type(&self) -> &'static str {
        match self {
            Self::Namespace => "NamespaceReady",
            Self::Secret => "SecretReady",
            Self::ConfigMap => "ConfigMapReady",
            Self::ServiceAccount => "ServiceAccountReady",
            Self::ClusterRoleBinding => "ClusterRoleBindingReady",
            Self::Deployment => "DeploymentReady",
            Self::Service => "ServiceReady",
            Self::MutatingWebhookConfiguration => "MutatingWebhookConfigurationReady",
        }
    }
}

impl std::fmt::Display for SubordinateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An object kind the operator creates and keeps in shape.
///
/// `drifted` compares only the fields this operator sets, never server-defaulted ones.
/// `adopt` copies those fields from the desired object onto the stored one before an update.
pub trait Subordinate:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: SubordinateKind;

    fn drifted(desired: &Self, current: &Self) -> bool;

    fn adopt(current: &mut Self, desired: &Self);
}

fn labels_missing(desired: &ObjectMeta, current: &ObjectMeta) -> bool {
    let Some(wanted) = desired.labels.as_ref() else {
        return false;
    };
    let have = current.labels.as_ref();
    wanted
        .iter()
        .any(|(k, v)| have.and_then(|h| h.get(k)) != Some(v))
}

fn adopt_labels(current: &mut ObjectMeta, desired: &ObjectMeta) {
    if let Some(wanted) = desired.labels.as_ref() {
        let labels = current.labels.get_or_insert_with(BTreeMap::new);
        labels.extend(wanted.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if current.owner_references.is_none() {
        current.owner_references = desired.owner_references.clone();
    }
}

impl Subordinate for Namespace {
    const KIND: SubordinateKind = SubordinateKind::Namespace;

    fn drifted(desired: &Self, current: &Self) -> bool {
        labels_missing(&desired.metadata, &current.metadata)
    }

    fn adopt(current: &mut Self, desired: &Self) {
        adopt_labels(&mut current.metadata, &desired.metadata);
    }
}

impl Subordinate for Secret {
    const KIND: SubordinateKind = SubordinateKind::Secret;

    fn drifted(desired: &Self, current: &Self) -> bool {
        labels_missing(&desired.metadata, &current.metadata)
            || desired.data != current.data
            || desired.type_ != current.type_
    }

    fn adopt(current: &mut Self, desired: &Self) {
        adopt_labels(&mut current.metadata, &desired.metadata);
        current.data = desired.data.clone();
        current.type_ = desired.type_.clone();
    }
}

impl Subordinate for ConfigMap {
    const KIND: SubordinateKind = SubordinateKind::ConfigMap;

    fn drifted(desired: &Self, current: &Self) -> bool {
        labels_missing(&desired.metadata, &current.metadata) || desired.data != current.data
    }

    fn adopt(current: &mut Self, desired: &Self) {
        adopt_labels(&mut current.metadata, &desired.metadata);
        current.data = desired.data.clone();
    }
}

fn missing_pull_secrets<'a>(
    desired: &'a ServiceAccount,
    current: &'a ServiceAccount,
) -> impl Iterator<Item = &'a LocalObjectReference> + 'a {
    let have = current.image_pull_secrets.as_deref().unwrap_or_default();
    desired
        .image_pull_secrets
        .iter()
        .flatten()
        .filter(move |want| !have.iter().any(|h| h.name == want.name))
}

impl Subordinate for ServiceAccount {
    const KIND: SubordinateKind = SubordinateKind::ServiceAccount;

    fn drifted(desired: &Self, current: &Self) -> bool {
        labels_missing(&desired.metadata, &current.metadata)
            || missing_pull_secrets(desired, current).next().is_some()
    }

    // the token controller appends its own dockercfg entries, those are kept
    fn adopt(current: &mut Self, desired: &Self) {
        adopt_labels(&mut current.metadata, &desired.metadata);
        let missing: Vec<_> = missing_pull_secrets(desired, current).cloned().collect();
        if !missing.is_empty() {
            current
                .image_pull_secrets
                .get_or_insert_with(Vec::new)
                .extend(missing);
        }
    }
}

impl Subordinate for ClusterRoleBinding {
    const KIND: SubordinateKind = SubordinateKind::ClusterRoleBinding;

    fn drifted(desired: &Self, current: &Self) -> bool {
        labels_missing(&desired.metadata, &current.metadata)
            || desired.role_ref != current.role_ref
            || desired.subjects != current.subjects
    }

    fn adopt(current: &mut Self, desired: &Self) {
        adopt_labels(&mut current.metadata, &desired.metadata);
        current.role_ref = desired.role_ref.clone();
        current.subjects = desired.subjects.clone();
    }
}

/// Name and backing Secret or ConfigMap of each pod volume, in order
fn volume_sources(pod: &PodSpec) -> Vec<(&str, Option<&str>, Option<&str>)> {
    pod.volumes
        .iter()
        .flatten()
        .map(|v| {
            (
                v.name.as_str(),
                v.secret.as_ref().and_then(|s| s.secret_name.as_deref()),
                v.config_map.as_ref().map(|c| c.name.as_str()),
            )
        })
        .collect()
}

impl Subordinate for Deployment {
    const KIND: SubordinateKind = SubordinateKind::Deployment;

    fn drifted(desired: &Self, current: &Self) -> bool {
        if labels_missing(&desired.metadata, &current.metadata) {
            return true;
        }
        let (Some(want), Some(have)) = (desired.spec.as_ref(), current.spec.as_ref()) else {
            return desired.spec.is_some();
        };
        if want.replicas.is_some() && want.replicas != have.replicas {
            return true;
        }
        if labels_missing(
            want.template.metadata.as_ref().unwrap_or(&ObjectMeta::default()),
            have.template.metadata.as_ref().unwrap_or(&ObjectMeta::default()),
        ) {
            return true;
        }
        let (Some(want_pod), Some(have_pod)) = (want.template.spec.as_ref(), have.template.spec.as_ref())
        else {
            return want.template.spec.is_some();
        };
        if want_pod.service_account_name != have_pod.service_account_name
            || want_pod.image_pull_secrets != have_pod.image_pull_secrets
            || volume_sources(want_pod) != volume_sources(have_pod)
            || want_pod.containers.len() != have_pod.containers.len()
        {
            return true;
        }
        want_pod
            .containers
            .iter()
            .zip(have_pod.containers.iter())
            .any(|(w, h)| {
                w.name != h.name
                    || w.image != h.image
                    || w.args != h.args
                    || w.env != h.env
                    || w.env_from != h.env_from
                    || w.volume_mounts != h.volume_mounts
                    || (w.image_pull_policy.is_some() && w.image_pull_policy != h.image_pull_policy)
            })
    }

    fn adopt(current: &mut Self, desired: &Self) {
        adopt_labels(&mut current.metadata, &desired.metadata);
        current.spec = desired.spec.clone();
    }
}

impl Subordinate for Service {
    const KIND: SubordinateKind = SubordinateKind::Service;

    fn drifted(desired: &Self, current: &Self) -> bool {
        if labels_missing(&desired.metadata, &current.metadata) {
            return true;
        }
        let (Some(want), Some(have)) = (desired.spec.as_ref(), current.spec.as_ref()) else {
            return desired.spec.is_some();
        };
        let ports = |s: &k8s_openapi::api::core::v1::ServiceSpec| {
            s.ports
                .iter()
                .flatten()
                .map(|p| (p.name.clone(), p.port, p.target_port.clone()))
                .collect::<Vec<_>>()
        };
        want.selector != have.selector || ports(want) != ports(have)
    }

    fn adopt(current: &mut Self, desired: &Self) {
        adopt_labels(&mut current.metadata, &desired.metadata);
        // cluster IP and other allocated fields stay as the server set them
        if let (Some(have), Some(want)) = (current.spec.as_mut(), desired.spec.as_ref()) {
            have.selector = want.selector.clone();
            have.ports = want.ports.clone();
        } else {
            current.spec = desired.spec.clone();
        }
    }
}

fn webhook_drifted(want: &MutatingWebhook, have: &MutatingWebhook) -> bool {
    want.name != have.name
        || want.client_config != have.client_config
        || want.rules != have.rules
        || want.namespace_selector != have.namespace_selector
        || want.admission_review_versions != have.admission_review_versions
        || want.failure_policy != have.failure_policy
        || want.side_effects != have.side_effects
}

impl Subordinate for MutatingWebhookConfiguration {
    const KIND: SubordinateKind = SubordinateKind::MutatingWebhookConfiguration;

    fn drifted(desired: &Self, current: &Self) -> bool {
        if labels_missing(&desired.metadata, &current.metadata) {
            return true;
        }
        let want = desired.webhooks.as_deref().unwrap_or_default();
        let have = current.webhooks.as_deref().unwrap_or_default();
        want.len() != have.len() || want.iter().zip(have).any(|(w, h)| webhook_drifted(w, h))
    }

    fn adopt(current: &mut Self, desired: &Self) {
        adopt_labels(&mut current.metadata, &desired.metadata);
        current.webhooks = desired.webhooks.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

    fn meta(labels: &[(&str, &str)]) -> ObjectMeta {
        ObjectMeta {
            name: Some("obj".to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_condition_type_names() {
        assert_eq!(SubordinateKind::Namespace.condition_type(), "NamespaceReady");
        assert_eq!(
            SubordinateKind::MutatingWebhookConfiguration.condition_type(),
            "MutatingWebhookConfigurationReady"
        );
    }

    #[test]
    fn test_extra_labels_on_current_are_not_drift() {
        let desired = Namespace {
            metadata: meta(&[("a", "1")]),
            ..Default::default()
        };
        let current = Namespace {
            metadata: meta(&[("a", "1"), ("added-by-admin", "yes")]),
            ..Default::default()
        };
        assert!(!Namespace::drifted(&desired, &current));
    }

    #[test]
    fn test_missing_label_is_drift() {
        let desired = Namespace {
            metadata: meta(&[("a", "1")]),
            ..Default::default()
        };
        let current = Namespace {
            metadata: meta(&[("a", "2")]),
            ..Default::default()
        };
        assert!(Namespace::drifted(&desired, &current));
    }

    #[test]
    fn test_configmap_data_change_is_drift() {
        let desired = ConfigMap {
            metadata: meta(&[]),
            data: Some(BTreeMap::from([("k".to_string(), "new".to_string())])),
            ..Default::default()
        };
        let mut current = desired.clone();
        current.data = Some(BTreeMap::from([("k".to_string(), "old".to_string())]));

        assert!(ConfigMap::drifted(&desired, &current));
        ConfigMap::adopt(&mut current, &desired);
        assert!(!ConfigMap::drifted(&desired, &current));
    }

    #[test]
    fn test_service_adopt_keeps_cluster_ip() {
        let port = ServicePort {
            name: Some("https".to_string()),
            port: 443,
            target_port: Some(IntOrString::Int(4433)),
            ..Default::default()
        };
        let desired = Service {
            metadata: meta(&[]),
            spec: Some(ServiceSpec {
                ports: Some(vec![port.clone()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut current = Service {
            metadata: meta(&[]),
            spec: Some(ServiceSpec {
                cluster_ip: Some("10.0.0.1".to_string()),
                ports: Some(vec![ServicePort { port: 80, ..port }]),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(Service::drifted(&desired, &current));
        Service::adopt(&mut current, &desired);
        assert!(!Service::drifted(&desired, &current));
        assert_eq!(current.spec.unwrap().cluster_ip.as_deref(), Some("10.0.0.1"));
    }

    fn pull_secrets(names: &[&str]) -> Option<Vec<LocalObjectReference>> {
        Some(
            names
                .iter()
                .map(|n| LocalObjectReference { name: n.to_string() })
                .collect(),
        )
    }

    #[test]
    fn test_extra_pull_secrets_on_service_account_are_not_drift() {
        let desired = ServiceAccount {
            metadata: meta(&[]),
            image_pull_secrets: pull_secrets(&["default-pull-secret"]),
            ..Default::default()
        };
        let current = ServiceAccount {
            metadata: meta(&[]),
            image_pull_secrets: pull_secrets(&["default-injector-dockercfg-abcde", "default-pull-secret"]),
            ..Default::default()
        };
        assert!(!ServiceAccount::drifted(&desired, &current));
    }

    #[test]
    fn test_service_account_adopt_merges_pull_secrets() {
        let desired = ServiceAccount {
            metadata: meta(&[]),
            image_pull_secrets: pull_secrets(&["default-pull-secret"]),
            ..Default::default()
        };
        let mut current = ServiceAccount {
            metadata: meta(&[]),
            image_pull_secrets: pull_secrets(&["default-injector-dockercfg-abcde"]),
            ..Default::default()
        };

        assert!(ServiceAccount::drifted(&desired, &current));
        ServiceAccount::adopt(&mut current, &desired);
        assert!(!ServiceAccount::drifted(&desired, &current));
        assert_eq!(
            current.image_pull_secrets,
            pull_secrets(&["default-injector-dockercfg-abcde", "default-pull-secret"])
        );
    }

    #[test]
    fn test_renamed_volume_source_is_drift() {
        use k8s_openapi::api::apps::v1::DeploymentSpec;
        use k8s_openapi::api::core::v1::{ConfigMapVolumeSource, PodTemplateSpec, Volume};

        let deployment = |ca: &str| Deployment {
            metadata: meta(&[]),
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        volumes: Some(vec![Volume {
                            name: "registry-ca".to_string(),
                            config_map: Some(ConfigMapVolumeSource {
                                name: ca.to_string(),
                                ..Default::default()
                            }),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        let desired = deployment("ca-b");
        let mut current = deployment("ca-a");
        assert!(Deployment::drifted(&desired, &current));
        Deployment::adopt(&mut current, &desired);
        assert!(!Deployment::drifted(&desired, &current));
    }
}
