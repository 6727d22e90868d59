// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ConfigMap, Deployment and Service of the sidecar injector

use crate::constants::components;
use crate::types::sensor::SidecarSensor;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapEnvSource, ConfigMapVolumeSource, Container, ContainerPort, EnvFromSource,
    HTTPGetAction, LocalObjectReference, PodSpec, PodTemplateSpec, Probe, SecretVolumeSource,
    SecurityContext, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

pub const DEFAULT_LISTEN_PORT: i32 = 4433;
pub const SERVICE_PORT: i32 = 443;
pub const WEBHOOK_PATH: &str = "/mutate";

const TLS_MOUNT_PATH: &str = "/run/secrets/tls";
const REGISTRY_CA_MOUNT_PATH: &str = "/etc/docker/certs.d/sensor";

pub fn listen_port(sensor: &SidecarSensor) -> i32 {
    sensor.spec.injector.listen_port.unwrap_or(DEFAULT_LISTEN_PORT)
}

fn image_pull_policy(sensor: &SidecarSensor) -> String {
    sensor
        .spec
        .injector
        .image_pull_policy
        .clone()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "Always".to_string())
}

/// Settings the injector reads from its environment
pub fn config_map(sensor: &SidecarSensor, image: &str, pull_secret: Option<&str>) -> ConfigMap {
    let mut data: BTreeMap<String, String> = sensor.spec.injector.sensor_config.clone();
    data.insert("SENSOR_IMAGE".to_string(), image.to_string());
    data.insert("SENSOR_IMAGE_PULL_POLICY".to_string(), image_pull_policy(sensor));
    data.insert("INJECTOR_LISTEN_PORT".to_string(), listen_port(sensor).to_string());
    if let Some(region) = sensor.spec.api.as_ref().and_then(|a| a.cloud_region.clone()) {
        data.insert("SENSOR_CLOUD_REGION".to_string(), region);
    }
    if let Some(secret) = pull_secret {
        data.insert("SENSOR_IMAGE_PULL_SECRET".to_string(), secret.to_string());
    }

    ConfigMap {
        metadata: sensor.child_meta(
            &sensor.injector_name(),
            Some(&sensor.install_namespace()),
            components::INJECTOR,
        ),
        data: Some(data),
        ..Default::default()
    }
}

/// The ConfigMap with the registry CA, when one is in play
fn registry_ca_config_map(sensor: &SidecarSensor) -> Option<String> {
    let tls = &sensor.spec.registry.tls;
    tls.ca_certificate_config_map
        .clone()
        .filter(|c| !c.is_empty())
        .or_else(|| sensor.registry_ca_certificate().map(|_| sensor.registry_ca_config_map_name()))
}

pub fn deployment(sensor: &SidecarSensor, image: &str, pull_secret: Option<&str>) -> Deployment {
    let name = sensor.injector_name();
    let labels = sensor.labels(components::INJECTOR);
    let port = listen_port(sensor);

    let mut volumes = vec![Volume {
        name: "tls".to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(sensor.injector_tls_secret_name()),
            ..Default::default()
        }),
        ..Default::default()
    }];
    let mut volume_mounts = vec![VolumeMount {
        name: "tls".to_string(),
        mount_path: TLS_MOUNT_PATH.to_string(),
        read_only: Some(true),
        ..Default::default()
    }];
    if let Some(ca) = registry_ca_config_map(sensor) {
        volumes.push(Volume {
            name: "registry-ca".to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: ca,
                ..Default::default()
            }),
            ..Default::default()
        });
        volume_mounts.push(VolumeMount {
            name: "registry-ca".to_string(),
            mount_path: REGISTRY_CA_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        });
    }

    let container = Container {
        name: "sidecar-injector".to_string(),
        image: Some(image.to_string()),
        image_pull_policy: Some(image_pull_policy(sensor)),
        args: Some(vec![
            "-injector".to_string(),
            format!("-tls-dir={}", TLS_MOUNT_PATH),
        ]),
        env_from: Some(vec![EnvFromSource {
            config_map_ref: Some(ConfigMapEnvSource {
                name: name.clone(),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        ports: Some(vec![ContainerPort {
            name: Some("https".to_string()),
            container_port: port,
            ..Default::default()
        }]),
        readiness_probe: Some(Probe {
            http_get: Some(HTTPGetAction {
                path: Some("/live".to_string()),
                port: IntOrString::Int(port),
                scheme: Some("HTTPS".to_string()),
                ..Default::default()
            }),
            period_seconds: Some(5),
            ..Default::default()
        }),
        security_context: Some(SecurityContext {
            allow_privilege_escalation: Some(false),
            read_only_root_filesystem: Some(true),
            run_as_non_root: Some(true),
            ..Default::default()
        }),
        volume_mounts: Some(volume_mounts),
        ..Default::default()
    };

    Deployment {
        metadata: sensor.child_meta(&name, Some(&sensor.install_namespace()), components::INJECTOR),
        spec: Some(DeploymentSpec {
            replicas: Some(sensor.spec.injector.replicas.unwrap_or(1)),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(sensor.service_account_name()),
                    image_pull_secrets: pull_secret.map(|s| {
                        vec![LocalObjectReference {
                            name: s.to_string(),
                        }]
                    }),
                    containers: vec![container],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn service(sensor: &SidecarSensor) -> Service {
    Service {
        metadata: sensor.child_meta(
            &sensor.injector_name(),
            Some(&sensor.install_namespace()),
            components::INJECTOR,
        ),
        spec: Some(ServiceSpec {
            selector: Some(sensor.labels(components::INJECTOR)),
            ports: Some(vec![ServicePort {
                name: Some("https".to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(listen_port(sensor))),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
