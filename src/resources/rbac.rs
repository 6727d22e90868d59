// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use crate::constants::components;
use crate::types::sensor::SidecarSensor;
use k8s_openapi::api::core::v1::{LocalObjectReference, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleRef, Subject};

/// ClusterRole bound to the injector when the resource does not name one
pub const DEFAULT_CLUSTER_ROLE: &str = "sidecar-sensor-injector";

pub fn service_account(sensor: &SidecarSensor, pull_secret: Option<&str>) -> ServiceAccount {
    ServiceAccount {
        metadata: sensor.child_meta(
            &sensor.service_account_name(),
            Some(&sensor.install_namespace()),
            components::INJECTOR,
        ),
        image_pull_secrets: pull_secret.map(|name| {
            vec![LocalObjectReference {
                name: name.to_string(),
            }]
        }),
        ..Default::default()
    }
}

pub fn cluster_role_binding(sensor: &SidecarSensor) -> ClusterRoleBinding {
    let role = sensor
        .spec
        .injector
        .cluster_role_name
        .clone()
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_CLUSTER_ROLE.to_string());

    ClusterRoleBinding {
        metadata: sensor.child_meta(&sensor.cluster_role_binding_name(), None, components::INJECTOR),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: role,
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: sensor.service_account_name(),
            namespace: Some(sensor.install_namespace()),
            ..Default::default()
        }]),
    }
}
