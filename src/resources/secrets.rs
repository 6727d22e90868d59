// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{components, keys};
use crate::error::Result;
use crate::resources::tls::{self, TlsMaterial};
use crate::types::sensor::SidecarSensor;
use base64::Engine;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::ByteString;
use std::collections::BTreeMap;

/// Image pull secret carrying a `.dockerconfigjson`
pub fn pull_secret(sensor: &SidecarSensor, docker_config: Vec<u8>) -> Secret {
    Secret {
        metadata: sensor.child_meta(
            &sensor.pull_secret_name(),
            Some(&sensor.install_namespace()),
            components::REGISTRY,
        ),
        data: Some(BTreeMap::from([(
            keys::DOCKER_CONFIG_JSON.to_string(),
            ByteString(docker_config),
        )])),
        type_: Some("kubernetes.io/dockerconfigjson".to_string()),
        ..Default::default()
    }
}

/// Serving certificate for the injector Service with its CA under `ca.crt`
pub fn injector_tls_secret(sensor: &SidecarSensor) -> Result<Secret> {
    let namespace = sensor.install_namespace();
    let material = tls::generate(
        &sensor.injector_name(),
        tls::service_dns_names(&sensor.injector_name(), &namespace),
    )?;
    Ok(tls_secret(sensor, &namespace, material))
}

fn tls_secret(sensor: &SidecarSensor, namespace: &str, material: TlsMaterial) -> Secret {
    Secret {
        metadata: sensor.child_meta(
            &sensor.injector_tls_secret_name(),
            Some(namespace),
            components::INJECTOR,
        ),
        data: Some(BTreeMap::from([
            (keys::CA_BUNDLE.to_string(), ByteString(material.ca_cert_pem.into_bytes())),
            (keys::TLS_CERT.to_string(), ByteString(material.cert_pem.into_bytes())),
            (keys::TLS_KEY.to_string(), ByteString(material.key_pem.into_bytes())),
        ])),
        type_: Some("kubernetes.io/tls".to_string()),
        ..Default::default()
    }
}

/// The CA bundle stored in the injector TLS secret, if any
pub fn ca_bundle(secret: &Secret) -> Option<Vec<u8>> {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(keys::CA_BUNDLE))
        .filter(|b| !b.0.is_empty())
        .map(|b| b.0.clone())
}

/// Accept a CA certificate either as PEM or as base64-encoded PEM
pub fn decode_ca_certificate(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.starts_with("-----BEGIN") {
        return trimmed.to_string();
    }
    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .map(|pem| pem.trim().to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// ConfigMap holding the registry CA certificate for image pulls
pub fn registry_ca_bundle(sensor: &SidecarSensor, ca_certificate: &str) -> ConfigMap {
    ConfigMap {
        metadata: sensor.child_meta(
            &sensor.registry_ca_config_map_name(),
            Some(&sensor.install_namespace()),
            components::REGISTRY,
        ),
        data: Some(BTreeMap::from([(
            keys::REGISTRY_CA_BUNDLE.to_string(),
            decode_ca_certificate(ca_certificate),
        )])),
        ..Default::default()
    }
}
