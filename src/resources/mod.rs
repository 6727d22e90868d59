// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Builders for the desired shape of every subordinate object.
//!
//! These are pure: the same SidecarSensor and inputs always produce the same
//! object, except for [`secrets::injector_tls_secret`] which issues new keys.

pub mod injector;
pub mod rbac;
pub mod secrets;
pub mod tls;
pub mod webhook;

use crate::constants::{components, labels};
use crate::types::sensor::SidecarSensor;
use k8s_openapi::api::core::v1::Namespace;

pub fn namespace(sensor: &SidecarSensor) -> Namespace {
    let mut metadata = sensor.child_meta(&sensor.install_namespace(), None, components::INSTALL);
    // the injector must never mutate its own pods
    metadata.labels.get_or_insert_with(Default::default).insert(
        labels::INJECTION.to_string(),
        labels::INJECTION_DISABLED.to_string(),
    );
    Namespace {
        metadata,
        ..Default::default()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_opts_out_of_injection() {
        let ns = namespace(&test_support::sensor());
        let labels = ns.metadata.labels.unwrap();

        assert_eq!(ns.metadata.name.as_deref(), Some("sidecar-sensor"));
        assert_eq!(labels.get(labels::INJECTION).map(String::as_str), Some("disabled"));
        assert!(ns.metadata.namespace.is_none());
    }
}
