// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use crate::config::ClusterInfo;
use crate::constants::{components, labels};
use crate::resources::injector::{SERVICE_PORT, WEBHOOK_PATH};
use crate::types::sensor::SidecarSensor;
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    WebhookClientConfig,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use k8s_openapi::ByteString;

const NAMESPACE_NAME_LABEL: &str = "kubernetes.io/metadata.name";

fn namespace_selector(sensor: &SidecarSensor) -> LabelSelector {
    let mut expressions = vec![LabelSelectorRequirement {
        key: NAMESPACE_NAME_LABEL.to_string(),
        operator: "NotIn".to_string(),
        values: Some(vec![
            sensor.install_namespace(),
            "kube-system".to_string(),
            "kube-public".to_string(),
        ]),
    }];
    expressions.push(if sensor.spec.injector.disable_default_namespace_injection {
        LabelSelectorRequirement {
            key: labels::INJECTION.to_string(),
            operator: "In".to_string(),
            values: Some(vec!["enabled".to_string()]),
        }
    } else {
        LabelSelectorRequirement {
            key: labels::INJECTION.to_string(),
            operator: "NotIn".to_string(),
            values: Some(vec![labels::INJECTION_DISABLED.to_string()]),
        }
    });
    LabelSelector {
        match_expressions: Some(expressions),
        ..Default::default()
    }
}

/// Webhook routing pod creation to the injector Service, trusting `ca_bundle`
pub fn mutating_webhook(
    sensor: &SidecarSensor,
    ca_bundle: &[u8],
    cluster: &ClusterInfo,
) -> MutatingWebhookConfiguration {
    let name = sensor.webhook_name();
    MutatingWebhookConfiguration {
        metadata: sensor.child_meta(&name, None, components::INJECTOR),
        webhooks: Some(vec![MutatingWebhook {
            name,
            admission_review_versions: cluster.admission_review_versions(),
            client_config: WebhookClientConfig {
                ca_bundle: Some(ByteString(ca_bundle.to_vec())),
                service: Some(ServiceReference {
                    name: sensor.injector_name(),
                    namespace: sensor.install_namespace(),
                    path: Some(WEBHOOK_PATH.to_string()),
                    port: Some(SERVICE_PORT),
                }),
                url: None,
            },
            rules: Some(vec![RuleWithOperations {
                api_groups: Some(vec![String::new()]),
                api_versions: Some(vec!["v1".to_string()]),
                operations: Some(vec!["CREATE".to_string()]),
                resources: Some(vec!["pods".to_string()]),
                scope: Some("Namespaced".to_string()),
            }]),
            namespace_selector: Some(namespace_selector(sensor)),
            failure_policy: Some("Ignore".to_string()),
            side_effects: "None".to_string(),
            timeout_seconds: Some(5),
            ..Default::default()
        }]),
    }
}
