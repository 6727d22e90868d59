// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Readiness gate: find a Ready pod among those matching a label selector

use crate::error::Result;
use k8s_openapi::api::core::v1::Pod;
use kube::{api::ListParams, Api, Client, ResourceExt};
use tracing::{debug, instrument};

/// Whether the pod reports the `Ready` condition as true
pub fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

/// Return the first Ready pod in `namespace` matching `selector`.
///
/// `Ok(None)` means nothing matched or nothing is Ready yet, which is the normal
/// state during a rollout. Only a failed query is an error.
#[instrument(skip(client))]
pub async fn find_ready_pod(client: &Client, namespace: &str, selector: &str) -> Result<Option<Pod>> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let list = pods.list(&ListParams::default().labels(selector)).await?;

    debug!("Found {} pods matching selector", list.items.len());
    Ok(list.items.into_iter().find(|p| {
        let ready = is_pod_ready(p);
        if !ready {
            debug!("Pod {} is not Ready yet", p.name_any());
        }
        ready
    }))
}
