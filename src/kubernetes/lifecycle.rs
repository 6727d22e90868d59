// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Create/update/delete wrappers that absorb benign API races and mirror the
//! outcome into the `<Kind>Ready` condition.

use crate::constants::conditions::{REASON_CREATED, REASON_DELETED, REASON_UPDATED};
use crate::error::{is_api_code, Result, SensorError};
use crate::kubernetes::kinds::Subordinate;
use crate::status::{ConditionStatus, StatusWriter};
use kube::api::{DeleteParams, PostParams};
use kube::{Api, ResourceExt};
use tracing::{info, instrument};

fn location<K: Subordinate>(obj: &K) -> String {
    match obj.namespace() {
        Some(ns) => format!("namespace {}", ns),
        None => "cluster scope".to_string(),
    }
}

/// Create `obj`. An "already exists" answer means a concurrent reconcile won the race,
/// in which case the stored object is returned.
#[instrument(skip_all, fields(kind = %K::KIND, name = %obj.name_any()))]
pub async fn create<K: Subordinate>(api: &Api<K>, obj: &K, status: &mut StatusWriter) -> Result<K> {
    let kind = K::KIND;
    let name = obj.name_any();
    let location = location(obj);

    info!("Creating {} {} in {}", kind, name, location);
    let created = match api.create(&PostParams::default(), obj).await {
        Ok(created) => created,
        Err(e) if is_api_code(&e, 409) => {
            info!("{} {} already exists in {}", kind, name, location);
            api.get(&name).await?
        }
        Err(source) => {
            return Err(SensorError::ObjectWriteFailed {
                action: "create",
                kind: kind.as_str(),
                name,
                source,
            })
        }
    };

    status
        .set_condition(
            kind.condition_type(),
            ConditionStatus::True,
            REASON_CREATED,
            format!("Successfully created {} {} in {}", kind, name, location),
        )
        .await?;
    Ok(created)
}

/// Replace `obj`, which must carry the resourceVersion it was read at.
#[instrument(skip_all, fields(kind = %K::KIND, name = %obj.name_any()))]
pub async fn update<K: Subordinate>(api: &Api<K>, obj: &K, status: &mut StatusWriter) -> Result<K> {
    let kind = K::KIND;
    let name = obj.name_any();
    let location = location(obj);

    info!("Updating {} {} in {}", kind, name, location);
    let updated = api
        .replace(&name, &PostParams::default(), obj)
        .await
        .map_err(|source| {
            if is_api_code(&source, 404) {
                info!("{} {} does not exist in {}", kind, name, location);
            }
            SensorError::ObjectWriteFailed {
                action: "update",
                kind: kind.as_str(),
                name: name.clone(),
                source,
            }
        })?;

    status
        .set_condition(
            kind.condition_type(),
            ConditionStatus::True,
            REASON_UPDATED,
            format!("Successfully updated {} {} in {}", kind, name, location),
        )
        .await?;
    Ok(updated)
}

/// Delete the named object. Returns whether anything was removed; an object that is
/// already gone is not an error and leaves the status untouched.
#[instrument(skip(api, status), fields(kind = %K::KIND))]
pub async fn delete<K: Subordinate>(api: &Api<K>, name: &str, status: &mut StatusWriter) -> Result<bool> {
    let kind = K::KIND;

    info!("Deleting {} {}", kind, name);
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => {}
        Err(e) if is_api_code(&e, 404) => {
            info!("{} {} already removed", kind, name);
            return Ok(false);
        }
        Err(source) => {
            return Err(SensorError::ObjectWriteFailed {
                action: "delete",
                kind: kind.as_str(),
                name: name.to_string(),
                source,
            })
        }
    }

    status
        .set_condition(
            kind.condition_type(),
            ConditionStatus::False,
            REASON_DELETED,
            format!("Successfully deleted {} {}", kind, name),
        )
        .await?;
    Ok(true)
}
