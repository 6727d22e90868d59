// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Converge one subordinate object: get, then create if absent or update if drifted.
//!
//! Steps never assume earlier steps ran; a fresh install, a no-op replay and a
//! resumed partial install all go through the same get-first path.

use crate::constants::conditions::REASON_PRESENT;
use crate::error::Result;
use crate::kubernetes::kinds::Subordinate;
use crate::kubernetes::lifecycle;
use crate::status::{ConditionStatus, StatusWriter};
use kube::{Api, ResourceExt};
use tracing::debug;

/// Make the stored object match `desired` in the fields the operator owns
pub async fn reconcile_object<K: Subordinate>(
    api: &Api<K>,
    desired: K,
    status: &mut StatusWriter,
) -> Result<K> {
    let name = desired.name_any();
    match api.get_opt(&name).await? {
        None => lifecycle::create(api, &desired, status).await,
        Some(mut current) => {
            if !K::drifted(&desired, &current) {
                debug!("{} {} is up to date", K::KIND, name);
                mark_present::<K>(&name, status).await?;
                return Ok(current);
            }
            K::adopt(&mut current, &desired);
            lifecycle::update(api, &current, status).await
        }
    }
}

/// Several objects of one kind share a `<Kind>Ready` condition, so a delete of one
/// of them can leave it False while a sibling is still in place
async fn mark_present<K: Subordinate>(name: &str, status: &mut StatusWriter) -> Result<()> {
    let condition_type = K::KIND.condition_type();
    let stale = status
        .sensor()
        .find_condition(condition_type)
        .is_some_and(|c| c.status == ConditionStatus::False);
    if !stale {
        return Ok(());
    }
    status
        .set_condition(
            condition_type,
            ConditionStatus::True,
            REASON_PRESENT,
            format!("{} {} is present", K::KIND, name),
        )
        .await
}

/// Create the object built by `build` only when nothing called `name` exists; an
/// existing object is returned untouched. Used for objects whose content must stay
/// stable once issued, so `build` runs only on the create path.
pub async fn ensure_object<K, F>(
    api: &Api<K>,
    name: &str,
    build: F,
    status: &mut StatusWriter,
) -> Result<K>
where
    K: Subordinate,
    F: FnOnce() -> Result<K>,
{
    match api.get_opt(name).await? {
        None => {
            let desired = build()?;
            lifecycle::create(api, &desired, status).await
        }
        Some(current) => {
            debug!("{} {} already present", K::KIND, name);
            Ok(current)
        }
    }
}
