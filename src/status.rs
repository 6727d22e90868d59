// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Conditions and version stamp on the SidecarSensor status subresource.
//!
//! The pure merge rules live on [`SidecarSensorStatus`]; [`StatusWriter`] persists
//! them. Every persisted write is optimistic (it carries the resourceVersion that
//! was last read) and is followed by a re-fetch, so later writes in the same
//! reconcile never start from a stale revision.

use crate::constants::conditions::{PENDING, REASON_REQ_NOT_MET};
use crate::error::Result;
use crate::types::sensor::{SidecarSensor, SidecarSensorStatus};
use chrono::{DateTime, Utc};
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

/// Condition status following Kubernetes conventions
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            observed_generation: None,
            last_transition_time: Utc::now(),
        }
    }

    pub fn with_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }
}

impl SidecarSensorStatus {
    /// Upsert a condition by type. Returns whether anything changed.
    ///
    /// The transition time only moves when the status flips; reason, message and
    /// observed generation are refreshed in place.
    pub fn set_condition(&mut self, new: Condition) -> bool {
        let Some(existing) = self.conditions.iter_mut().find(|c| c.type_ == new.type_) else {
            self.conditions.push(new);
            return true;
        };

        let mut changed = false;
        if existing.status != new.status {
            existing.status = new.status;
            existing.last_transition_time = new.last_transition_time;
            changed = true;
        }
        if existing.reason != new.reason {
            existing.reason = new.reason;
            changed = true;
        }
        if existing.message != new.message {
            existing.message = new.message;
            changed = true;
        }
        if existing.observed_generation != new.observed_generation {
            existing.observed_generation = new.observed_generation;
            changed = true;
        }
        changed
    }

    /// Seed the Pending condition on a status that has never been written
    pub fn initialize_if_empty(&mut self, generation: Option<i64>) -> bool {
        if !self.conditions.is_empty() {
            return false;
        }
        self.set_condition(
            Condition::new(
                PENDING,
                ConditionStatus::False,
                REASON_REQ_NOT_MET,
                "SidecarSensor progressing",
            )
            .with_generation(generation),
        )
    }

    /// Record the operator version unless one is already present
    pub fn ensure_version_stamped(&mut self, version: &str) -> bool {
        if self.version.as_deref().is_some_and(|v| !v.is_empty()) {
            return false;
        }
        self.version = Some(version.to_string());
        true
    }
}

/// Owns the latest known revision of a SidecarSensor and writes its status
pub struct StatusWriter {
    api: Api<SidecarSensor>,
    sensor: SidecarSensor,
}

impl StatusWriter {
    pub fn new(api: Api<SidecarSensor>, sensor: SidecarSensor) -> Self {
        Self { api, sensor }
    }

    /// The freshest revision read from the API server
    pub fn sensor(&self) -> &SidecarSensor {
        &self.sensor
    }

    pub async fn set_condition(
        &mut self,
        condition_type: &str,
        status: ConditionStatus,
        reason: &str,
        message: impl Into<String>,
    ) -> Result<()> {
        let condition = Condition::new(condition_type, status, reason, message)
            .with_generation(self.sensor.metadata.generation);
        self.mutate(|s| s.set_condition(condition)).await
    }

    pub async fn initialize_if_empty(&mut self) -> Result<()> {
        let generation = self.sensor.metadata.generation;
        self.mutate(|s| s.initialize_if_empty(generation)).await
    }

    pub async fn ensure_version_stamped(&mut self, version: &str) -> Result<()> {
        self.mutate(|s| s.ensure_version_stamped(version)).await
    }

    pub async fn set_sensor_image(&mut self, image: &str) -> Result<()> {
        self.mutate(|s| {
            if s.sensor.as_deref() == Some(image) {
                return false;
            }
            s.sensor = Some(image.to_string());
            true
        })
        .await
    }

    /// Apply `f` to the in-memory status and persist only if it reports a change
    async fn mutate<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut SidecarSensorStatus) -> bool,
    {
        let mut status = self.sensor.status.clone().unwrap_or_default();
        if !f(&mut status) {
            return Ok(());
        }
        self.persist(status).await
    }

    async fn persist(&mut self, status: SidecarSensorStatus) -> Result<()> {
        let name = self.sensor.name_any();
        let patch = json!({
            "metadata": { "resourceVersion": self.sensor.resource_version() },
            "status": status,
        });

        if let Err(e) = self
            .api
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            error!("Failed to update SidecarSensor {} status: {}", name, e);
            return Err(e.into());
        }

        self.sensor = self.api.get(&name).await.map_err(|e| {
            error!("Failed to re-fetch SidecarSensor {}: {}", name, e);
            e
        })?;
        debug!(
            "SidecarSensor {} status written, now at revision {:?}",
            name,
            self.sensor.resource_version()
        );
        Ok(())
    }
}
