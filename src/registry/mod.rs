// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Registry-specific image acquisition, exposed to the reconciler as a trait.

pub mod cluster;

pub use cluster::ClusterRegistry;

use crate::error::Result;
use crate::types::sensor::SidecarSensor;
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

/// Operations the reconciler delegates to whichever registry holds the sensor image
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ImageRegistry: Send + Sync {
    /// Make sure the ECR repository for the sensor image exists
    async fn upsert_ecr_repository(&self, sensor: &SidecarSensor) -> Result<()>;

    /// Reconcile the OpenShift ImageStream.
    ///
    /// Returns the stream's docker image repository, or `None` while the stream
    /// has not been assigned one yet.
    async fn reconcile_image_stream(&self, sensor: &SidecarSensor) -> Result<Option<String>>;

    /// Check the upstream registry is reachable with the configured credentials.
    ///
    /// Returns true when verification had to correct something, in which case the
    /// current reconcile stops and waits for the resulting change to re-trigger it.
    async fn verify_registry(&self, sensor: &SidecarSensor) -> Result<bool>;

    /// Push or refresh the mirrored sensor image
    async fn push_image(&self, sensor: &SidecarSensor) -> Result<()>;

    /// `.dockerconfigjson` content for the pull secret, or `None` if no pull secret is needed
    async fn pull_secret(&self, sensor: &SidecarSensor) -> Result<Option<Vec<u8>>>;

    /// Image reference the injector should use when nothing overrides it
    async fn image_uri(&self, sensor: &SidecarSensor) -> Result<String>;
}
