// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Wait for the SidecarSensor CRD to be served before the controller starts

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::constants::API_GROUP;
use crate::error::Result;
use crate::types::sensor::SidecarSensor;
use kube::{discovery::Discovery, Client, Resource};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Wait for the SidecarSensor CRD to become available in the cluster.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_sensor_crd(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;
    let version = SidecarSensor::version(&());

    loop {
        match sensor_crd_served(client).await {
            Ok(true) => {
                info!("SidecarSensor CRD ({}/{}) is available", API_GROUP, version);
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "SidecarSensor CRD ({}/{}) not yet available, waiting {} seconds...",
                    API_GROUP, version, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for SidecarSensor CRD: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

async fn sensor_crd_served(client: &Client) -> Result<bool> {
    let discovery = Discovery::new(client.clone())
        .filter(&[API_GROUP])
        .run()
        .await?;

    let kind = SidecarSensor::kind(&());
    let version = SidecarSensor::version(&());
    let served = discovery
        .groups()
        .filter(|g| g.name() == API_GROUP)
        .flat_map(|g| g.recommended_resources())
        .any(|(ar, _)| ar.kind == kind && ar.version == version);
    Ok(served)
}
