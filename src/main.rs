// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sidecar_sensor_operator::config::{ClusterInfo, Config};
use sidecar_sensor_operator::kubernetes::wait_for_sensor_crd;
use sidecar_sensor_operator::reconcilers::SidecarSensorReconciler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting SidecarSensor operator");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: operator_version={}, related_image={:?}",
        config.operator_version, config.related_image
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let cluster = ClusterInfo::discover(&client).await?;

    info!("Waiting for SidecarSensor CRD to become available...");
    wait_for_sensor_crd(&client).await?;

    SidecarSensorReconciler::new(client, config, cluster).run().await?;

    info!("Shutting down");
    Ok(())
}
