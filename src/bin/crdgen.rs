// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResourceExt;
use sidecar_sensor_operator::types::sensor::SidecarSensor;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&SidecarSensor::crd())?);
    Ok(())
}
