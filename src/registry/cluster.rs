// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Registry integration backed by the cluster API alone

use crate::constants::{components, keys};
use crate::error::{Result, SensorError};
use crate::registry::ImageRegistry;
use crate::types::sensor::{SecretReference, SidecarSensor};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info, instrument};

pub struct ClusterRegistry {
    client: Client,
}

impl ClusterRegistry {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn image_stream_resource() -> ApiResource {
        ApiResource::from_gvk(&GroupVersionKind::gvk("image.openshift.io", "v1", "ImageStream"))
    }

    fn image_stream_name(sensor: &SidecarSensor) -> String {
        format!("{}-sensor", sensor.name_any())
    }

    /// Read the `.dockerconfigjson` from the referenced source secret
    async fn read_pull_credentials(&self, source: &SecretReference) -> Result<Vec<u8>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &source.namespace);
        let secret = secrets.get(&source.name).await.map_err(|e| {
            SensorError::RegistryError(format!(
                "Failed to get pull credentials secret {}/{}: {}",
                source.namespace, source.name, e
            ))
        })?;

        secret
            .data
            .as_ref()
            .and_then(|d| d.get(keys::DOCKER_CONFIG_JSON))
            .map(|b| b.0.clone())
            .ok_or_else(|| {
                SensorError::RegistryError(format!(
                    "Pull credentials secret {}/{} does not contain '{}' key",
                    source.namespace,
                    source.name,
                    keys::DOCKER_CONFIG_JSON
                ))
            })
    }
}

#[async_trait]
impl ImageRegistry for ClusterRegistry {
    async fn upsert_ecr_repository(&self, _sensor: &SidecarSensor) -> Result<()> {
        Err(SensorError::Unsupported(
            "ECR repository provisioning needs an AWS registry integration".to_string(),
        ))
    }

    #[instrument(skip(self, sensor), fields(sensor = %sensor.name_any()))]
    async fn reconcile_image_stream(&self, sensor: &SidecarSensor) -> Result<Option<String>> {
        let resource = Self::image_stream_resource();
        let namespace = sensor.install_namespace();
        let name = Self::image_stream_name(sensor);
        let streams: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &namespace, &resource);

        let Some(stream) = streams.get_opt(&name).await? else {
            info!("Creating ImageStream {} in namespace {}", name, namespace);
            let mut stream = DynamicObject::new(&name, &resource).within(&namespace);
            stream.metadata.labels = Some(sensor.labels(components::REGISTRY));
            match streams.create(&PostParams::default(), &stream).await {
                Ok(_) => {}
                Err(kube::Error::Api(err)) if err.code == 409 => {
                    debug!("ImageStream {} already exists", name);
                }
                Err(e) => return Err(e.into()),
            }
            return Ok(None);
        };

        Ok(stream
            .data
            .get("status")
            .and_then(|s| s.get("dockerImageRepository"))
            .and_then(|r| r.as_str())
            .filter(|r| !r.is_empty())
            .map(str::to_string))
    }

    async fn verify_registry(&self, sensor: &SidecarSensor) -> Result<bool> {
        if let Some(source) = sensor.spec.registry.pull_credentials.as_ref() {
            self.read_pull_credentials(source).await?;
        }
        Ok(false)
    }

    async fn push_image(&self, _sensor: &SidecarSensor) -> Result<()> {
        Err(SensorError::Unsupported(
            "image mirroring needs a registry push integration".to_string(),
        ))
    }

    async fn pull_secret(&self, sensor: &SidecarSensor) -> Result<Option<Vec<u8>>> {
        match sensor.spec.registry.pull_credentials.as_ref() {
            Some(source) => Ok(Some(self.read_pull_credentials(source).await?)),
            None => Ok(None),
        }
    }

    async fn image_uri(&self, sensor: &SidecarSensor) -> Result<String> {
        Ok(format!("{}:{}", sensor.image_repository(), sensor.sensor_version()))
    }
}
