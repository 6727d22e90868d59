// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! SidecarSensor reconciler - converges the injector installation described by a
//! SidecarSensor and reports progress through its status conditions.
//!
//! One invocation walks the steps in dependency order and stops at the first
//! failure, the first unmet precondition, or the end. Every step re-reads the
//! cluster before writing, so a replay after a partial run picks up where the
//! previous one stopped. Cancellation (resource deletion, shutdown) drops the
//! reconcile future at its next await point.

use crate::config::{ClusterInfo, Config};
use crate::constants::conditions::{FAILED, REASON_INSTALL_SUCCEEDED, SUCCESS};
use crate::constants::{labels, INJECTOR_POLL_INTERVAL, OPERATOR_NAME};
use crate::error::{Result, SensorError};
use crate::kubernetes::{lifecycle, pods, step};
use crate::registry::{ClusterRegistry, ImageRegistry};
use crate::resources::{self, injector, rbac, secrets, webhook};
use crate::status::{ConditionStatus, StatusWriter};
use crate::types::sensor::{RegistryType, SidecarSensor};
use futures::StreamExt;
use k8s_openapi::api::admissionregistration::v1::MutatingWebhookConfiguration;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use kube::{
    runtime::{controller::Action, reflector::ObjectRef, Controller},
    Api, Client, Resource, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Shared state handed to every reconcile
pub struct Context {
    pub client: Client,
    pub config: Config,
    pub cluster: ClusterInfo,
    pub registry: Arc<dyn ImageRegistry>,
}

/// What the trigger framework should do once a reconcile returns without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing more to do until the next watch event
    Continue,
    /// Run again after the delay
    RequeueAfter(Duration),
}

impl From<Outcome> for Action {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Continue => Action::await_change(),
            Outcome::RequeueAfter(delay) => Action::requeue(delay),
        }
    }
}

/// The fatal steps of a reconcile, used to label the Failed condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Namespace,
    EcrRepository,
    ImageStream,
    RegistryCaBundle,
    ImageMirror,
    RegistryAccess,
    PullSecret,
    ImageTag,
    ServiceAccount,
    ClusterRoleBinding,
    TlsSecret,
    CaBundle,
    InjectorConfig,
    Deployment,
    Service,
    InjectorReadiness,
    Webhook,
}

impl Step {
    fn description(&self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::EcrRepository => "ECR repository",
            Self::ImageStream => "image stream",
            Self::RegistryCaBundle => "registry CA bundle ConfigMap",
            Self::ImageMirror => "mirrored sensor image",
            Self::RegistryAccess => "registry access",
            Self::PullSecret => "registry pull Secret",
            Self::ImageTag => "sensor image",
            Self::ServiceAccount => "injector ServiceAccount",
            Self::ClusterRoleBinding => "injector ClusterRoleBinding",
            Self::TlsSecret => "injector TLS Secret",
            Self::CaBundle => "injector CA bundle",
            Self::InjectorConfig => "injector ConfigMap",
            Self::Deployment => "injector Deployment",
            Self::Service => "injector Service",
            Self::InjectorReadiness => "Ready injector pod",
            Self::Webhook => "injector MutatingWebhookConfiguration",
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            Self::Namespace => "NamespaceFailed",
            Self::EcrRepository => "EcrRepositoryFailed",
            Self::ImageStream => "ImageStreamFailed",
            Self::RegistryCaBundle => "RegistryCABundleFailed",
            Self::ImageMirror => "ImageMirrorFailed",
            Self::RegistryAccess => "RegistryAccessFailed",
            Self::PullSecret => "PullSecretFailed",
            Self::ImageTag => "ImageTagFailed",
            Self::ServiceAccount => "ServiceAccountFailed",
            Self::ClusterRoleBinding => "ClusterRoleBindingFailed",
            Self::TlsSecret => "TLSSecretFailed",
            Self::CaBundle => "CABundleMissing",
            Self::InjectorConfig => "ConfigMapFailed",
            Self::Deployment => "DeploymentFailed",
            Self::Service => "ServiceFailed",
            Self::InjectorReadiness => "InjectorReadinessFailed",
            Self::Webhook => "WebhookFailed",
        }
    }
}

type StepResult<T> = std::result::Result<T, (Step, SensorError)>;

trait During<T> {
    fn during(self, step: Step) -> StepResult<T>;
}

impl<T> During<T> for Result<T> {
    fn during(self, step: Step) -> StepResult<T> {
        self.map_err(|e| (step, e))
    }
}

pub struct SidecarSensorReconciler {
    context: Context,
}

impl SidecarSensorReconciler {
    pub fn new(client: Client, config: Config, cluster: ClusterInfo) -> Self {
        let registry = Arc::new(ClusterRegistry::new(client.clone()));
        Self {
            context: Context {
                client,
                config,
                cluster,
                registry,
            },
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let client = self.context.client.clone();
        let sensors: Api<SidecarSensor> = Api::all(client.clone());
        let owned = WatcherConfig::default().labels(&format!("{}={}", labels::MANAGED_BY, OPERATOR_NAME));
        let context = Arc::new(self.context);

        Controller::new(sensors, WatcherConfig::default())
            .watches(Api::<Namespace>::all(client.clone()), owned.clone(), owning_sensor)
            .watches(Api::<Secret>::all(client.clone()), owned.clone(), owning_sensor)
            .watches(Api::<ConfigMap>::all(client.clone()), owned.clone(), owning_sensor)
            .watches(Api::<ServiceAccount>::all(client.clone()), owned.clone(), owning_sensor)
            .watches(Api::<ClusterRoleBinding>::all(client.clone()), owned.clone(), owning_sensor)
            .watches(Api::<Deployment>::all(client.clone()), owned.clone(), owning_sensor)
            .watches(Api::<Service>::all(client.clone()), owned.clone(), owning_sensor)
            .watches(
                Api::<MutatingWebhookConfiguration>::all(client),
                owned,
                owning_sensor,
            )
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled SidecarSensor: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        info!("SidecarSensor controller stopped");
        Ok(())
    }
}

/// Map a subordinate object back to its SidecarSensor through the instance label.
///
/// The SidecarSensor is cluster-scoped while most subordinates are namespaced, so
/// the label is used instead of the owner reference's namespace.
fn owning_sensor<K: Resource>(obj: K) -> Option<ObjectRef<SidecarSensor>> {
    obj.labels()
        .get(labels::INSTANCE_KEY)
        .map(|name| ObjectRef::new(name))
}

async fn reconcile(sensor: Arc<SidecarSensor>, ctx: Arc<Context>) -> Result<Action> {
    reconcile_sensor(&sensor.name_any(), &ctx).await.map(Action::from)
}

fn error_policy(sensor: Arc<SidecarSensor>, error: &SensorError, ctx: Arc<Context>) -> Action {
    error!("Reconciliation of SidecarSensor {} failed: {}", sensor.name_any(), error);
    Action::requeue(ctx.config.error_requeue)
}

/// Reconcile the SidecarSensor called `name`.
///
/// A SidecarSensor that no longer exists is not an error. Any step failure is
/// recorded as a Failed condition before the error is returned; when that status
/// write fails too, its error is returned instead.
#[instrument(skip(ctx))]
pub async fn reconcile_sensor(name: &str, ctx: &Context) -> Result<Outcome> {
    let api: Api<SidecarSensor> = Api::all(ctx.client.clone());
    let Some(sensor) = api.get_opt(name).await? else {
        info!("SidecarSensor {} not found, probably deleted", name);
        return Ok(Outcome::Continue);
    };

    let mut status = StatusWriter::new(api, sensor);
    status.initialize_if_empty().await?;
    status.ensure_version_stamped(&ctx.config.operator_version).await?;

    match converge(ctx, &mut status).await {
        Ok(Some(outcome)) => Ok(outcome),
        Ok(None) => {
            record_success(&mut status).await?;
            info!("SidecarSensor {} installed", name);
            Ok(Outcome::Continue)
        }
        Err((step, err)) => Err(fail(&mut status, step, err).await),
    }
}

/// Run every step in order. `Ok(None)` means all steps completed.
async fn converge(ctx: &Context, status: &mut StatusWriter) -> StepResult<Option<Outcome>> {
    // The spec is fixed for the duration of a reconcile; only the status moves
    let sensor = status.sensor().clone();
    let namespace = sensor.install_namespace();
    let client = &ctx.client;

    step::reconcile_object(&Api::all(client.clone()), resources::namespace(&sensor), status)
        .await
        .during(Step::Namespace)?;

    let mut pull_secret = None;
    let image = match explicit_image(&sensor, &ctx.config) {
        Some(image) => {
            debug!("Using explicit sensor image {}", image);
            image
        }
        None => {
            let mut stream_repository = None;
            match sensor.spec.registry.registry_type {
                RegistryType::Ecr => {
                    ctx.registry
                        .upsert_ecr_repository(&sensor)
                        .await
                        .during(Step::EcrRepository)?;
                }
                RegistryType::Openshift => {
                    let repository = ctx
                        .registry
                        .reconcile_image_stream(&sensor)
                        .await
                        .during(Step::ImageStream)?;
                    let Some(repository) = repository else {
                        return Ok(Some(image_stream_pending(&sensor, &ctx.config)));
                    };
                    stream_repository = Some(repository);
                }
                RegistryType::Generic => {}
            }

            reconcile_registry_ca(client, &sensor, status)
                .await
                .during(Step::RegistryCaBundle)?;

            if sensor.image_mirroring_enabled() {
                ctx.registry.push_image(&sensor).await.during(Step::ImageMirror)?;
            } else {
                let updated = ctx
                    .registry
                    .verify_registry(&sensor)
                    .await
                    .during(Step::RegistryAccess)?;
                if updated {
                    info!("Registry verification updated {}, waiting for the change", sensor.name_any());
                    return Ok(Some(Outcome::Continue));
                }

                let docker_config = ctx.registry.pull_secret(&sensor).await.during(Step::PullSecret)?;
                if let Some(docker_config) = docker_config {
                    let secret = step::reconcile_object(
                        &Api::namespaced(client.clone(), &namespace),
                        secrets::pull_secret(&sensor, docker_config),
                        status,
                    )
                    .await
                    .during(Step::PullSecret)?;
                    pull_secret = Some(secret.name_any());
                }
            }

            match stream_repository {
                Some(repository) => format!("{}:{}", repository, sensor.sensor_version()),
                None => ctx.registry.image_uri(&sensor).await.during(Step::ImageTag)?,
            }
        }
    };
    status.set_sensor_image(&image).await.during(Step::ImageTag)?;

    let pull_secret = pull_secret.as_deref();
    step::reconcile_object(
        &Api::namespaced(client.clone(), &namespace),
        rbac::service_account(&sensor, pull_secret),
        status,
    )
    .await
    .during(Step::ServiceAccount)?;
    step::reconcile_object(&Api::all(client.clone()), rbac::cluster_role_binding(&sensor), status)
        .await
        .during(Step::ClusterRoleBinding)?;

    let tls_secret = step::ensure_object(
        &Api::namespaced(client.clone(), &namespace),
        &sensor.injector_tls_secret_name(),
        || secrets::injector_tls_secret(&sensor),
        status,
    )
    .await
    .during(Step::TlsSecret)?;
    let ca_bundle = secrets::ca_bundle(&tls_secret)
        .ok_or(SensorError::MissingCaBundle)
        .during(Step::CaBundle)?;

    step::reconcile_object(
        &Api::namespaced(client.clone(), &namespace),
        injector::config_map(&sensor, &image, pull_secret),
        status,
    )
    .await
    .during(Step::InjectorConfig)?;
    step::reconcile_object(
        &Api::namespaced(client.clone(), &namespace),
        injector::deployment(&sensor, &image, pull_secret),
        status,
    )
    .await
    .during(Step::Deployment)?;
    step::reconcile_object(
        &Api::namespaced(client.clone(), &namespace),
        injector::service(&sensor),
        status,
    )
    .await
    .during(Step::Service)?;

    let ready = pods::find_ready_pod(client, &namespace, &sensor.injector_selector())
        .await
        .during(Step::InjectorReadiness)?;
    let Some(pod) = ready else {
        info!(
            "No Ready injector pod for {} yet, checking again in {:?}",
            sensor.name_any(),
            INJECTOR_POLL_INTERVAL
        );
        return Ok(Some(Outcome::RequeueAfter(INJECTOR_POLL_INTERVAL)));
    };
    debug!("Injector pod {} is Ready", pod.name_any());

    step::reconcile_object(
        &Api::all(client.clone()),
        webhook::mutating_webhook(&sensor, &ca_bundle, &ctx.cluster),
        status,
    )
    .await
    .during(Step::Webhook)?;

    Ok(None)
}

fn image_stream_pending(sensor: &SidecarSensor, config: &Config) -> Outcome {
    match config.image_stream_requeue {
        Some(delay) => {
            info!(
                "Image stream for {} is not ready yet, checking again in {:?}",
                sensor.name_any(),
                delay
            );
            Outcome::RequeueAfter(delay)
        }
        None => {
            warn!(
                "Image stream for {} is not ready yet and IMAGE_STREAM_REQUEUE_SECS is unset; \
                 waiting for the next SidecarSensor event",
                sensor.name_any()
            );
            Outcome::Continue
        }
    }
}

/// The image to use without asking any registry, if the configuration pins one
fn explicit_image(sensor: &SidecarSensor, config: &Config) -> Option<String> {
    if let Some(image) = sensor.image_override() {
        return Some(image.to_string());
    }
    if sensor.spec.api.is_none() {
        return config.related_image.clone();
    }
    None
}

/// Publish the registry CA value as a ConfigMap, or remove one left behind once
/// the value is gone
async fn reconcile_registry_ca(client: &Client, sensor: &SidecarSensor, status: &mut StatusWriter) -> Result<()> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), &sensor.install_namespace());
    match sensor.registry_ca_certificate() {
        Some(ca) => {
            step::reconcile_object(&api, secrets::registry_ca_bundle(sensor, ca), status).await?;
        }
        None => {
            let name = sensor.registry_ca_config_map_name();
            if api.get_opt(&name).await?.is_some() {
                lifecycle::delete(&api, &name, status).await?;
            }
        }
    }
    Ok(())
}

async fn record_success(status: &mut StatusWriter) -> Result<()> {
    status
        .set_condition(
            SUCCESS,
            ConditionStatus::True,
            REASON_INSTALL_SUCCEEDED,
            "SidecarSensor installation completed",
        )
        .await?;

    let failed = status
        .sensor()
        .find_condition(FAILED)
        .is_some_and(|c| c.status == ConditionStatus::True);
    if failed {
        status
            .set_condition(
                FAILED,
                ConditionStatus::False,
                REASON_INSTALL_SUCCEEDED,
                "SidecarSensor installation completed",
            )
            .await?;
    }
    Ok(())
}

/// Record the failure on the status and hand back the error to return
async fn fail(status: &mut StatusWriter, step: Step, err: SensorError) -> SensorError {
    let message = format!("failed to reconcile {}: {}", step.description(), err);
    error!("{}", message);

    if let Err(status_err) = status
        .set_condition(FAILED, ConditionStatus::True, step.reason(), message)
        .await
    {
        error!("Failed to record failure on SidecarSensor status: {}", status_err);
        return status_err;
    }
    SensorError::step(step.description(), err)
}
