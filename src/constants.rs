// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// The operator name used as field manager and `managed-by` label value
pub const OPERATOR_NAME: &str = "sidecar-sensor-operator";

/// API group of the SidecarSensor custom resource
pub const API_GROUP: &str = "sensor.dev";

/// Namespace the injector is installed into when the resource does not name one
pub const DEFAULT_INSTALL_NAMESPACE: &str = "sidecar-sensor";

/// Default tag for registry-derived sensor images
pub const DEFAULT_SENSOR_VERSION: &str = "latest";

/// Default repository for registry-derived sensor images
pub const DEFAULT_IMAGE_REPOSITORY: &str = "registry.sensor.dev/sidecar-sensor";

/// How long to wait before looking for a Ready injector pod again
pub const INJECTOR_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Standard label keys and fixed values stamped on every subordinate object
pub mod labels {
    pub const INSTANCE_NAME: &str = "app.kubernetes.io/name";
    pub const INSTANCE_KEY: &str = "app.kubernetes.io/instance";
    pub const COMPONENT: &str = "app.kubernetes.io/component";
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
    pub const PROVIDER: &str = "sensor.dev/provider";
    pub const PART_OF: &str = "app.kubernetes.io/part-of";
    pub const CREATED_BY: &str = "app.kubernetes.io/created-by";

    pub const INSTANCE_NAME_VALUE: &str = "sidecar-sensor";
    pub const PROVIDER_VALUE: &str = "sensor.dev";
    pub const PART_OF_VALUE: &str = "sensor";

    /// Namespace label that opts a namespace out of sidecar injection
    pub const INJECTION: &str = "sensor.dev/injection";
    pub const INJECTION_DISABLED: &str = "disabled";
}

/// Component label values
pub mod components {
    pub const INJECTOR: &str = "injector";
    pub const REGISTRY: &str = "registry";
    pub const INSTALL: &str = "install";
}

/// Keys inside generated Secrets and ConfigMaps
pub mod keys {
    pub const CA_BUNDLE: &str = "ca.crt";
    pub const TLS_CERT: &str = "tls.crt";
    pub const TLS_KEY: &str = "tls.key";
    pub const REGISTRY_CA_BUNDLE: &str = "tls-ca-bundle.pem";
    pub const DOCKER_CONFIG_JSON: &str = ".dockerconfigjson";
}

/// Condition types and reasons written to the SidecarSensor status
pub mod conditions {
    pub const PENDING: &str = "Pending";
    pub const SUCCESS: &str = "Success";
    pub const FAILED: &str = "Failed";

    pub const REASON_REQ_NOT_MET: &str = "ReqNotMet";
    pub const REASON_INSTALL_SUCCEEDED: &str = "InstallSucceeded";
    pub const REASON_CREATED: &str = "Created";
    pub const REASON_UPDATED: &str = "Updated";
    pub const REASON_DELETED: &str = "Deleted";
    pub const REASON_PRESENT: &str = "Present";
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
