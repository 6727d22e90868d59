// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("failed to reconcile {step}: {source}")]
    StepFailed {
        step: &'static str,
        #[source]
        source: Box<SensorError>,
    },

    #[error("failed to {action} {kind} {name}: {source}")]
    ObjectWriteFailed {
        action: &'static str,
        kind: &'static str,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("CA bundle not present in injector TLS Secret")]
    MissingCaBundle,

    #[error("Certificate generation failed: {0}")]
    CertificateError(String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("Unsupported registry operation: {0}")]
    Unsupported(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl SensorError {
    /// Wrap an error with the description of the step that produced it
    pub fn step(step: &'static str, source: SensorError) -> Self {
        SensorError::StepFailed {
            step,
            source: Box::new(source),
        }
    }
}

/// True when the error is a kube API response with the given HTTP code
pub fn is_api_code(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == code)
}

pub type Result<T> = std::result::Result<T, SensorError>;
