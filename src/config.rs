// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{Result, SensorError};
use kube::Client;
use std::env;
use std::time::Duration;
use tracing::info;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Version string stamped once into `status.version`
    pub operator_version: String,
    /// Sidecar image provided by the operator deployment (RELATED_IMAGE_SIDECAR_SENSOR)
    pub related_image: Option<String>,
    /// Requeue delay applied by the error policy
    pub error_requeue: Duration,
    /// Explicit requeue while an image stream is not ready; `None` relies on the watch
    pub image_stream_requeue: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            operator_version: env!("CARGO_PKG_VERSION").to_string(),
            related_image: None,
            error_requeue: Duration::from_secs(30),
            image_stream_requeue: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let operator_version = env::var("OPERATOR_VERSION")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.operator_version);
        let related_image = env::var("RELATED_IMAGE_SIDECAR_SENSOR")
            .ok()
            .filter(|v| !v.is_empty());
        let error_requeue = match env::var("ERROR_REQUEUE_SECS") {
            Ok(v) => Duration::from_secs(parse_secs("ERROR_REQUEUE_SECS", &v)?),
            Err(_) => defaults.error_requeue,
        };
        let image_stream_requeue = match env::var("IMAGE_STREAM_REQUEUE_SECS") {
            Ok(v) => Some(Duration::from_secs(parse_secs("IMAGE_STREAM_REQUEUE_SECS", &v)?)),
            Err(_) => None,
        };

        Ok(Config {
            operator_version,
            related_image,
            error_requeue,
            image_stream_requeue,
        })
    }
}

fn parse_secs(var: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| SensorError::ConfigError(format!("{} must be a number of seconds: {}", var, e)))
}

/// Facts about the target cluster discovered once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterInfo {
    pub major: u32,
    pub minor: u32,
}

impl Default for ClusterInfo {
    fn default() -> Self {
        Self { major: 1, minor: 30 }
    }
}

impl ClusterInfo {
    /// Query the API server version
    pub async fn discover(client: &Client) -> Result<Self> {
        let info = client.apiserver_version().await?;
        let parsed = Self::parse(&info.major, &info.minor)?;
        info!("Kubernetes API server version {}.{}", parsed.major, parsed.minor);
        Ok(parsed)
    }

    /// Parse major/minor strings, tolerating provider suffixes such as "27+"
    pub fn parse(major: &str, minor: &str) -> Result<Self> {
        let number = |s: &str| -> Result<u32> {
            let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().map_err(|_| {
                SensorError::ConfigError(format!("unexpected Kubernetes version component '{}'", s))
            })
        };
        Ok(Self {
            major: number(major)?,
            minor: number(minor)?,
        })
    }

    /// Admission review versions the webhook should advertise
    pub fn admission_review_versions(&self) -> Vec<String> {
        if self.major == 1 && self.minor < 22 {
            vec!["v1".to_string(), "v1beta1".to_string()]
        } else {
            vec!["v1".to_string()]
        }
    }
}
