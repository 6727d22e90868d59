// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes plumbing: CRD discovery, the managed object kinds, their
//! create/update/delete lifecycle, and the injector readiness gate.

pub mod crd;
pub mod kinds;
pub mod lifecycle;
pub mod pods;
pub mod step;

pub use crd::wait_for_sensor_crd;
