// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: an in-memory Kubernetes API server behind a real `kube::Client`.
//!
//! Objects are kept as JSON keyed by their item path. Writes honour
//! resourceVersion conflicts and answer 404/409 the way the API server does, so
//! the reconcile code under test runs its real error classification.

use http::{Request, Response};
use kube::client::Body;
use kube::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

const COLLECTIONS: &[&str] = &[
    "namespaces",
    "secrets",
    "configmaps",
    "serviceaccounts",
    "services",
    "pods",
    "deployments",
    "clusterrolebindings",
    "mutatingwebhookconfigurations",
    "sidecarsensors",
    "imagestreams",
];

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Value>,
    next_version: u64,
    failures: Vec<(String, String, u16)>,
    requests: Vec<(String, String)>,
}

impl State {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn stamp_new(&mut self, obj: &mut Value) {
        let version = self.bump();
        let meta = &mut obj["metadata"];
        meta["resourceVersion"] = json!(version);
        meta["uid"] = json!(format!("uid-{}", version));
        if meta.get("generation").is_none() {
            meta["generation"] = json!(1);
        }
        meta["creationTimestamp"] = json!("2026-01-01T00:00:00Z");
    }
}

/// A mock HTTP service that behaves like a minimal Kubernetes API server.
#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<State>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object; its path is derived from apiVersion, kind and metadata
    pub fn with_object(self, obj: &Value) -> Self {
        self.insert(obj);
        self
    }

    /// Answer every `method` request whose path starts with `path_prefix` with `code`
    pub fn fail_on(self, method: &str, path_prefix: &str, code: u16) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((method.to_string(), path_prefix.to_string(), code));
        self
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn insert(&self, obj: &Value) {
        let mut state = self.state.lock().unwrap();
        let mut obj = obj.clone();
        state.stamp_new(&mut obj);
        state.objects.insert(object_path(&obj), obj);
    }

    /// Build a kube Client from this fake
    pub fn client(&self) -> Client {
        Client::new(self.clone(), "default")
    }

    pub fn object(&self, path: &str) -> Option<Value> {
        self.state.lock().unwrap().objects.get(path).cloned()
    }

    pub fn get<K: DeserializeOwned>(&self, path: &str) -> Option<K> {
        self.object(path).map(|v| serde_json::from_value(v).unwrap())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.lock().unwrap().objects.contains_key(path)
    }

    /// All requests seen so far as (method, path)
    pub fn requests(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Number of mutating requests seen so far
    pub fn write_count(&self) -> usize {
        self.requests().iter().filter(|(m, _)| m != "GET").count()
    }

    /// Number of `method` requests against exactly `path`
    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|(m, p)| m == method && p == path)
            .count()
    }

    fn handle(&self, method: &str, path: &str, query: Option<&str>, body: &[u8]) -> (u16, Value) {
        let mut state = self.state.lock().unwrap();
        state.requests.push((method.to_string(), path.to_string()));

        if let Some((_, _, code)) = state
            .failures
            .iter()
            .find(|(m, p, _)| m == method && path.starts_with(p.as_str()))
        {
            return (*code, status_json(*code, &format!("injected failure for {} {}", method, path)));
        }

        let body: Value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(body).unwrap_or(Value::Null)
        };

        match method {
            "GET" => {
                if let Some(obj) = state.objects.get(path) {
                    return (200, obj.clone());
                }
                if !is_collection(path) {
                    return (404, not_found_json(path));
                }
                let selector = label_selector(query);
                let items: Vec<Value> = state
                    .objects
                    .iter()
                    .filter(|(key, _)| key.rsplit_once('/').map(|(parent, _)| parent) == Some(path))
                    .filter(|(_, obj)| matches_labels(obj, &selector))
                    .map(|(_, obj)| obj.clone())
                    .collect();
                let version = state.next_version.to_string();
                (
                    200,
                    json!({
                        "apiVersion": "v1",
                        "kind": "List",
                        "metadata": { "resourceVersion": version },
                        "items": items,
                    }),
                )
            }
            "POST" => {
                let name = body["metadata"]["name"].as_str().unwrap_or_default().to_string();
                let key = format!("{}/{}", path, name);
                if state.objects.contains_key(&key) {
                    return (409, status_json(409, &format!("{} already exists", key)));
                }
                let mut obj = body;
                state.stamp_new(&mut obj);
                state.objects.insert(key, obj.clone());
                (201, obj)
            }
            "PUT" => {
                let Some(stored) = state.objects.get(path).cloned() else {
                    return (404, not_found_json(path));
                };
                let sent = body["metadata"]["resourceVersion"].as_str();
                if sent.is_some() && sent != stored["metadata"]["resourceVersion"].as_str() {
                    return (409, status_json(409, "the object has been modified"));
                }
                let mut obj = body;
                obj["metadata"]["uid"] = stored["metadata"]["uid"].clone();
                obj["metadata"]["resourceVersion"] = json!(state.bump());
                state.objects.insert(path.to_string(), obj.clone());
                (200, obj)
            }
            "PATCH" => {
                let (key, subresource) = match path.strip_suffix("/status") {
                    Some(key) => (key.to_string(), true),
                    None => (path.to_string(), false),
                };
                let Some(mut stored) = state.objects.get(&key).cloned() else {
                    return (404, not_found_json(path));
                };
                if let Some(sent) = body["metadata"]["resourceVersion"].as_str() {
                    if Some(sent) != stored["metadata"]["resourceVersion"].as_str() {
                        return (409, status_json(409, "the object has been modified"));
                    }
                }
                if subresource {
                    merge_patch(&mut stored["status"], &body["status"]);
                } else {
                    let mut patch = body.clone();
                    if let Some(meta) = patch.get_mut("metadata").and_then(Value::as_object_mut) {
                        meta.remove("resourceVersion");
                    }
                    merge_patch(&mut stored, &patch);
                }
                stored["metadata"]["resourceVersion"] = json!(state.bump());
                state.objects.insert(key, stored.clone());
                (200, stored)
            }
            "DELETE" => match state.objects.remove(path) {
                Some(obj) => (200, obj),
                None => (404, not_found_json(path)),
            },
            _ => (405, status_json(405, "method not allowed")),
        }
    }
}

impl Service<Request<Body>> for FakeCluster {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let this = self.clone();
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let query = req.uri().query().map(str::to_string);

        Box::pin(async move {
            let bytes = req
                .into_body()
                .collect_bytes()
                .await
                .map_err(|e| -> tower::BoxError { e.to_string().into() })?;
            let (status, body) = this.handle(&method, &path, query.as_deref(), &bytes);
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string().into_bytes()))
                .unwrap())
        })
    }
}

fn is_collection(path: &str) -> bool {
    path.rsplit('/').next().is_some_and(|last| COLLECTIONS.contains(&last))
}

fn label_selector(query: Option<&str>) -> Vec<(String, String)> {
    let Some(query) = query else {
        return Vec::new();
    };
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "labelSelector")
        .map(|(_, v)| {
            v.split(',')
                .filter_map(|pair| pair.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn matches_labels(obj: &Value, selector: &[(String, String)]) -> bool {
    selector
        .iter()
        .all(|(k, v)| obj["metadata"]["labels"][k].as_str() == Some(v.as_str()))
}

fn merge_patch(target: &mut Value, patch: &Value) {
    let Some(entries) = patch.as_object() else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = json!({});
    }
    if let Some(map) = target.as_object_mut() {
        for (k, v) in entries {
            if v.is_null() {
                map.remove(k);
            } else {
                merge_patch(map.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
    }
}

/// The item path of an object, e.g. `/apis/apps/v1/namespaces/ns/deployments/name`
pub fn object_path(obj: &Value) -> String {
    let api_version = obj["apiVersion"].as_str().unwrap_or("v1");
    let base = if api_version.contains('/') {
        format!("/apis/{}", api_version)
    } else {
        format!("/api/{}", api_version)
    };
    let plural = format!("{}s", obj["kind"].as_str().unwrap_or_default().to_lowercase());
    let name = obj["metadata"]["name"].as_str().unwrap_or_default();
    match obj["metadata"]["namespace"].as_str() {
        Some(ns) => format!("{}/namespaces/{}/{}/{}", base, ns, plural, name),
        None => format!("{}/{}/{}", base, plural, name),
    }
}

fn status_json(code: u16, message: &str) -> Value {
    let reason = match code {
        404 => "NotFound",
        409 => "AlreadyExists",
        500 => "InternalError",
        _ => "Unknown",
    };
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
}

/// Create a 404 not found response
pub fn not_found_json(path: &str) -> Value {
    status_json(404, &format!("{} not found", path))
}

pub const SENSOR_PATH_PREFIX: &str = "/apis/sensor.dev/v1alpha1/sidecarsensors";

pub fn sensor_path(name: &str) -> String {
    format!("{}/{}", SENSOR_PATH_PREFIX, name)
}

/// A SidecarSensor with the given spec and no status
pub fn sensor_json(name: &str, spec: Value) -> Value {
    json!({
        "apiVersion": "sensor.dev/v1alpha1",
        "kind": "SidecarSensor",
        "metadata": { "name": name },
        "spec": spec,
    })
}

pub fn pod_json(namespace: &str, name: &str, labels: &[(&str, &str)], ready: bool) -> Value {
    let labels: serde_json::Map<String, Value> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": { "name": name, "namespace": namespace, "labels": labels },
        "status": {
            "conditions": [{ "type": "Ready", "status": if ready { "True" } else { "False" } }]
        }
    })
}

pub fn secret_json(namespace: &str, name: &str, data: &[(&str, &str)]) -> Value {
    use base64::Engine;
    let data: serde_json::Map<String, Value> = data
        .iter()
        .map(|(k, v)| {
            (
                k.to_string(),
                json!(base64::engine::general_purpose::STANDARD.encode(v)),
            )
        })
        .collect();
    json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": { "name": name, "namespace": namespace },
        "data": data,
    })
}
