// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Self-signed CA and serving certificate for the injector webhook

use crate::error::{Result, SensorError};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};

/// PEM material for a TLS secret
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub ca_cert_pem: String,
    pub cert_pem: String,
    pub key_pem: String,
}

fn cert_error(what: &str) -> impl Fn(rcgen::Error) -> SensorError + '_ {
    move |e| SensorError::CertificateError(format!("failed to {}: {}", what, e))
}

/// DNS names a Service is reachable under from inside the cluster
pub fn service_dns_names(service: &str, namespace: &str) -> Vec<String> {
    vec![
        service.to_string(),
        format!("{}.{}", service, namespace),
        format!("{}.{}.svc", service, namespace),
        format!("{}.{}.svc.cluster.local", service, namespace),
    ]
}

/// Issue a fresh CA and a server certificate for `dns_names` signed by it
pub fn generate(common_name: &str, dns_names: Vec<String>) -> Result<TlsMaterial> {
    let mut ca_params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(
        DnType::CommonName,
        DnValue::Utf8String(format!("{} CA", common_name)),
    );
    ca_params.distinguished_name = dn;
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];

    let ca_key = KeyPair::generate().map_err(cert_error("generate CA key"))?;
    let ca_cert = ca_params
        .self_signed(&ca_key)
        .map_err(cert_error("create CA certificate"))?;
    let issuer = Issuer::new(ca_params, ca_key);

    let mut params = CertificateParams::new(dns_names).map_err(cert_error("build server certificate"))?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(common_name.to_string()));
    params.distinguished_name = dn;
    params.is_ca = IsCa::NoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![rcgen::ExtendedKeyUsagePurpose::ServerAuth];

    let key = KeyPair::generate().map_err(cert_error("generate server key"))?;
    let cert = params
        .signed_by(&key, &issuer)
        .map_err(cert_error("sign server certificate"))?;

    Ok(TlsMaterial {
        ca_cert_pem: ca_cert.pem(),
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
    })
}
