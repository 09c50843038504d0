// Copyright 2025 The kmesh Authors
//
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
//

use compact_str::CompactString;
use serde::Serialize;
use std::collections::BTreeMap;

fn is_false(value: &bool) -> bool {
    !value
}

/// TLS settings of a filter chain or an upstream cluster.
///
/// A disabled context still serializes `status`, `type` and `extend_verify` so consumers can
/// branch on `status` alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TlsConfig {
    pub status: bool,
    #[serde(rename = "type")]
    pub tls_type: CompactString,
    #[serde(skip_serializing_if = "CompactString::is_empty")]
    pub server_name: CompactString,
    #[serde(skip_serializing_if = "CompactString::is_empty")]
    pub ca_cert: CompactString,
    #[serde(skip_serializing_if = "CompactString::is_empty")]
    pub cert_chain: CompactString,
    #[serde(skip_serializing_if = "CompactString::is_empty")]
    pub private_key: CompactString,
    #[serde(skip_serializing_if = "is_false")]
    pub verify_client: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub require_sni: bool,
    #[serde(skip_serializing_if = "CompactString::is_empty")]
    pub cipher_suites: CompactString,
    #[serde(skip_serializing_if = "CompactString::is_empty")]
    pub ecdh_curves: CompactString,
    #[serde(skip_serializing_if = "CompactString::is_empty")]
    pub min_version: CompactString,
    #[serde(skip_serializing_if = "CompactString::is_empty")]
    pub max_version: CompactString,
    #[serde(rename = "alpn", skip_serializing_if = "CompactString::is_empty")]
    pub alpn_protocols: CompactString,
    pub extend_verify: Option<BTreeMap<CompactString, CompactString>>,
}

impl TlsConfig {
    pub fn disabled() -> Self {
        Self::default()
    }
}

#[cfg(feature = "envoy-conversions")]
mod envoy_conversions {
    use super::TlsConfig;
    use crate::config::{common::*, core::envoy_conversions::data_source_to_string};
    use compact_str::CompactString;
    use mosn_data_plane_api::envoy_v2_api::envoy::api::v2::auth::{
        tls_parameters::TlsProtocol, CertificateValidationContext as EnvoyValidationContext,
        CommonTlsContext as EnvoyCommonTlsContext, DownstreamTlsContext as EnvoyDownstreamTlsContext,
        TlsCertificate as EnvoyTlsCertificate, TlsParameters as EnvoyTlsParameters,
        UpstreamTlsContext as EnvoyUpstreamTlsContext,
    };
    use tracing::warn;

    fn protocol_name(protocol: TlsProtocol) -> CompactString {
        match protocol {
            TlsProtocol::TlsAuto => CompactString::default(),
            other => other.as_str_name().into(),
        }
    }

    impl TryFrom<EnvoyCommonTlsContext> for TlsConfig {
        type Error = GenericError;
        fn try_from(envoy: EnvoyCommonTlsContext) -> Result<Self, Self::Error> {
            let EnvoyCommonTlsContext {
                tls_params,
                tls_certificates,
                tls_certificate_sds_secret_configs,
                validation_context,
                validation_context_sds_secret_config,
                alpn_protocols,
            } = envoy;
            unsupported_field!(tls_certificate_sds_secret_configs, validation_context_sds_secret_config)?;
            let mut config = TlsConfig { status: true, alpn_protocols: alpn_protocols.join(",").into(), ..Default::default() };

            if let Some(params) = tls_params {
                config.min_version = protocol_name(params.tls_minimum_protocol_version());
                config.max_version = protocol_name(params.tls_maximum_protocol_version());
                let EnvoyTlsParameters { cipher_suites, ecdh_curves, .. } = params;
                config.cipher_suites = cipher_suites.join(":").into();
                config.ecdh_curves = ecdh_curves.join(":").into();
            }

            let mut certificates = tls_certificates.into_iter();
            if let Some(EnvoyTlsCertificate { certificate_chain, private_key, password }) = certificates.next() {
                (|| -> Result<_, GenericError> {
                    unsupported_field!(password)?;
                    config.cert_chain = certificate_chain
                        .map(data_source_to_string)
                        .transpose()
                        .with_node("certificate_chain")?
                        .unwrap_or_default();
                    config.private_key =
                        private_key.map(data_source_to_string).transpose().with_node("private_key")?.unwrap_or_default();
                    Ok(())
                })()
                .with_index(0)
                .with_node("tls_certificates")?;
            }
            if certificates.next().is_some() {
                warn!("only the first of the configured tls_certificates is used");
            }

            if let Some(EnvoyValidationContext {
                trusted_ca,
                verify_certificate_hash,
                verify_subject_alt_name,
                allow_expired_certificate,
            }) = validation_context
            {
                (|| -> Result<_, GenericError> {
                    unsupported_field!(verify_certificate_hash, verify_subject_alt_name, allow_expired_certificate)?;
                    config.ca_cert =
                        trusted_ca.map(data_source_to_string).transpose().with_node("trusted_ca")?.unwrap_or_default();
                    Ok(())
                })()
                .with_node("validation_context")?;
            }
            Ok(config)
        }
    }

    impl TryFrom<EnvoyDownstreamTlsContext> for TlsConfig {
        type Error = GenericError;
        fn try_from(envoy: EnvoyDownstreamTlsContext) -> Result<Self, Self::Error> {
            let EnvoyDownstreamTlsContext { common_tls_context, require_client_certificate, require_sni } = envoy;
            let mut config: TlsConfig = convert_opt!(common_tls_context)?;
            config.verify_client = require_client_certificate.unwrap_or_default();
            config.require_sni = require_sni.unwrap_or_default();
            Ok(config)
        }
    }

    impl TryFrom<EnvoyUpstreamTlsContext> for TlsConfig {
        type Error = GenericError;
        fn try_from(envoy: EnvoyUpstreamTlsContext) -> Result<Self, Self::Error> {
            let EnvoyUpstreamTlsContext { common_tls_context, sni, allow_renegotiation } = envoy;
            unsupported_field!(allow_renegotiation)?;
            let mut config = match common_tls_context {
                Some(common) => TlsConfig::try_from(common).with_node("common_tls_context")?,
                None => TlsConfig { status: true, ..Default::default() },
            };
            config.server_name = sni.into();
            Ok(config)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use mosn_data_plane_api::decode::from_yaml_str;

        #[test]
        fn disabled_context_shape() {
            assert_eq!(
                serde_json::to_string(&TlsConfig::disabled()).unwrap(),
                r#"{"status":false,"type":"","extend_verify":null}"#
            );
        }

        #[test]
        fn downstream_context() {
            let envoy: EnvoyDownstreamTlsContext = from_yaml_str(
                r#"
common_tls_context:
  alpn_protocols: [h2, http/1.1]
  tls_params:
    tls_minimum_protocol_version: TLSv1_2
    cipher_suites: [ECDHE-RSA-AES128-GCM-SHA256, ECDHE-RSA-AES256-GCM-SHA384]
  tls_certificates:
  - certificate_chain: {filename: /etc/certs/cert-chain.pem}
    private_key: {filename: /etc/certs/key.pem}
  validation_context:
    trusted_ca: {inline_string: "-----BEGIN CERTIFICATE-----"}
require_client_certificate: true
"#,
            )
            .unwrap();
            let config = TlsConfig::try_from(envoy).unwrap();
            assert!(config.status && config.verify_client && !config.require_sni);
            assert_eq!(config.cert_chain, "/etc/certs/cert-chain.pem");
            assert_eq!(config.private_key, "/etc/certs/key.pem");
            assert_eq!(config.ca_cert, "-----BEGIN CERTIFICATE-----");
            assert_eq!(config.alpn_protocols, "h2,http/1.1");
            assert_eq!(config.min_version, "TLSv1_2");
            assert_eq!(config.max_version, "");
            assert_eq!(config.cipher_suites, "ECDHE-RSA-AES128-GCM-SHA256:ECDHE-RSA-AES256-GCM-SHA384");
        }

        #[test]
        fn downstream_client_certificate_and_sni() {
            let envoy: EnvoyDownstreamTlsContext = from_yaml_str(
                r#"
common_tls_context:
  tls_certificates:
  - certificate_chain: {filename: /etc/certs/cert-chain.pem}
    private_key: {filename: /etc/certs/key.pem}
require_client_certificate: true
require_sni: true
"#,
            )
            .unwrap();
            let config = TlsConfig::try_from(envoy).unwrap();
            assert!(config.status && config.verify_client && config.require_sni);
            let value = serde_json::to_value(&config).unwrap();
            assert_eq!(value["verify_client"], true);
            assert_eq!(value["require_sni"], true);

            let envoy: EnvoyDownstreamTlsContext = from_yaml_str("require_sni: true").unwrap();
            assert!(matches!(TlsConfig::try_from(envoy).unwrap_err(), GenericError::MissingField("common_tls_context")));
        }

        #[test]
        fn sds_is_rejected() {
            let envoy: EnvoyDownstreamTlsContext = from_yaml_str(
                "common_tls_context:\n  tls_certificate_sds_secret_configs:\n  - name: default\n",
            )
            .unwrap();
            let err = TlsConfig::try_from(envoy).unwrap_err();
            assert_eq!(
                err.to_string(),
                "common_tls_context: field \"tls_certificate_sds_secret_configs\" is not supported"
            );
        }

        #[test]
        fn upstream_sni() {
            let envoy: EnvoyUpstreamTlsContext = from_yaml_str("sni: foo.example.com").unwrap();
            let config = TlsConfig::try_from(envoy).unwrap();
            assert!(config.status);
            assert_eq!(config.server_name, "foo.example.com");
        }
    }
}
