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
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::collections::BTreeMap;

/// The metadata namespace the mosn load balancer reads subset keys from.
pub const MOSN_LB_METADATA_KEY: &str = "mosn.lb";

/// Flat string metadata scoped to the load balancer.
///
/// Always serializes as `{"filter_metadata":{"mosn.lb": ...}}`, with `null` when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata(pub BTreeMap<CompactString, CompactString>);

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(CompactString::as_str)
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Namespaced<'a>(&'a Metadata);
        impl Serialize for Namespaced<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(1))?;
                let values = if self.0.is_empty() { None } else { Some(&self.0 .0) };
                map.serialize_entry(MOSN_LB_METADATA_KEY, &values)?;
                map.end()
            }
        }
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("filter_metadata", &Namespaced(self))?;
        map.end()
    }
}

#[cfg(feature = "envoy-conversions")]
pub(crate) mod envoy_conversions {
    use super::{Metadata, MOSN_LB_METADATA_KEY};
    use crate::config::common::*;
    use compact_str::CompactString;
    use mosn_data_plane_api::envoy_v2_api::{
        envoy::api::v2::core::{
            address::Address as EnvoyAddressKind, data_source::Specifier, socket_address::PortSpecifier,
            Address as EnvoyAddress, DataSource as EnvoyDataSource, Metadata as EnvoyMetadata,
            SocketAddress as EnvoySocketAddress,
        },
        google::protobuf::{value::Kind, Duration as EnvoyDuration},
    };
    use std::time::Duration;
    use tracing::warn;

    /// The namespace control planes put load balancer subset keys under.
    const ENVOY_LB_METADATA_KEY: &str = "envoy.lb";

    impl From<EnvoyMetadata> for Metadata {
        fn from(envoy: EnvoyMetadata) -> Self {
            let EnvoyMetadata { mut filter_metadata } = envoy;
            let Some(lb) =
                filter_metadata.remove(ENVOY_LB_METADATA_KEY).or_else(|| filter_metadata.remove(MOSN_LB_METADATA_KEY))
            else {
                return Self::default();
            };
            let values = lb
                .fields
                .into_iter()
                .filter_map(|(key, value)| {
                    let value: CompactString = match value.kind? {
                        Kind::StringValue(s) => s.into(),
                        other => match crate::config::opaque::JsonConverter::value_to_json(
                            &prost_types::Value { kind: Some(other) },
                        ) {
                            Ok(json) => json.to_string().into(),
                            Err(e) => {
                                warn!("dropping metadata value for \"{key}\": {e}");
                                return None;
                            },
                        },
                    };
                    Some((key.into(), value))
                })
                .collect();
            Self(values)
        }
    }

    pub fn convert_metadata(envoy: Option<EnvoyMetadata>) -> Metadata {
        envoy.map(Metadata::from).unwrap_or_default()
    }

    pub fn socket_address_to_string(envoy: EnvoySocketAddress) -> Result<CompactString, GenericError> {
        let EnvoySocketAddress { protocol: _, address, resolver_name, ipv4_compat: _, port_specifier } = envoy;
        unsupported_field!(resolver_name)?;
        let address = required!(address)?;
        let port = match required!(port_specifier)? {
            PortSpecifier::PortValue(port) => port.to_string(),
            PortSpecifier::NamedPort(name) => name,
        };
        Ok(if address.contains(':') {
            compact_str::format_compact!("[{address}]:{port}")
        } else {
            compact_str::format_compact!("{address}:{port}")
        })
    }

    /// `"ip:port"` for sockets, `"ip:name"` for named ports, the path for pipes.
    pub fn address_to_string(envoy: EnvoyAddress) -> Result<CompactString, GenericError> {
        match envoy.address {
            Some(EnvoyAddressKind::SocketAddress(socket)) => socket_address_to_string(socket).with_node("socket_address"),
            Some(EnvoyAddressKind::Pipe(pipe)) => {
                let path = pipe.path;
                required!(path).map(CompactString::from).with_node("pipe")
            },
            None => Err(GenericError::MissingField("address")),
        }
    }

    pub fn data_source_to_string(envoy: EnvoyDataSource) -> Result<CompactString, GenericError> {
        match envoy.specifier {
            Some(Specifier::Filename(filename)) => Ok(filename.into()),
            Some(Specifier::InlineString(inline)) => Ok(inline.into()),
            Some(Specifier::InlineBytes(bytes)) => String::from_utf8(bytes)
                .map(CompactString::from)
                .map_err(|e| GenericError::from_msg_with_cause("inline_bytes is not valid utf-8", e)),
            None => Err(GenericError::MissingField("specifier")),
        }
    }

    /// Proto durations may be negative; the runtime only understands non-negative ones.
    #[allow(clippy::cast_sign_loss)]
    pub fn convert_duration(envoy: EnvoyDuration) -> Duration {
        if envoy.seconds < 0 || envoy.nanos < 0 {
            warn!("negative duration {}s {}ns clamped to zero", envoy.seconds, envoy.nanos);
            return Duration::ZERO;
        }
        Duration::new(envoy.seconds as u64, envoy.nanos as u32)
    }

    pub fn convert_opt_duration(envoy: Option<EnvoyDuration>) -> Duration {
        envoy.map(convert_duration).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_metadata_serializes_null_namespace() {
        assert_eq!(
            serde_json::to_string(&Metadata::default()).unwrap(),
            r#"{"filter_metadata":{"mosn.lb":null}}"#
        );
        let md = Metadata(BTreeMap::from([("version".into(), "v1".into()), ("stage".into(), "pre".into())]));
        assert_eq!(serde_json::to_string(&md).unwrap(), r#"{"filter_metadata":{"mosn.lb":{"stage":"pre","version":"v1"}}}"#);
    }

    #[cfg(feature = "envoy-conversions")]
    mod envoy {
        use super::super::{envoy_conversions::*, Metadata};
        use mosn_data_plane_api::{decode::from_yaml_str, envoy_v2_api::envoy::api::v2::core::Address as EnvoyAddress};
        use std::time::Duration;

        #[test]
        fn addresses() {
            let socket: EnvoyAddress =
                from_yaml_str("socket_address: {protocol: TCP, address: 0.0.0.0, port_value: 80}").unwrap();
            assert_eq!(address_to_string(socket).unwrap(), "0.0.0.0:80");
            let named: EnvoyAddress = from_yaml_str("socket_address: {address: 10.0.0.1, named_port: http}").unwrap();
            assert_eq!(address_to_string(named).unwrap(), "10.0.0.1:http");
            let v6: EnvoyAddress = from_yaml_str("socket_address: {address: '::1', port_value: 8080}").unwrap();
            assert_eq!(address_to_string(v6).unwrap(), "[::1]:8080");
            let pipe: EnvoyAddress = from_yaml_str("pipe: {path: /tmp/mosn.sock}").unwrap();
            assert_eq!(address_to_string(pipe).unwrap(), "/tmp/mosn.sock");
            assert!(address_to_string(EnvoyAddress::default()).is_err());
            let no_port: EnvoyAddress = from_yaml_str("socket_address: {address: 10.0.0.1}").unwrap();
            assert_eq!(address_to_string(no_port).unwrap_err().to_string(), "socket_address: field \"port_specifier\" is required");
        }

        #[test]
        fn metadata_prefers_envoy_lb() {
            let md: mosn_data_plane_api::envoy_v2_api::envoy::api::v2::core::Metadata = from_yaml_str(
                r#"
filter_metadata:
  envoy.lb: {version: v1, canary: true, weight: 3}
  mosn.lb: {version: ignored}
  istio: {config: x}
"#,
            )
            .unwrap();
            let md = Metadata::from(md);
            assert_eq!(md.get("version"), Some("v1"));
            assert_eq!(md.get("canary"), Some("true"));
            assert_eq!(md.get("weight"), Some("3"));
            assert_eq!(md.0.len(), 3);
            assert!(convert_metadata(None).is_empty());
        }

        #[test]
        fn durations_clamp_negative() {
            use mosn_data_plane_api::envoy_v2_api::google::protobuf::Duration as EnvoyDuration;
            assert_eq!(convert_duration(EnvoyDuration { seconds: 1, nanos: 500_000_000 }), Duration::from_millis(1500));
            assert_eq!(convert_duration(EnvoyDuration { seconds: -2, nanos: 0 }), Duration::ZERO);
            assert_eq!(convert_opt_duration(None), Duration::ZERO);
        }
    }
}
