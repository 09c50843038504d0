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

pub use prost_reflect::ReflectMessage;

use prost_reflect::{DeserializeOptions, DynamicMessage};
use serde::{de::Error as _, Deserializer};
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to decode {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Deserializes any xDS message from its proto-JSON form, reporting the path of the offending
/// field on failure (e.g. `listeners[0].filter_chains[1].filters[0].name`).
///
/// The input is read into a `DynamicMessage` of the message descriptor and then transcoded, so
/// well known types, enum names and `Any` payloads follow the protobuf JSON mapping. Setting two
/// members of one oneof is an error. Fields the descriptor does not know are skipped.
pub fn from_serde_deserializer<'de, T, D>(deserializer: D) -> Result<T, serde_path_to_error::Error<D::Error>>
where
    T: ReflectMessage + Default,
    D: Deserializer<'de>,
{
    let options = DeserializeOptions::new().deny_unknown_fields(false);
    let mut track = serde_path_to_error::Track::new();
    let dynamic = DynamicMessage::deserialize_with_options(
        T::default().descriptor(),
        serde_path_to_error::Deserializer::new(deserializer, &mut track),
        &options,
    );
    match dynamic {
        Ok(dynamic) => dynamic.transcode_to::<T>().map_err(|e| serde_path_to_error::Error::new(track.path(), D::Error::custom(e))),
        Err(e) => Err(serde_path_to_error::Error::new(track.path(), e)),
    }
}

/// `deserialize_with` adapter for message typed fields of serde structs.
pub fn message<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: ReflectMessage + Default,
    D: Deserializer<'de>,
{
    let options = DeserializeOptions::new().deny_unknown_fields(false);
    DynamicMessage::deserialize_with_options(T::default().descriptor(), deserializer, &options)?
        .transcode_to::<T>()
        .map_err(D::Error::custom)
}

pub fn from_yaml_str<T: ReflectMessage + Default>(yaml: &str) -> Result<T, DecodeError> {
    from_serde_deserializer(serde_yaml::Deserializer::from_str(yaml))
        .map_err(|e| DecodeError::Yaml { path: e.path().to_string(), source: e.into_inner() })
}

pub fn from_yaml_reader<T: ReflectMessage + Default, R: Read>(rdr: R) -> Result<T, DecodeError> {
    from_serde_deserializer(serde_yaml::Deserializer::from_reader(rdr))
        .map_err(|e| DecodeError::Yaml { path: e.path().to_string(), source: e.into_inner() })
}

pub fn from_json_str<T: ReflectMessage + Default>(json: &str) -> Result<T, DecodeError> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    from_serde_deserializer(&mut deserializer)
        .map_err(|e| DecodeError::Json { path: e.path().to_string(), source: e.into_inner() })
}

pub fn from_json_value<T: ReflectMessage + Default>(value: serde_json::Value) -> Result<T, DecodeError> {
    from_serde_deserializer(value).map_err(|e| DecodeError::Json { path: e.path().to_string(), source: e.into_inner() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use envoy_v2_api::envoy::{
        api::v2::{
            core::{Address, ConfigSource, DataSource, SocketAddress},
            listener::{Filter, ListenerFilter},
            route::{HeaderMatcher, RedirectAction, Route, RouteAction, RouteMatch},
            Listener,
        },
        config::filter::{
            accesslog::v2::AccessLog,
            network::{http_connection_manager::v2::HttpConnectionManager, tcp_proxy::v2::TcpProxy},
        },
    };
    use std::fmt::Debug;

    fn assert_oneof_conflict<T: ReflectMessage + Default + Debug>(yaml: &str) {
        let err = from_yaml_str::<T>(yaml).unwrap_err();
        assert!(err.to_string().contains("oneof"), "{yaml}: {err}");
    }

    #[test]
    fn error_carries_field_path() {
        let err = from_yaml_str::<Listener>("name: l\nfilter_chains:\n- filters:\n  - name: 7\n    config: 3\n")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("failed to decode filter_chains[0].filters[0]"), "{msg}");
    }

    #[test]
    fn json_and_yaml_agree() {
        let yaml: Listener = from_yaml_str("name: a\nuse_original_dst: true\n").unwrap();
        let json: Listener = from_json_str(r#"{"name": "a", "useOriginalDst": true}"#).unwrap();
        assert_eq!(yaml, json);
        assert_eq!(yaml.use_original_dst, Some(true));
    }

    #[test]
    fn enum_names_and_durations() {
        let action: RedirectAction = from_yaml_str("host_redirect: example.com\nresponse_code: FOUND").unwrap();
        assert_eq!(action.response_code(), envoy_v2_api::envoy::api::v2::route::redirect_action::RedirectResponseCode::Found);
        let action: RouteAction = from_yaml_str("cluster: c\ntimeout: 0.250s").unwrap();
        assert_eq!(action.timeout.map(|d| d.nanos), Some(250_000_000));
        assert!(from_yaml_str::<SocketAddress>("protocol: SCTP").is_err());
        assert!(from_yaml_str::<RouteAction>("cluster: c\ntimeout: 15").is_err());
    }

    #[test]
    fn typed_config_is_packed_for_any_known_message() {
        let filter: Filter = from_yaml_str(
            r#"
name: envoy.tcp_proxy
typed_config:
  "@type": type.googleapis.com/envoy.config.filter.network.tcp_proxy.v2.TcpProxy
  stat_prefix: mysql
  cluster: db
"#,
        )
        .unwrap();
        let Some(envoy_v2_api::envoy::api::v2::listener::filter::ConfigType::TypedConfig(any)) = filter.config_type
        else {
            panic!("expected a typed config")
        };
        let tcp_proxy: TcpProxy = any.to_msg().unwrap();
        assert_eq!(tcp_proxy.stat_prefix, "mysql");
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let listener: Listener = from_yaml_str("name: l\ntcp_fast_open_queue_length: 4").unwrap();
        assert_eq!(listener.name, "l");
    }

    #[test]
    fn oneof_members_are_exclusive() {
        assert_oneof_conflict::<RouteMatch>("prefix: /a\npath: /b");
        assert_oneof_conflict::<RouteMatch>("path: /b\nsafe_regex: {google_re2: {}, regex: '.*'}");
        assert_oneof_conflict::<Route>("route: {cluster: c}\nredirect: {host_redirect: x}");
        assert_oneof_conflict::<Route>("redirect: {host_redirect: x}\ndirect_response: {status: 200}");
        assert_oneof_conflict::<RouteAction>("cluster: c\ncluster_header: x-h");
        assert_oneof_conflict::<RouteAction>("cluster_header: x-h\nweighted_clusters: {clusters: [{name: a}]}");
        assert_oneof_conflict::<RouteAction>("cluster: c\nhost_rewrite: h\nauto_host_rewrite: true");
        assert_oneof_conflict::<RedirectAction>("https_redirect: true\nscheme_redirect: http");
        assert_oneof_conflict::<RedirectAction>("path_redirect: /a\nprefix_rewrite: /b");
        assert_oneof_conflict::<HeaderMatcher>("name: h\nexact_match: a\nprefix_match: b");
        assert_oneof_conflict::<HeaderMatcher>("name: h\nregex_match: a.*\npresent_match: true");
        assert_oneof_conflict::<SocketAddress>("address: 10.0.0.1\nport_value: 80\nnamed_port: http");
        assert_oneof_conflict::<Address>("socket_address: {address: 10.0.0.1}\npipe: {path: /tmp/s}");
        assert_oneof_conflict::<DataSource>("filename: /etc/ca.pem\ninline_string: abc");
        assert_oneof_conflict::<ConfigSource>("path: /etc/xds\nads: {}");
        assert_oneof_conflict::<Filter>("name: f\nconfig: {}\ntyped_config: {'@type': type.googleapis.com/envoy.config.accesslog.v2.FileAccessLog}");
        assert_oneof_conflict::<ListenerFilter>("name: f\nconfig: {}\ntyped_config: {'@type': type.googleapis.com/envoy.config.accesslog.v2.FileAccessLog}");
        assert_oneof_conflict::<HttpConnectionManager>("rds: {route_config_name: r}\nroute_config: {name: r}");
        assert_oneof_conflict::<TcpProxy>("cluster: c\nweighted_clusters: {clusters: [{name: a, weight: 1}]}");
        assert_oneof_conflict::<AccessLog>("name: a\nconfig: {path: /dev/stdout}\ntyped_config: {'@type': type.googleapis.com/envoy.config.accesslog.v2.FileAccessLog}");
    }

    #[test]
    fn nested_oneof_conflicts_report_their_path() {
        let err = from_yaml_str::<Listener>(
            r#"
name: l
filter_chains:
- filters:
  - name: envoy.http_connection_manager
    config:
      route_config:
        virtual_hosts:
        - routes:
          - match: {prefix: /a, path: /b}
"#,
        );
        // the filter config is an opaque Struct here, its contents are only checked on translation
        assert!(err.is_ok());
        let err = from_yaml_str::<HttpConnectionManager>(
            "route_config:\n  virtual_hosts:\n  - routes:\n    - match: {prefix: /a, path: /b}\n",
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("route_config.virtual_hosts[0].routes[0].match"), "{msg}");
        assert!(msg.contains("oneof"), "{msg}");
    }
}
