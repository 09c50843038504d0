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

use super::header_matcher::HeaderMatcher;
use crate::config::core::Metadata;
use compact_str::CompactString;
use serde::{Serialize, Serializer};
use std::time::Duration;

fn is_false(value: &bool) -> bool {
    !value
}

fn is_empty(value: &&str) -> bool {
    value.is_empty()
}

/// Route table delivered by RDS, or embedded in a connection manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterConfiguration {
    pub router_config_name: CompactString,
    pub virtual_hosts: Vec<VirtualHost>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TlsRequirement {
    #[default]
    None,
    ExternalOnly,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualCluster {
    pub name: CompactString,
    pub pattern: CompactString,
    pub method: CompactString,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualHost {
    pub domains: Vec<CompactString>,
    pub name: CompactString,
    pub require_tls: TlsRequirement,
    pub routers: Vec<Router>,
    pub virtual_clusters: Option<Vec<VirtualCluster>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Router {
    pub decorator: CompactString,
    pub route_match: RouteMatch,
    pub metadata: Metadata,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Forward(RouteAction),
    Redirect(RedirectAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatcher {
    Prefix(CompactString),
    Path(CompactString),
    Regex(CompactString),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeUInt32 {
    pub default_value: u32,
    pub runtime_key: CompactString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub case_sensitive: bool,
    pub path: PathMatcher,
    pub headers: Vec<HeaderMatcher>,
    pub runtime: RuntimeUInt32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectPath {
    Path(CompactString),
    Prefix(CompactString),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectAction {
    pub host_redirect: CompactString,
    pub path: Option<RedirectPath>,
    pub response_code: u16,
    pub scheme_redirect: CompactString,
    pub strip_query: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightedCluster {
    pub name: CompactString,
    pub weight: u32,
    pub metadata_match: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterSpecifier {
    Cluster(CompactString),
    ClusterHeader(CompactString),
    WeightedClusters(Vec<WeightedCluster>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRewrite {
    Literal(CompactString),
    Auto,
}

/// Always present on a forwarding route; the defaults mean "no retries".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    pub num_retries: u32,
    pub retry_on: bool,
    #[serde(with = "humantime_serde")]
    pub retry_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAction {
    pub cluster_specifier: ClusterSpecifier,
    pub metadata_match: Metadata,
    pub retry_policy: RetryPolicy,
    pub timeout: Duration,
    pub prefix_rewrite: CompactString,
    pub host_rewrite: Option<HostRewrite>,
}

// The runtime reads routers as flat records: every variant field is present and the ones not
// selected keep their zero value.

#[derive(Serialize)]
struct RouteMatchRepr<'a> {
    case_sensitive: bool,
    headers: &'a [HeaderMatcher],
    path: &'a str,
    prefix: &'a str,
    regex: &'a str,
    runtime: &'a RuntimeUInt32,
}

impl Serialize for RouteMatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (mut path, mut prefix, mut regex) = ("", "", "");
        match &self.path {
            PathMatcher::Path(p) => path = p,
            PathMatcher::Prefix(p) => prefix = p,
            PathMatcher::Regex(r) => regex = r,
        }
        RouteMatchRepr {
            case_sensitive: self.case_sensitive,
            headers: &self.headers,
            path,
            prefix,
            regex,
            runtime: &self.runtime,
        }
        .serialize(serializer)
    }
}

#[derive(Serialize, Default)]
struct RedirectRepr<'a> {
    host_redirect: &'a str,
    path_redirect: &'a str,
    response_code: u16,
    #[serde(skip_serializing_if = "is_empty")]
    prefix_rewrite: &'a str,
    #[serde(skip_serializing_if = "is_empty")]
    scheme_redirect: &'a str,
    #[serde(skip_serializing_if = "is_false")]
    strip_query: bool,
}

impl<'a> From<&'a RedirectAction> for RedirectRepr<'a> {
    fn from(redirect: &'a RedirectAction) -> Self {
        let (path_redirect, prefix_rewrite) = match &redirect.path {
            Some(RedirectPath::Path(path)) => (path.as_str(), ""),
            Some(RedirectPath::Prefix(prefix)) => ("", prefix.as_str()),
            None => ("", ""),
        };
        Self {
            host_redirect: &redirect.host_redirect,
            path_redirect,
            response_code: redirect.response_code,
            prefix_rewrite,
            scheme_redirect: &redirect.scheme_redirect,
            strip_query: redirect.strip_query,
        }
    }
}

#[derive(Serialize)]
struct RouteActionRepr<'a> {
    cluster_header: &'a str,
    cluster_name: &'a str,
    metadata_match: &'a Metadata,
    retry_policy: &'a RetryPolicy,
    #[serde(with = "humantime_serde")]
    timeout: Duration,
    weighted_clusters: Option<&'a [WeightedCluster]>,
    #[serde(skip_serializing_if = "is_empty")]
    prefix_rewrite: &'a str,
    #[serde(skip_serializing_if = "is_empty")]
    host_rewrite: &'a str,
    #[serde(skip_serializing_if = "is_false")]
    auto_host_rewrite: bool,
}

impl<'a> RouteActionRepr<'a> {
    fn zero(metadata_match: &'a Metadata, retry_policy: &'a RetryPolicy) -> Self {
        Self {
            cluster_header: "",
            cluster_name: "",
            metadata_match,
            retry_policy,
            timeout: Duration::ZERO,
            weighted_clusters: None,
            prefix_rewrite: "",
            host_rewrite: "",
            auto_host_rewrite: false,
        }
    }
}

impl<'a> From<&'a RouteAction> for RouteActionRepr<'a> {
    fn from(route: &'a RouteAction) -> Self {
        let mut repr = Self::zero(&route.metadata_match, &route.retry_policy);
        match &route.cluster_specifier {
            ClusterSpecifier::Cluster(name) => repr.cluster_name = name,
            ClusterSpecifier::ClusterHeader(header) => repr.cluster_header = header,
            ClusterSpecifier::WeightedClusters(clusters) => repr.weighted_clusters = Some(clusters),
        }
        match &route.host_rewrite {
            Some(HostRewrite::Literal(host)) => repr.host_rewrite = host,
            Some(HostRewrite::Auto) => repr.auto_host_rewrite = true,
            None => {},
        }
        repr.timeout = route.timeout;
        repr.prefix_rewrite = &route.prefix_rewrite;
        repr
    }
}

#[derive(Serialize)]
struct RouterRepr<'a> {
    decorator: &'a str,
    #[serde(rename = "match")]
    route_match: &'a RouteMatch,
    metadata: &'a Metadata,
    redirect: RedirectRepr<'a>,
    route: RouteActionRepr<'a>,
}

impl Serialize for Router {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let no_metadata = Metadata::default();
        let no_retries = RetryPolicy::default();
        let (redirect, route) = match &self.action {
            Action::Forward(route) => (RedirectRepr::default(), RouteActionRepr::from(route)),
            Action::Redirect(redirect) => {
                (RedirectRepr::from(redirect), RouteActionRepr::zero(&no_metadata, &no_retries))
            },
        };
        RouterRepr {
            decorator: &self.decorator,
            route_match: &self.route_match,
            metadata: &self.metadata,
            redirect,
            route,
        }
        .serialize(serializer)
    }
}

#[cfg(feature = "envoy-conversions")]
pub(crate) mod envoy_conversions {
    use super::{
        Action, ClusterSpecifier, HostRewrite, PathMatcher, RedirectAction, RedirectPath, RetryPolicy, RouteAction,
        RouteMatch, Router, RouterConfiguration, RuntimeUInt32, TlsRequirement, VirtualCluster, VirtualHost,
        WeightedCluster,
    };
    use crate::config::{
        common::*,
        core::envoy_conversions::{convert_metadata, convert_opt_duration},
        network_filters::http_connection_manager::header_matcher::envoy_conversions::{
            convert_headers, validate_regex,
        },
    };
    use compact_str::CompactString;
    use mosn_data_plane_api::envoy_v2_api::envoy::{
        api::v2::{
            core::RequestMethod,
            route::{
                redirect_action::{PathRewriteSpecifier, RedirectResponseCode, SchemeRewriteSpecifier},
                route::Action as EnvoyAction,
                route_action::{ClusterSpecifier as EnvoyClusterSpecifier, HostRewriteSpecifier},
                route_match::PathSpecifier,
                virtual_host::TlsRequirementType,
                weighted_cluster::ClusterWeight as EnvoyClusterWeight,
                Decorator as EnvoyDecorator, RedirectAction as EnvoyRedirectAction, RetryPolicy as EnvoyRetryPolicy,
                Route as EnvoyRoute, RouteAction as EnvoyRouteAction, RouteMatch as EnvoyRouteMatch,
                RuntimeFractionalPercent, VirtualCluster as EnvoyVirtualCluster, VirtualHost as EnvoyVirtualHost,
                WeightedCluster as EnvoyWeightedCluster,
            },
            RouteConfiguration as EnvoyRouteConfiguration,
        },
        r#type::{fractional_percent::DenominatorType, matcher::RegexMatcher, FractionalPercent},
    };
    use std::fmt::Write;
    use tracing::debug;

    impl From<TlsRequirementType> for TlsRequirement {
        fn from(value: TlsRequirementType) -> Self {
            match value {
                TlsRequirementType::None => Self::None,
                TlsRequirementType::ExternalOnly => Self::ExternalOnly,
                TlsRequirementType::All => Self::All,
            }
        }
    }

    impl TryFrom<EnvoyRouteConfiguration> for RouterConfiguration {
        type Error = GenericError;
        fn try_from(envoy: EnvoyRouteConfiguration) -> Result<Self, Self::Error> {
            let EnvoyRouteConfiguration {
                name,
                virtual_hosts,
                internal_only_headers,
                response_headers_to_add,
                response_headers_to_remove,
                request_headers_to_add,
                request_headers_to_remove,
                validate_clusters: _,
            } = envoy;
            let result = (|| -> Result<_, GenericError> {
                unsupported_field!(
                    internal_only_headers,
                    response_headers_to_add,
                    response_headers_to_remove,
                    request_headers_to_add,
                    request_headers_to_remove
                )?;
                let virtual_hosts = convert_vec!(virtual_hosts)?;
                Ok(Self { router_config_name: name.as_str().into(), virtual_hosts })
            })();
            // inline route tables are usually anonymous
            if name.is_empty() {
                result
            } else {
                result.with_name(name.as_str())
            }
        }
    }

    impl TryFrom<EnvoyVirtualHost> for VirtualHost {
        type Error = GenericError;
        fn try_from(envoy: EnvoyVirtualHost) -> Result<Self, Self::Error> {
            let require_tls = TlsRequirement::from(envoy.require_tls());
            let EnvoyVirtualHost {
                name,
                domains,
                routes,
                require_tls: _,
                virtual_clusters,
                request_headers_to_add,
                response_headers_to_add,
                per_filter_config,
                include_request_attempt_count: _,
            } = envoy;
            let name: CompactString = name.into();
            (|| -> Result<_, GenericError> {
                unsupported_field!(request_headers_to_add, response_headers_to_add)?;
                if !per_filter_config.is_empty() {
                    debug!("dropping per_filter_config of virtual host {name}");
                }
                let routers = convert_vec!(routes, "routes")?;
                let virtual_clusters =
                    if virtual_clusters.is_empty() { None } else { Some(convert_vec!(virtual_clusters)?) };
                Ok(Self {
                    domains: domains.into_iter().map(CompactString::from).collect(),
                    name: name.clone(),
                    require_tls,
                    routers,
                    virtual_clusters,
                })
            })()
            .with_name(name.clone())
        }
    }

    impl TryFrom<EnvoyVirtualCluster> for VirtualCluster {
        type Error = GenericError;
        fn try_from(envoy: EnvoyVirtualCluster) -> Result<Self, Self::Error> {
            let method = match envoy.method() {
                RequestMethod::MethodUnspecified => CompactString::default(),
                other => other.as_str_name().into(),
            };
            let EnvoyVirtualCluster { pattern, name, method: _ } = envoy;
            let name = required!(name)?;
            let pattern = required!(pattern).and_then(|p| validate_regex(&p).map(|()| p)).with_name(name.as_str())?;
            Ok(Self { name: name.into(), pattern: pattern.into(), method })
        }
    }

    impl TryFrom<EnvoyRoute> for Router {
        type Error = GenericError;
        fn try_from(envoy: EnvoyRoute) -> Result<Self, Self::Error> {
            let EnvoyRoute {
                r#match,
                metadata,
                decorator,
                per_filter_config,
                typed_per_filter_config,
                request_headers_to_add,
                response_headers_to_add,
                action,
            } = envoy;
            unsupported_field!(request_headers_to_add, response_headers_to_add)?;
            if !per_filter_config.is_empty() || !typed_per_filter_config.is_empty() {
                debug!("dropping per filter configuration of route");
            }
            let route_match = convert_opt!(r#match, "match")?;
            let action = match required!(action)? {
                EnvoyAction::Route(route) => Action::Forward(RouteAction::try_from(route).with_node("route")?),
                EnvoyAction::Redirect(redirect) => {
                    Action::Redirect(RedirectAction::try_from(redirect).with_node("redirect")?)
                },
                EnvoyAction::DirectResponse(_) => return Err(GenericError::unsupported_variant("direct_response")),
            };
            let metadata = match (metadata, &action) {
                (Some(metadata), _) => convert_metadata(Some(metadata)),
                (None, Action::Forward(route)) => route.metadata_match.clone(),
                (None, Action::Redirect(_)) => Default::default(),
            };
            let decorator = decorator.map(|EnvoyDecorator { operation }| decorator_text(&operation)).unwrap_or_default();
            Ok(Self { decorator, route_match, metadata, action })
        }
    }

    /// The decorator in protobuf compact text form, `operation:"..." `. An empty operation is the
    /// zero value and prints as nothing.
    fn decorator_text(operation: &str) -> CompactString {
        let mut text = CompactString::default();
        if operation.is_empty() {
            return text;
        }
        text.push_str("operation:\"");
        for byte in operation.bytes() {
            match byte {
                b'\n' => text.push_str("\\n"),
                b'\r' => text.push_str("\\r"),
                b'\t' => text.push_str("\\t"),
                b'"' => text.push_str("\\\""),
                b'\\' => text.push_str("\\\\"),
                0x20..=0x7e => text.push(char::from(byte)),
                _ => {
                    let _ = write!(text, "\\{byte:03o}");
                },
            }
        }
        text.push_str("\" ");
        text
    }

    fn denominator_value(denominator: DenominatorType) -> u32 {
        match denominator {
            DenominatorType::Hundred => 100,
            DenominatorType::TenThousand => 10_000,
            DenominatorType::Million => 1_000_000,
        }
    }

    fn runtime_percent(fraction: RuntimeFractionalPercent) -> RuntimeUInt32 {
        let RuntimeFractionalPercent { default_value, runtime_key } = fraction;
        let default_value = default_value.map_or(0, |percent| {
            let denominator = percent.denominator();
            let FractionalPercent { numerator, .. } = percent;
            let scaled = u64::from(numerator) * 100 / u64::from(denominator_value(denominator));
            u32::try_from(scaled.min(100)).unwrap_or(100)
        });
        RuntimeUInt32 { default_value, runtime_key: runtime_key.into() }
    }

    impl TryFrom<EnvoyRouteMatch> for RouteMatch {
        type Error = GenericError;
        fn try_from(envoy: EnvoyRouteMatch) -> Result<Self, Self::Error> {
            let EnvoyRouteMatch { case_sensitive, runtime, runtime_fraction, headers, query_parameters, path_specifier } =
                envoy;
            unsupported_field!(query_parameters)?;
            let path = match required!(path_specifier)? {
                PathSpecifier::Prefix(prefix) => PathMatcher::Prefix(prefix.into()),
                PathSpecifier::Path(path) => PathMatcher::Path(path.into()),
                PathSpecifier::Regex(regex) => {
                    validate_regex(&regex).with_node("regex")?;
                    PathMatcher::Regex(regex.into())
                },
                PathSpecifier::SafeRegex(RegexMatcher { regex, engine_type: _ }) => {
                    validate_regex(&regex).with_node("safe_regex")?;
                    PathMatcher::Regex(regex.into())
                },
            };
            let headers = convert_headers(headers)?;
            let runtime = match (runtime, runtime_fraction) {
                (Some(runtime), _) => {
                    RuntimeUInt32 { default_value: runtime.default_value, runtime_key: runtime.runtime_key.into() }
                },
                (None, Some(fraction)) => runtime_percent(fraction),
                (None, None) => RuntimeUInt32::default(),
            };
            Ok(Self { case_sensitive: case_sensitive.unwrap_or_default(), path, headers, runtime })
        }
    }

    impl From<EnvoyRetryPolicy> for RetryPolicy {
        fn from(envoy: EnvoyRetryPolicy) -> Self {
            let EnvoyRetryPolicy { retry_on, num_retries, per_try_timeout, retriable_status_codes } = envoy;
            if !retriable_status_codes.is_empty() {
                debug!("ignoring retriable_status_codes {retriable_status_codes:?}");
            }
            Self {
                num_retries: num_retries.unwrap_or_default(),
                retry_on: !retry_on.is_empty(),
                retry_timeout: convert_opt_duration(per_try_timeout),
            }
        }
    }

    impl TryFrom<EnvoyClusterWeight> for WeightedCluster {
        type Error = GenericError;
        fn try_from(envoy: EnvoyClusterWeight) -> Result<Self, Self::Error> {
            let EnvoyClusterWeight { name, weight, metadata_match } = envoy;
            let name: CompactString = required!(name)?.into();
            Ok(Self { name, weight: weight.unwrap_or_default(), metadata_match: convert_metadata(metadata_match) })
        }
    }

    fn convert_weighted_clusters(envoy: EnvoyWeightedCluster) -> Result<Vec<WeightedCluster>, GenericError> {
        let EnvoyWeightedCluster { clusters, total_weight, runtime_key_prefix } = envoy;
        unsupported_field!(runtime_key_prefix)?;
        let clusters: Vec<WeightedCluster> = convert_non_empty_vec!(clusters)?;
        let sum: u64 = clusters.iter().map(|c| u64::from(c.weight)).sum();
        // envoy defaults the total to 100
        let total = u64::from(total_weight.unwrap_or(100));
        if sum != total {
            return Err(GenericError::from_msg(format!("cluster weights add up to {sum}, expected {total}")));
        }
        Ok(clusters)
    }

    impl TryFrom<EnvoyRouteAction> for RouteAction {
        type Error = GenericError;
        fn try_from(envoy: EnvoyRouteAction) -> Result<Self, Self::Error> {
            let EnvoyRouteAction {
                cluster_not_found_response_code: _,
                metadata_match,
                prefix_rewrite,
                timeout,
                idle_timeout: _,
                retry_policy,
                priority: _,
                max_grpc_timeout: _,
                cluster_specifier,
                host_rewrite_specifier,
            } = envoy;
            let cluster_specifier = match required!(cluster_specifier)? {
                EnvoyClusterSpecifier::Cluster(cluster) => {
                    ClusterSpecifier::Cluster(required!(cluster).with_node("cluster_specifier")?.into())
                },
                EnvoyClusterSpecifier::ClusterHeader(cluster_header) => {
                    ClusterSpecifier::ClusterHeader(required!(cluster_header).with_node("cluster_specifier")?.into())
                },
                EnvoyClusterSpecifier::WeightedClusters(weighted) => ClusterSpecifier::WeightedClusters(
                    convert_weighted_clusters(weighted).with_node("weighted_clusters")?,
                ),
            };
            let host_rewrite = match host_rewrite_specifier {
                Some(HostRewriteSpecifier::HostRewrite(host)) if !host.is_empty() => {
                    Some(HostRewrite::Literal(host.into()))
                },
                Some(HostRewriteSpecifier::AutoHostRewrite(true)) => Some(HostRewrite::Auto),
                _ => None,
            };
            Ok(Self {
                cluster_specifier,
                metadata_match: convert_metadata(metadata_match),
                retry_policy: retry_policy.map(RetryPolicy::from).unwrap_or_default(),
                timeout: convert_opt_duration(timeout),
                prefix_rewrite: prefix_rewrite.into(),
                host_rewrite,
            })
        }
    }

    impl TryFrom<EnvoyRedirectAction> for RedirectAction {
        type Error = GenericError;
        fn try_from(envoy: EnvoyRedirectAction) -> Result<Self, Self::Error> {
            let response_code = match envoy.response_code() {
                RedirectResponseCode::MovedPermanently => 301,
                RedirectResponseCode::Found => 302,
                RedirectResponseCode::SeeOther => 303,
                RedirectResponseCode::TemporaryRedirect => 307,
                RedirectResponseCode::PermanentRedirect => 308,
            };
            let EnvoyRedirectAction {
                host_redirect,
                port_redirect,
                response_code: _,
                strip_query,
                scheme_rewrite_specifier,
                path_rewrite_specifier,
            } = envoy;
            unsupported_field!(port_redirect)?;
            let scheme_redirect = match scheme_rewrite_specifier {
                Some(SchemeRewriteSpecifier::HttpsRedirect(true)) => "https".into(),
                Some(SchemeRewriteSpecifier::SchemeRedirect(scheme)) => scheme.into(),
                Some(SchemeRewriteSpecifier::HttpsRedirect(false)) | None => CompactString::default(),
            };
            let path = path_rewrite_specifier.map(|path| match path {
                PathRewriteSpecifier::PathRedirect(path) => RedirectPath::Path(path.into()),
                PathRewriteSpecifier::PrefixRewrite(prefix) => RedirectPath::Prefix(prefix.into()),
            });
            Ok(Self { host_redirect: host_redirect.into(), path, response_code, scheme_redirect, strip_query })
        }
    }

}
