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

/// A request header condition of a route. `value` is a literal unless `regex` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderMatcher {
    pub name: CompactString,
    pub value: CompactString,
    pub regex: bool,
}

#[cfg(feature = "envoy-conversions")]
pub(crate) mod envoy_conversions {
    use super::HeaderMatcher;
    use crate::config::common::*;
    use compact_str::CompactString;
    use mosn_data_plane_api::envoy_v2_api::envoy::{
        api::v2::route::{header_matcher::HeaderMatchSpecifier, HeaderMatcher as EnvoyHeaderMatcher},
        r#type::matcher::RegexMatcher,
    };

    pub(crate) fn validate_regex(pattern: &str) -> Result<(), GenericError> {
        regex::Regex::new(pattern)
            .map(|_| ())
            .map_err(|e| GenericError::from_msg_with_cause(format!("invalid regex \"{pattern}\""), e))
    }

    impl TryFrom<EnvoyHeaderMatcher> for HeaderMatcher {
        type Error = GenericError;
        fn try_from(envoy: EnvoyHeaderMatcher) -> Result<Self, Self::Error> {
            let EnvoyHeaderMatcher { name, value, regex, invert_match, header_match_specifier } = envoy;
            let name: CompactString = required!(name)?.into();
            (|| -> Result<_, GenericError> {
                // the runtime matcher has no negation
                unsupported_field!(invert_match)?;
                let (value, regex) = match header_match_specifier {
                    Some(HeaderMatchSpecifier::ExactMatch(exact)) => (exact, false),
                    Some(HeaderMatchSpecifier::RegexMatch(pattern)) => {
                        validate_regex(&pattern).with_node("regex_match")?;
                        (pattern, true)
                    },
                    Some(HeaderMatchSpecifier::SafeRegexMatch(RegexMatcher { regex, engine_type: _ })) => {
                        validate_regex(&regex).with_node("safe_regex_match")?;
                        (regex, true)
                    },
                    Some(HeaderMatchSpecifier::RangeMatch(_)) => {
                        return Err(GenericError::unsupported_variant("range_match"));
                    },
                    Some(HeaderMatchSpecifier::PresentMatch(_)) => {
                        return Err(GenericError::unsupported_variant("present_match"));
                    },
                    Some(HeaderMatchSpecifier::PrefixMatch(_)) => {
                        return Err(GenericError::unsupported_variant("prefix_match"));
                    },
                    Some(HeaderMatchSpecifier::SuffixMatch(_)) => {
                        return Err(GenericError::unsupported_variant("suffix_match"));
                    },
                    None if !value.is_empty() => {
                        let regex = regex.unwrap_or_default();
                        if regex {
                            validate_regex(&value).with_node("value")?;
                        }
                        (value, regex)
                    },
                    None => {
                        return Err(GenericError::unsupported_variant("header matcher without a value"));
                    },
                };
                Ok(Self { name: name.clone(), value: value.into(), regex })
            })()
            .with_name(name)
        }
    }

    /// Converts route header conditions, keeping their order.
    pub fn convert_headers(headers: Vec<EnvoyHeaderMatcher>) -> Result<Vec<HeaderMatcher>, GenericError> {
        convert_vec!(headers)
    }

}
