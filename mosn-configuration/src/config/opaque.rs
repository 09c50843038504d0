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

//! Opaque `google.protobuf.Struct` configuration blobs.
//!
//! v2 filters and access logs may carry their configuration as an untyped Struct. It is turned
//! into JSON and then decoded as the typed message, or read key by key.

use crate::config::common::GenericError;
use mosn_data_plane_api::decode::{self, DecodeError, ReflectMessage};
use prost_types::{value::Kind, ListValue, Struct, Value};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Largest f64 that still represents every integer below it exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub struct JsonConverter;

impl JsonConverter {
    pub fn struct_to_json(proto_struct: &Struct) -> Result<JsonValue, GenericError> {
        let mut map = JsonMap::new();
        for (key, value) in &proto_struct.fields {
            map.insert(key.clone(), Self::value_to_json(value)?);
        }
        Ok(JsonValue::Object(map))
    }

    /// Struct numbers are always doubles; whole numbers come back as JSON integers so they
    /// deserialize into `u32`/`i64` message fields.
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    pub fn value_to_json(proto_value: &Value) -> Result<JsonValue, GenericError> {
        match &proto_value.kind {
            None | Some(Kind::NullValue(_)) => Ok(JsonValue::Null),
            Some(Kind::NumberValue(n)) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                Ok(JsonValue::from(*n as i64))
            },
            Some(Kind::NumberValue(n)) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .ok_or_else(|| GenericError::from_msg(format!("Invalid number: {n}"))),
            Some(Kind::StringValue(s)) => Ok(JsonValue::String(s.clone())),
            Some(Kind::BoolValue(b)) => Ok(JsonValue::Bool(*b)),
            Some(Kind::StructValue(s)) => Self::struct_to_json(s),
            Some(Kind::ListValue(l)) => Self::list_to_json(l),
        }
    }

    pub fn list_to_json(proto_list: &ListValue) -> Result<JsonValue, GenericError> {
        proto_list.values.iter().map(Self::value_to_json).collect::<Result<Vec<_>, _>>().map(JsonValue::Array)
    }
}

/// Decodes the typed message `T` from its untyped Struct form.
pub fn from_struct<T: ReflectMessage + Default>(config: &Struct) -> Result<T, GenericError> {
    let json = JsonConverter::struct_to_json(config)?;
    decode::from_json_value(json).map_err(|e| match e {
        DecodeError::Json { path, source } => {
            GenericError::from_msg_with_cause(format!("failed to decode struct config at \"{path}\": {source}"), source)
        },
        other @ DecodeError::Yaml { .. } => GenericError::from_msg_with_cause("failed to decode struct config", other),
    })
}

/// Looks up a string field, `None` when the key is absent or not a string.
pub fn lookup_str<'a>(config: &'a Struct, key: &str) -> Option<&'a str> {
    match config.fields.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => Some(s.as_str()),
        _ => None,
    }
}
