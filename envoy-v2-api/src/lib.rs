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

//! Envoy v2 xDS resources used by the mosn configuration translator.
//!
//! Generated by `prost-build` from the protos under `data-plane-api/` and `proto/`. Every message
//! also implements `prost_reflect::ReflectMessage`, which is how proto-JSON (and YAML) input is
//! decoded.

#![allow(clippy::all, clippy::pedantic)]

pub use prost;
pub use prost_reflect;

pub const FILE_DESCRIPTOR_SET_BYTES: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/proto_descriptor.bin"));

include!(concat!(env!("OUT_DIR"), "/mod.rs"));

pub mod google {
    pub mod protobuf {
        pub use prost_types::*;
    }
}
