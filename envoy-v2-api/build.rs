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

use glob::glob;
use std::path::PathBuf;

/// std::env::set_var("PROTOC", The Path of Protoc);
fn main() -> std::io::Result<()> {
    let descriptor_path = PathBuf::from(std::env::var("OUT_DIR").unwrap()).join("proto_descriptor.bin");

    let mut protos: Vec<PathBuf> = glob("data-plane-api/envoy/**/*.proto").unwrap().filter_map(Result::ok).collect();

    let custom_protos: Vec<PathBuf> = glob("../proto/**/*.proto").unwrap().filter_map(Result::ok).collect();
    protos.extend(custom_protos);

    let include_paths = ["./data-plane-api/", "../proto/"];

    println!("cargo:rerun-if-changed=data-plane-api");
    println!("cargo:rerun-if-changed=../proto");

    let mut config = prost_build::Config::new();
    config
        .file_descriptor_set_path(descriptor_path.clone())
        .enable_type_names()
        .type_name_domain(["."], "type.googleapis.com")
        .btree_map(["."])
        .include_file("mod.rs");

    // first pass only produces the descriptor set, the second one adds the reflection derives
    // for every message it lists
    config.compile_protos(&protos, &include_paths)?;
    let pool_attribute = r#"#[prost_reflect(file_descriptor_set_bytes = "crate::FILE_DESCRIPTOR_SET_BYTES")]"#;

    let buf = std::fs::read(&descriptor_path)?;
    let descriptor = prost_reflect::DescriptorPool::decode(buf.as_ref()).expect("Invalid file descriptor");
    for message in descriptor.all_messages() {
        let full_name = message.full_name();
        // google.protobuf types come from prost-types
        if full_name.starts_with("google.protobuf.") {
            continue;
        }
        config
            .type_attribute(full_name, "#[derive(::prost_reflect::ReflectMessage)]")
            .type_attribute(full_name, format!(r#"#[prost_reflect(message_name = "{}")]"#, full_name,))
            .type_attribute(full_name, pool_attribute);
    }
    config.compile_protos(&protos, &include_paths)
}
