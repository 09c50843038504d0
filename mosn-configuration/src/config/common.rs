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
use std::{borrow::Cow, fmt::Write as _};

pub type BoxedErr = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One step of the path from a converted resource down to the field that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceNode {
    Field(Cow<'static, str>),
    Index(usize),
    Name(CompactString),
}

fn trace_path(nodes: &[TraceNode]) -> String {
    // nodes are pushed while unwinding, so the outermost one is last
    let mut path = String::new();
    for node in nodes.iter().rev() {
        let _ = match node {
            TraceNode::Field(field) if path.is_empty() => write!(path, "{field}"),
            TraceNode::Field(field) => write!(path, ".{field}"),
            TraceNode::Index(index) => write!(path, "[{index}]"),
            TraceNode::Name(name) => write!(path, "(\"{name}\")"),
        };
    }
    path
}

#[derive(Debug, thiserror::Error)]
pub enum GenericError {
    #[error("{0}")]
    Message(Cow<'static, str>),
    #[error("{0}")]
    MessageWithCause(Cow<'static, str>, #[source] BoxedErr),
    #[error("field \"{0}\" is required")]
    MissingField(&'static str),
    #[error("field \"{0}\" is not supported")]
    UnsupportedField(&'static str),
    #[error("unsupported variant: {0}")]
    UnsupportedVariant(Cow<'static, str>),
    #[error("{}: {}", trace_path(.0), .1)]
    Traced(Vec<TraceNode>, Box<GenericError>),
}

impl GenericError {
    pub fn from_msg<T: Into<Cow<'static, str>>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn from_msg_with_cause<T, E>(msg: T, cause: E) -> Self
    where
        T: Into<Cow<'static, str>>,
        E: Into<BoxedErr>,
    {
        Self::MessageWithCause(msg.into(), cause.into())
    }

    pub fn unsupported_variant<T: Into<Cow<'static, str>>>(variant: T) -> Self {
        Self::UnsupportedVariant(variant.into())
    }

    fn push(self, node: TraceNode) -> Self {
        match self {
            Self::Traced(mut nodes, inner) => {
                nodes.push(node);
                Self::Traced(nodes, inner)
            },
            other => Self::Traced(vec![node], Box::new(other)),
        }
    }

    #[must_use]
    pub fn with_node<T: Into<Cow<'static, str>>>(self, node: T) -> Self {
        self.push(TraceNode::Field(node.into()))
    }

    #[must_use]
    pub fn with_index(self, index: usize) -> Self {
        self.push(TraceNode::Index(index))
    }

    #[must_use]
    pub fn with_name<T: Into<CompactString>>(self, name: T) -> Self {
        self.push(TraceNode::Name(name.into()))
    }

    /// The error stripped of its trace.
    pub fn root(&self) -> &GenericError {
        match self {
            Self::Traced(_, inner) => inner.root(),
            other => other,
        }
    }

    /// The dotted path to the failing field, if the error was traced.
    pub fn path(&self) -> Option<String> {
        match self {
            Self::Traced(nodes, _) => Some(trace_path(nodes)),
            _ => None,
        }
    }
}

pub trait WithNodeOnResult: Sized {
    #[must_use]
    fn with_node<T: Into<Cow<'static, str>>>(self, node: T) -> Self;
    #[must_use]
    fn with_index(self, index: usize) -> Self;
    #[must_use]
    fn with_name<T: Into<CompactString>>(self, name: T) -> Self;
}

impl<V> WithNodeOnResult for Result<V, GenericError> {
    fn with_node<T: Into<Cow<'static, str>>>(self, node: T) -> Self {
        self.map_err(|e| e.with_node(node))
    }
    fn with_index(self, index: usize) -> Self {
        self.map_err(|e| e.with_index(index))
    }
    fn with_name<T: Into<CompactString>>(self, name: T) -> Self {
        self.map_err(|e| e.with_name(name))
    }
}

/// A field is "used" when it differs from its protobuf default.
pub trait IsUsed {
    fn is_used(&self) -> bool;
}

impl<T: Default + PartialEq> IsUsed for T {
    fn is_used(&self) -> bool {
        *self != T::default()
    }
}

pub fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    !value.is_used()
}

pub trait Required: Sized {
    type Output;
    fn required(self, field: &'static str) -> Result<Self::Output, GenericError>;
}

impl<T> Required for Option<T> {
    type Output = T;
    fn required(self, field: &'static str) -> Result<T, GenericError> {
        self.ok_or(GenericError::MissingField(field))
    }
}

impl Required for String {
    type Output = String;
    fn required(self, field: &'static str) -> Result<String, GenericError> {
        if self.is_empty() {
            Err(GenericError::MissingField(field))
        } else {
            Ok(self)
        }
    }
}

impl<T> Required for Vec<T> {
    type Output = Vec<T>;
    fn required(self, field: &'static str) -> Result<Vec<T>, GenericError> {
        if self.is_empty() {
            Err(GenericError::MissingField(field))
        } else {
            Ok(self)
        }
    }
}

/// Fails with [`GenericError::UnsupportedField`] for the first listed field that is set.
macro_rules! unsupported_field {
    ($($field:ident),+ $(,)?) => {{
        let result: ::core::result::Result<(), $crate::config::common::GenericError> = Ok(());
        $(
            let result = result.and_then(|()| {
                if $crate::config::common::IsUsed::is_used(&$field) {
                    Err($crate::config::common::GenericError::UnsupportedField(stringify!($field)))
                } else {
                    Ok(())
                }
            });
        )+
        result
    }};
}

macro_rules! required {
    ($field:ident) => {
        $crate::config::common::Required::required($field, stringify!($field))
    };
}

macro_rules! convert_opt {
    ($field:ident) => {
        convert_opt!($field, stringify!($field))
    };
    ($field:expr, $name:expr) => {
        match $crate::config::common::Required::required($field, $name) {
            Ok(value) => {
                $crate::config::common::WithNodeOnResult::with_node(::core::convert::TryInto::try_into(value), $name)
            },
            Err(e) => Err(e),
        }
    };
}

macro_rules! convert_vec {
    ($field:ident) => {
        convert_vec!($field, stringify!($field))
    };
    ($field:expr, $name:expr) => {
        $crate::config::common::WithNodeOnResult::with_node(
            $field
                .into_iter()
                .enumerate()
                .map(|(index, value)| {
                    $crate::config::common::WithNodeOnResult::with_index(
                        ::core::convert::TryInto::try_into(value),
                        index,
                    )
                })
                .collect::<::core::result::Result<Vec<_>, $crate::config::common::GenericError>>(),
            $name,
        )
    };
}

macro_rules! convert_non_empty_vec {
    ($field:ident) => {
        match required!($field) {
            Ok($field) => convert_vec!($field),
            Err(e) => Err(e),
        }
    };
}

pub(crate) use {convert_non_empty_vec, convert_opt, convert_vec, required, unsupported_field};
