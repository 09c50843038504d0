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

use std::{
    borrow::Cow,
    fmt::{self, Debug, Display},
};

pub type BoxedErr = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type Result<T> = ::core::result::Result<T, Error>;

/// Process level error.
///
/// Anything that converts into a boxed std error converts into this type, including
/// plain strings, so `"message".into()` and `?` on foreign errors both work.
/// The type deliberately does not implement [`std::error::Error`] itself.
pub struct Error(ErrorImpl);

enum ErrorImpl {
    Error(BoxedErr),
    WithContext(Cow<'static, str>, BoxedErr),
}

impl Error {
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        match &self.0 {
            ErrorImpl::Error(err) | ErrorImpl::WithContext(_, err) => err.as_ref(),
        }
    }

    pub fn into_inner(self) -> BoxedErr {
        match self.0 {
            ErrorImpl::Error(err) | ErrorImpl::WithContext(_, err) => err,
        }
    }

    pub fn context_msg(&self) -> Option<&str> {
        match &self.0 {
            ErrorImpl::Error(_) => None,
            ErrorImpl::WithContext(msg, _) => Some(msg),
        }
    }

    #[must_use]
    pub fn context<M: Into<Cow<'static, str>>>(self, msg: M) -> Self {
        let msg = msg.into();
        match self.0 {
            ErrorImpl::Error(err) => Self(ErrorImpl::WithContext(msg, err)),
            // keep the innermost cause, stack the messages outermost first
            ErrorImpl::WithContext(inner_msg, err) => {
                Self(ErrorImpl::WithContext(format!("{msg}: {inner_msg}").into(), err))
            },
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<BoxedErr>,
{
    fn from(value: E) -> Self {
        Self(ErrorImpl::Error(value.into()))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ErrorImpl::Error(err) => write!(f, "{err}"),
            ErrorImpl::WithContext(msg, err) => write!(f, "{msg}: {err}"),
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")?;
        let mut source = self.inner().source();
        while let Some(cause) = source {
            write!(f, "\n  caused by: {cause}")?;
            source = cause.source();
        }
        Ok(())
    }
}

pub trait Context<T> {
    fn context<M: Into<Cow<'static, str>>>(self, msg: M) -> Result<T>;

    fn with_context_msg<M: Into<Cow<'static, str>>>(self, msg: M) -> Result<T>
    where
        Self: Sized,
    {
        self.context(msg)
    }

    fn with_context<M: Into<Cow<'static, str>>, F: FnOnce() -> M>(self, f: F) -> Result<T>;
}

impl<T, E> Context<T> for ::core::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context<M: Into<Cow<'static, str>>>(self, msg: M) -> Result<T> {
        self.map_err(|e| e.into().context(msg))
    }

    fn with_context<M: Into<Cow<'static, str>>, F: FnOnce() -> M>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().context(f()))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<M: Into<Cow<'static, str>>>(self, msg: M) -> Result<T> {
        let msg = msg.into();
        self.ok_or_else(|| Error::from(msg.into_owned()))
    }

    fn with_context<M: Into<Cow<'static, str>>, F: FnOnce() -> M>(self, f: F) -> Result<T> {
        self.ok_or_else(|| Error::from(f().into().into_owned()))
    }
}
