// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Error types for KLL sketch operations

use std::fmt;

/// ErrorKind is all kinds of Error of this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An argument passed to a sketch operation is invalid.
    InvalidArgument,
    /// The sketch data deserializing is malformed.
    MalformedDeserializeData,
    /// A mutating operation was invoked on a read-only sketch.
    ReadOnly,
    /// The serialized or merged sketch holds a different kind of item.
    TypeMismatch,
    /// Caller-owned memory could not be grown to the required size.
    OutOfSpace,
}

impl ErrorKind {
    /// Convert this error kind instance into static str.
    pub const fn into_static(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::MalformedDeserializeData => "MalformedDeserializeData",
            ErrorKind::ReadOnly => "ReadOnly",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::OutOfSpace => "OutOfSpace",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

/// Error is the error struct returned by all fallible functions of this crate.
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Create a new Error with error kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::default(),
            source: None,
        }
    }

    /// Add more context in error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Set source for error.
    ///
    /// # Panics
    ///
    /// Panics if the source has been set.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::error::Error as _;
    /// use datasketches_kll::error::{Error, ErrorKind};
    ///
    /// let mut error = Error::new(ErrorKind::MalformedDeserializeData, "failed to read sketch");
    /// assert!(error.source().is_none());
    /// error = error.set_source(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"));
    /// assert!(error.source().is_some());
    /// ```
    pub fn set_source(mut self, src: impl Into<anyhow::Error>) -> Self {
        assert!(self.source.is_none(), "the source error has been set");
        self.source = Some(src.into());
        self
    }

    /// Return error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return error's message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Returns the context value recorded under `key`, if any.
    pub fn context(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

// Constructors used across the crate.
impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub(crate) fn insufficient_data(tag: &'static str) -> Self {
        Self::new(
            ErrorKind::MalformedDeserializeData,
            format!("insufficient data while reading {tag}"),
        )
        .with_context("field", tag)
    }

    pub(crate) fn invalid_family(expected: u8, actual: u8, name: &'static str) -> Self {
        Self::new(
            ErrorKind::MalformedDeserializeData,
            format!("invalid family: expected {expected} ({name}), got {actual}"),
        )
    }

    pub(crate) fn unsupported_serial_version(actual: u8) -> Self {
        Self::new(
            ErrorKind::MalformedDeserializeData,
            format!("unsupported serial version: {actual}"),
        )
    }

    pub(crate) fn invalid_preamble_ints(expected: u8, actual: u8) -> Self {
        Self::new(
            ErrorKind::MalformedDeserializeData,
            format!("invalid preamble ints: expected {expected}, got {actual}"),
        )
    }

    pub(crate) fn deserial(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedDeserializeData, message)
    }

    pub(crate) fn read_only(operation: &'static str) -> Self {
        Self::new(
            ErrorKind::ReadOnly,
            format!("cannot {operation}: the sketch is read-only"),
        )
    }

    pub(crate) fn type_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::TypeMismatch,
            format!("item kind mismatch: expected {expected}, got {actual}"),
        )
    }

    pub(crate) fn out_of_space(required: usize, available: usize) -> Self {
        Self::new(
            ErrorKind::OutOfSpace,
            format!("memory request declined: {required} bytes required, {available} available"),
        )
        .with_context("required", required)
        .with_context("available", available)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f
                .debug_struct("Error")
                .field("kind", &self.kind)
                .field("message", &self.message)
                .field("context", &self.context)
                .field("source", &self.source)
                .finish();
        }

        fmt::Display::fmt(self, f)?;
        for (key, value) in &self.context {
            write!(f, "\n    {key}: {value}")?;
        }
        if let Some(source) = &self.source {
            write!(f, "\n    caused by: {source:#}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_context() {
        let err = Error::out_of_space(64, 16);
        assert_eq!(err.kind(), ErrorKind::OutOfSpace);
        assert_eq!(
            err.to_string(),
            "OutOfSpace: memory request declined: 64 bytes required, 16 available"
        );
        assert_eq!(err.context("required"), Some("64"));
        assert_eq!(err.context("missing"), None);

        let debug = format!("{err:?}");
        assert!(debug.contains("available: 16"), "{debug}");
    }

    #[test]
    fn test_source_is_kept() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err = Error::insufficient_data("n").set_source(io);
        assert_eq!(err.context("field"), Some("n"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(format!("{err:?}").contains("caused by: eof"));
    }
}
