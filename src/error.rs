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

//! Error types for fmsketch operations

use std::fmt;

/// ErrorKind is all kinds of Error of fmsketch.
///
/// Only configuration mismatches and malformed persisted data surface to
/// callers; capacity and storage growth inside a sketch are recovered
/// internally and never produce an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Two sketches with different bitmap configuration or hash seed were merged.
    IncompatibleSketchShape,
    /// The sketch data being deserialized is malformed.
    MalformedState,
}

impl ErrorKind {
    /// Convert this error kind instance into static str.
    pub const fn into_static(self) -> &'static str {
        match self {
            ErrorKind::IncompatibleSketchShape => "IncompatibleSketchShape",
            ErrorKind::MalformedState => "MalformedState",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

/// Error is the error struct returned by all fmsketch functions.
///
/// # Examples
///
/// ```
/// # use fmsketch::error::Error;
/// # use fmsketch::error::ErrorKind;
/// let err = Error::new(ErrorKind::MalformedState, "truncated payload");
/// assert_eq!(err.kind(), ErrorKind::MalformedState);
/// assert_eq!(err.message(), "truncated payload");
/// ```
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
}

// Convenient constructors used within the fmsketch crate.
impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedState, msg)
    }

    pub(crate) fn insufficient_data(context: &'static str) -> Self {
        Self::malformed(format!("insufficient data: {context}"))
    }

    pub(crate) fn invalid_family(expected: u8, actual: u8, name: &'static str) -> Self {
        Self::malformed(format!(
            "invalid family: expected {expected} ({name}), got {actual}"
        ))
    }

    pub(crate) fn unsupported_serial_version(expected: u8, actual: u8) -> Self {
        Self::malformed(format!(
            "unsupported serial version: expected {expected}, got {actual}"
        ))
    }

    pub(crate) fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::IncompatibleSketchShape, msg)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If alternate has been specified, we will print like Debug.
        if f.alternate() {
            let mut de = f.debug_struct("Error");
            de.field("kind", &self.kind);
            de.field("message", &self.message);
            de.field("context", &self.context);
            de.field("source", &self.source);
            return de.finish();
        }

        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        writeln!(f)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "Context:")?;
            for (k, v) in self.context.iter() {
                writeln!(f, "   {k}: {v}")?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "Source:")?;
            writeln!(f, "   {source:#}")?;
        }

        Ok(())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if !self.context.is_empty() {
            write!(f, ", context: {{ ")?;
            for (i, (k, v)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{k}: {v}")?;
            }
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }

        Ok(())
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
    fn test_display_format() {
        let err = Error::new(ErrorKind::MalformedState, "something went wrong");
        assert_eq!(format!("{err}"), "MalformedState => something went wrong");
    }

    #[test]
    fn test_display_with_multiple_contexts() {
        let err = Error::new(ErrorKind::IncompatibleSketchShape, "merge failed")
            .with_context("lhs_bitmaps", 256)
            .with_context("rhs_bitmaps", 128);
        assert_eq!(
            format!("{err}"),
            "IncompatibleSketchShape, context: { lhs_bitmaps: 256, rhs_bitmaps: 128 } => merge failed"
        );
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;

        let err = Error::malformed("failed to decode preamble");
        assert!(err.source().is_none());
        let err = err.set_source(std::io::Error::other("IO error"));
        assert!(err.source().is_some());
    }
}
