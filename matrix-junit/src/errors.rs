// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use std::io;
use thiserror::Error;

/// An error that occurs while serializing a [`Report`](crate::Report).
///
/// Returned by [`Report::serialize`](crate::Report::serialize) and
/// [`Report::to_string`](crate::Report::to_string).
#[derive(Debug, Error)]
pub enum SerializeError {
    /// Writing to the underlying writer failed.
    #[error("error writing JUnit report")]
    Io(#[from] io::Error),

    /// The XML writer rejected an event.
    #[error("error serializing JUnit report")]
    Xml(#[from] quick_xml::Error),

    /// The serialized output was not valid UTF-8.
    #[error("serialized JUnit report is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// An error that occurs while reading a [`Report`](crate::Report).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The report file could not be opened.
    #[error("failed to open JUnit report at `{path}`")]
    Open {
        /// The path that was opened.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The document is not well-formed XML.
    #[error("malformed XML at byte offset {position}")]
    Xml {
        /// The byte offset at which the reader failed.
        position: u64,

        /// The underlying error.
        #[source]
        error: quick_xml::Error,
    },

    /// An element appeared somewhere it is not allowed.
    #[error("<{element}> found outside of <{expected_parent}> at byte offset {position}")]
    UnexpectedElement {
        /// The element that was found.
        element: &'static str,

        /// The element that should have enclosed it.
        expected_parent: &'static str,

        /// The byte offset of the element.
        position: u64,
    },

    /// A required attribute was missing.
    #[error("<{element}> is missing the `{attribute}` attribute at byte offset {position}")]
    MissingAttribute {
        /// The element that is missing the attribute.
        element: &'static str,

        /// The name of the missing attribute.
        attribute: &'static str,

        /// The byte offset of the element.
        position: u64,
    },

    /// A `time` attribute could not be interpreted as a number of seconds.
    #[error("invalid time `{value}` on <{element}> at byte offset {position}")]
    InvalidTime {
        /// The element carrying the attribute.
        element: &'static str,

        /// The attribute value.
        value: String,

        /// The byte offset of the element.
        position: u64,
    },

    /// The document ended before all elements were closed, or contained no test suites root.
    #[error("JUnit report is truncated or has no <testsuites>/<testsuite> root")]
    Incomplete,
}

impl ParseError {
    /// Attaches a file path to an error that occurred while opening a report.
    pub(crate) fn open(path: impl Into<Utf8PathBuf>, error: io::Error) -> Self {
        Self::Open {
            path: path.into(),
            error,
        }
    }
}
