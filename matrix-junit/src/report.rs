// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ParseError, SerializeError},
    parse::parse_report,
    serialize::serialize_report,
};
use camino::Utf8Path;
use indexmap::map::IndexMap;
use std::{
    fs::File,
    io::{self, BufReader},
    time::Duration,
};

/// The root element of a JUnit report.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    /// The test suites contained in this report.
    pub testsuites: Vec<TestSuite>,
}

impl Report {
    /// Creates a new, empty `Report`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a testsuite to this report.
    pub fn add_testsuite(&mut self, testsuite: TestSuite) -> &mut Self {
        self.testsuites.push(testsuite);
        self
    }

    /// Returns the first testsuite with the given name.
    pub fn find_testsuite(&self, name: &str) -> Option<&TestSuite> {
        self.testsuites.iter().find(|suite| suite.name == name)
    }

    /// Removes and returns the first testsuite with the given name.
    pub fn take_testsuite(&mut self, name: &str) -> Option<TestSuite> {
        let index = self.testsuites.iter().position(|suite| suite.name == name)?;
        Some(self.testsuites.remove(index))
    }

    /// Reads a report from the given reader.
    pub fn from_reader(reader: impl io::BufRead) -> Result<Self, ParseError> {
        parse_report(reader)
    }

    /// Reads a report from the file at the given path.
    pub fn from_path(path: &Utf8Path) -> Result<Self, ParseError> {
        let file = File::open(path).map_err(|error| ParseError::open(path, error))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Serialize this report to the given writer.
    pub fn serialize(&self, writer: impl io::Write) -> Result<(), SerializeError> {
        serialize_report(self, writer)
    }

    /// Serialize this report to a string.
    pub fn to_string(&self) -> Result<String, SerializeError> {
        let mut buf: Vec<u8> = vec![];
        self.serialize(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Represents a single testsuite.
///
/// A `TestSuite` groups together several `TestCase` instances.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct TestSuite {
    /// The name of this testsuite.
    pub name: String,

    /// The overall time taken by the testsuite.
    pub time: Option<Duration>,

    /// The time at which the testsuite began execution, as written by the producer.
    ///
    /// This is carried through verbatim rather than interpreted.
    pub timestamp: Option<String>,

    /// The testcases that form this testsuite.
    pub testcases: Vec<TestCase>,

    /// Custom properties set during test execution, e.g. the toolchain version.
    pub properties: Vec<Property>,

    /// Other attributes, in document order.
    ///
    /// The aggregate counters (`tests`, `failures`, `errors`, `skipped`, `disabled`) are not
    /// retained when reading, since they are derived from the test cases.
    pub extra: IndexMap<String, String>,
}

impl TestSuite {
    /// Creates a new `TestSuite`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time: None,
            timestamp: None,
            testcases: vec![],
            properties: vec![],
            extra: IndexMap::new(),
        }
    }

    /// Sets the start timestamp for the testsuite.
    pub fn set_timestamp(&mut self, timestamp: impl Into<String>) -> &mut Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Sets the time taken for the testsuite.
    pub fn set_time(&mut self, time: Duration) -> &mut Self {
        self.time = Some(time);
        self
    }

    /// Adds a property to this testsuite.
    pub fn add_property(&mut self, property: impl Into<Property>) -> &mut Self {
        self.properties.push(property.into());
        self
    }

    /// Adds a testcase to this testsuite.
    pub fn add_testcase(&mut self, testcase: TestCase) -> &mut Self {
        self.testcases.push(testcase);
        self
    }

    /// Adds several testcases to this testsuite.
    pub fn add_testcases(&mut self, testcases: impl IntoIterator<Item = TestCase>) -> &mut Self {
        self.testcases.extend(testcases);
        self
    }
}

/// Represents a single testcase.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct TestCase {
    /// The name of the testcase.
    pub name: String,

    /// The "classname" of the testcase.
    ///
    /// Typically, this represents the package or module containing the test.
    pub classname: Option<String>,

    /// The time it took to execute this testcase.
    pub time: Option<Duration>,

    /// The status of this test, derived from its first diagnostic child.
    pub status: TestCaseStatus,

    /// Data written to standard output while the testcase was executed.
    pub system_out: Option<String>,

    /// Data written to standard error while the testcase was executed.
    pub system_err: Option<String>,

    /// Other attributes, in document order.
    pub extra: IndexMap<String, String>,
}

impl TestCase {
    /// Creates a new testcase.
    pub fn new(name: impl Into<String>, status: TestCaseStatus) -> Self {
        Self {
            name: name.into(),
            classname: None,
            time: None,
            status,
            system_out: None,
            system_err: None,
            extra: IndexMap::new(),
        }
    }

    /// Sets the classname of the test.
    pub fn set_classname(&mut self, classname: impl Into<String>) -> &mut Self {
        self.classname = Some(classname.into());
        self
    }

    /// Sets the time taken for the testcase.
    pub fn set_time(&mut self, time: Duration) -> &mut Self {
        self.time = Some(time);
        self
    }

    /// Sets standard output.
    pub fn set_system_out(&mut self, system_out: impl Into<String>) -> &mut Self {
        self.system_out = Some(system_out.into());
        self
    }

    /// Sets standard error.
    pub fn set_system_err(&mut self, system_err: impl Into<String>) -> &mut Self {
        self.system_err = Some(system_err.into());
        self
    }
}

/// Represents the success or failure of a testcase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestCaseStatus {
    /// This testcase passed: it has no diagnostic child.
    Success,

    /// This testcase did not pass.
    NonSuccess {
        /// Whether this testcase failed in an expected way (failure) or an unexpected way (error).
        kind: NonSuccessKind,

        /// The `message` attribute.
        message: Option<String>,

        /// The `type` attribute.
        ty: Option<String>,

        /// The text body of the element.
        description: Option<String>,
    },

    /// This testcase was not run.
    Skipped {
        /// The `message` attribute.
        message: Option<String>,

        /// The `type` attribute.
        ty: Option<String>,

        /// The text body of the element.
        description: Option<String>,
    },
}

impl TestCaseStatus {
    /// Creates a new `TestCaseStatus` that represents a successful test.
    pub fn success() -> Self {
        TestCaseStatus::Success
    }

    /// Creates a new `TestCaseStatus` that represents an unsuccessful test.
    pub fn non_success(kind: NonSuccessKind) -> Self {
        TestCaseStatus::NonSuccess {
            kind,
            message: None,
            ty: None,
            description: None,
        }
    }

    /// Creates a new `TestCaseStatus` that represents a skipped test.
    pub fn skipped() -> Self {
        TestCaseStatus::Skipped {
            message: None,
            ty: None,
            description: None,
        }
    }

    /// Returns the diagnostic element name for this status, or `None` for a success.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            TestCaseStatus::Success => None,
            TestCaseStatus::NonSuccess { kind, .. } => Some(kind.tag()),
            TestCaseStatus::Skipped { .. } => Some(SKIPPED_TAG),
        }
    }

    /// Returns true if this status records a failure or an error.
    pub fn is_failing(&self) -> bool {
        matches!(self, TestCaseStatus::NonSuccess { .. })
    }

    /// Returns the message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            TestCaseStatus::Success => None,
            TestCaseStatus::NonSuccess { message, .. } | TestCaseStatus::Skipped { message, .. } => {
                message.as_deref()
            }
        }
    }

    /// Returns the type, if any.
    pub fn ty(&self) -> Option<&str> {
        match self {
            TestCaseStatus::Success => None,
            TestCaseStatus::NonSuccess { ty, .. } | TestCaseStatus::Skipped { ty, .. } => {
                ty.as_deref()
            }
        }
    }

    /// Returns the description (text body), if any.
    pub fn description(&self) -> Option<&str> {
        match self {
            TestCaseStatus::Success => None,
            TestCaseStatus::NonSuccess { description, .. }
            | TestCaseStatus::Skipped { description, .. } => description.as_deref(),
        }
    }

    /// Sets the message. No-op if this is a success case.
    pub fn set_message(&mut self, message: impl Into<String>) -> &mut Self {
        let message_mut = match self {
            TestCaseStatus::Success => return self,
            TestCaseStatus::NonSuccess { message, .. } => message,
            TestCaseStatus::Skipped { message, .. } => message,
        };
        *message_mut = Some(message.into());
        self
    }

    /// Sets the type. No-op if this is a success case.
    pub fn set_type(&mut self, ty: impl Into<String>) -> &mut Self {
        let ty_mut = match self {
            TestCaseStatus::Success => return self,
            TestCaseStatus::NonSuccess { ty, .. } => ty,
            TestCaseStatus::Skipped { ty, .. } => ty,
        };
        *ty_mut = Some(ty.into());
        self
    }

    /// Sets the description (text node). No-op if this is a success case.
    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        let description_mut = match self {
            TestCaseStatus::Success => return self,
            TestCaseStatus::NonSuccess { description, .. } => description,
            TestCaseStatus::Skipped { description, .. } => description,
        };
        *description_mut = Some(description.into());
        self
    }
}

pub(crate) static FAILURE_TAG: &str = "failure";
pub(crate) static ERROR_TAG: &str = "error";
pub(crate) static SKIPPED_TAG: &str = "skipped";

/// The kind of a non-successful test.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NonSuccessKind {
    /// This is an expected failure. Serialized as `failure`.
    Failure,

    /// This is an unexpected error. Serialized as `error`.
    Error,
}

impl NonSuccessKind {
    /// Returns the element name for this kind.
    pub fn tag(self) -> &'static str {
        match self {
            NonSuccessKind::Failure => FAILURE_TAG,
            NonSuccessKind::Error => ERROR_TAG,
        }
    }
}

/// Custom properties set during test execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Property {
    /// The name of the property.
    pub name: String,

    /// The value of the property.
    pub value: String,
}

impl Property {
    /// Creates a new `Property` instance.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl<T> From<(T, T)> for Property
where
    T: Into<String>,
{
    fn from((k, v): (T, T)) -> Self {
        Property::new(k, v)
    }
}
