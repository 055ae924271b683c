// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read a `Report` from XML.

use crate::{
    NonSuccessKind, Property, Report, TestCase, TestCaseStatus, TestSuite,
    errors::ParseError,
    report::{ERROR_TAG, FAILURE_TAG, SKIPPED_TAG},
};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use std::{io::BufRead, time::Duration};

const TAG_REPORT: &[u8] = b"testsuites";
const TAG_TEST_SUITE: &[u8] = b"testsuite";
const TAG_TEST_CASE: &[u8] = b"testcase";
const TAG_PROPERTY: &[u8] = b"property";
const TAG_FAILURE: &[u8] = b"failure";
const TAG_ERROR: &[u8] = b"error";
const TAG_SKIPPED: &[u8] = b"skipped";
const TAG_SYSTEM_OUT: &[u8] = b"system-out";
const TAG_SYSTEM_ERR: &[u8] = b"system-err";

// Counters that are recomputed from the test cases rather than carried through.
const DERIVED_SUITE_ATTRS: &[&str] = &["tests", "failures", "errors", "skipped", "disabled"];

pub(crate) fn parse_report(reader: impl BufRead) -> Result<Report, ParseError> {
    let mut reader = Reader::from_reader(reader);

    let mut parser = JunitParser::default();
    let mut buf = Vec::new();
    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|error| ParseError::Xml { position, error })?;
        if !parser.match_event(event, position)? {
            break;
        }
        buf.clear();
    }

    parser.finish()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Text {
    SystemOut,
    SystemErr,
    Diagnostic,
    Discard,
}

#[derive(Debug, Default)]
struct JunitParser {
    report: Option<Report>,
    saw_root: bool,
    // A bare <testsuite> root, without an enclosing <testsuites>.
    bare_suite_root: bool,
    current_test_suite: Option<TestSuite>,
    current_test_case: Option<TestCase>,
    // Set once the first diagnostic child of the current test case has been read.
    status_seen: bool,
    current_text: Option<Text>,
}

impl JunitParser {
    /// Returns false once the end of the document is reached.
    fn match_event(&mut self, event: Event<'_>, position: u64) -> Result<bool, ParseError> {
        match event {
            Event::Eof => return Ok(false),
            Event::Start(e) => match e.name().as_ref() {
                TAG_REPORT => self.open_report(),
                TAG_TEST_SUITE => self.open_test_suite(&e, position)?,
                TAG_TEST_CASE => self.open_test_case(&e, position)?,
                TAG_PROPERTY => self.add_property(&e, position)?,
                TAG_FAILURE | TAG_ERROR | TAG_SKIPPED => {
                    let accepted = self.set_test_case_status(&e, position)?;
                    self.current_text = Some(if accepted {
                        Text::Diagnostic
                    } else {
                        Text::Discard
                    });
                }
                TAG_SYSTEM_OUT => self.open_text(Text::SystemOut),
                TAG_SYSTEM_ERR => self.open_text(Text::SystemErr),
                _ => (),
            },
            Event::End(e) => match e.name().as_ref() {
                TAG_REPORT => self.close_report(),
                TAG_TEST_SUITE => self.close_test_suite(),
                TAG_TEST_CASE => self.close_test_case(),
                TAG_FAILURE | TAG_ERROR | TAG_SKIPPED | TAG_SYSTEM_OUT | TAG_SYSTEM_ERR => {
                    self.current_text = None;
                }
                _ => (),
            },
            Event::Empty(e) => match e.name().as_ref() {
                TAG_REPORT => {
                    self.open_report();
                    self.close_report();
                }
                TAG_TEST_SUITE => {
                    self.open_test_suite(&e, position)?;
                    self.close_test_suite();
                }
                TAG_TEST_CASE => {
                    self.open_test_case(&e, position)?;
                    self.close_test_case();
                }
                TAG_PROPERTY => self.add_property(&e, position)?,
                TAG_FAILURE | TAG_ERROR | TAG_SKIPPED => {
                    self.set_test_case_status(&e, position)?;
                }
                _ => (),
            },
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|error| ParseError::Xml { position, error })?;
                self.match_text(&text);
            }
            Event::CData(e) => {
                let text = e.into_inner();
                self.match_text(&String::from_utf8_lossy(&text));
            }
            _ => (),
        }
        Ok(true)
    }

    fn finish(self) -> Result<Report, ParseError> {
        if self.current_test_suite.is_some() || self.current_test_case.is_some() {
            return Err(ParseError::Incomplete);
        }
        match self.report {
            Some(report) if self.saw_root => Ok(report),
            _ => Err(ParseError::Incomplete),
        }
    }

    fn open_report(&mut self) {
        self.report = Some(Report::new());
    }

    fn close_report(&mut self) {
        self.saw_root = true;
    }

    fn open_test_suite(&mut self, e: &BytesStart<'_>, position: u64) -> Result<(), ParseError> {
        if self.report.is_none() {
            self.report = Some(Report::new());
            self.bare_suite_root = true;
        }

        let mut test_suite = TestSuite::new(String::new());
        let mut name = None;
        for (key, value) in attributes(e, position)? {
            match key.as_str() {
                "name" => name = Some(value),
                "time" => {
                    test_suite.set_time(parse_time(TESTSUITE, value, position)?);
                }
                "timestamp" => {
                    test_suite.set_timestamp(value);
                }
                key if DERIVED_SUITE_ATTRS.contains(&key) => {}
                _ => {
                    test_suite.extra.insert(key, value);
                }
            }
        }
        test_suite.name = name.ok_or(ParseError::MissingAttribute {
            element: TESTSUITE,
            attribute: "name",
            position,
        })?;

        self.current_test_suite = Some(test_suite);
        Ok(())
    }

    fn close_test_suite(&mut self) {
        if let (Some(report), Some(test_suite)) =
            (self.report.as_mut(), self.current_test_suite.take())
        {
            report.add_testsuite(test_suite);
        }
        if self.bare_suite_root {
            self.saw_root = true;
        }
    }

    fn open_test_case(&mut self, e: &BytesStart<'_>, position: u64) -> Result<(), ParseError> {
        if self.current_test_suite.is_none() {
            return Err(ParseError::UnexpectedElement {
                element: TESTCASE,
                expected_parent: TESTSUITE,
                position,
            });
        }

        let mut test_case = TestCase::new(String::new(), TestCaseStatus::success());
        let mut name = None;
        for (key, value) in attributes(e, position)? {
            match key.as_str() {
                "name" => name = Some(value),
                "classname" => {
                    test_case.set_classname(value);
                }
                "time" => {
                    test_case.set_time(parse_time(TESTCASE, value, position)?);
                }
                _ => {
                    test_case.extra.insert(key, value);
                }
            }
        }
        test_case.name = name.ok_or(ParseError::MissingAttribute {
            element: TESTCASE,
            attribute: "name",
            position,
        })?;

        self.current_test_case = Some(test_case);
        self.status_seen = false;
        Ok(())
    }

    fn close_test_case(&mut self) {
        if let (Some(test_suite), Some(test_case)) = (
            self.current_test_suite.as_mut(),
            self.current_test_case.take(),
        ) {
            test_suite.add_testcase(test_case);
        }
    }

    fn add_property(&mut self, e: &BytesStart<'_>, position: u64) -> Result<(), ParseError> {
        let Some(test_suite) = self.current_test_suite.as_mut() else {
            return Ok(());
        };
        let mut name = None;
        let mut value = None;
        for (key, v) in attributes(e, position)? {
            match key.as_str() {
                "name" => name = Some(v),
                "value" => value = Some(v),
                _ => {}
            }
        }
        if let Some(name) = name {
            test_suite.add_property(Property::new(name, value.unwrap_or_default()));
        }
        Ok(())
    }

    /// Records the status of the current test case. Returns false if the element was ignored
    /// because the test case already has a status.
    fn set_test_case_status(
        &mut self,
        e: &BytesStart<'_>,
        position: u64,
    ) -> Result<bool, ParseError> {
        let tag = e.name();
        let element = match tag.as_ref() {
            TAG_FAILURE => FAILURE_TAG,
            TAG_ERROR => ERROR_TAG,
            _ => SKIPPED_TAG,
        };
        let Some(test_case) = self.current_test_case.as_mut() else {
            return Err(ParseError::UnexpectedElement {
                element,
                expected_parent: TESTCASE,
                position,
            });
        };
        if self.status_seen {
            return Ok(false);
        }
        self.status_seen = true;

        let mut status = match tag.as_ref() {
            TAG_FAILURE => TestCaseStatus::non_success(NonSuccessKind::Failure),
            TAG_ERROR => TestCaseStatus::non_success(NonSuccessKind::Error),
            _ => TestCaseStatus::skipped(),
        };
        for (key, value) in attributes(e, position)? {
            match key.as_str() {
                "message" => {
                    status.set_message(value);
                }
                "type" => {
                    status.set_type(value);
                }
                _ => {}
            }
        }
        test_case.status = status;
        Ok(true)
    }

    fn open_text(&mut self, text: Text) {
        self.current_text = Some(text);
    }

    fn match_text(&mut self, text: &str) {
        // Indentation between elements is not content.
        if text.trim().is_empty() {
            return;
        }
        let Some(test_case) = self.current_test_case.as_mut() else {
            // Suite-level output is not retained.
            return;
        };
        match self.current_text {
            Some(Text::SystemOut) => append(&mut test_case.system_out, text),
            Some(Text::SystemErr) => append(&mut test_case.system_err, text),
            Some(Text::Diagnostic) => {
                let mut description = test_case.status.description().unwrap_or("").to_owned();
                description.push_str(text);
                test_case.status.set_description(description);
            }
            Some(Text::Discard) | None => {}
        }
    }
}

static TESTSUITE: &str = "testsuite";
static TESTCASE: &str = "testcase";

fn append(slot: &mut Option<String>, text: &str) {
    slot.get_or_insert_with(String::new).push_str(text);
}

fn attributes(e: &BytesStart<'_>, position: u64) -> Result<Vec<(String, String)>, ParseError> {
    e.attributes()
        .map(|attr| {
            let attr = attr.map_err(|error| ParseError::Xml {
                position,
                error: error.into(),
            })?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|error| ParseError::Xml { position, error })?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

fn parse_time(element: &'static str, value: String, position: u64) -> Result<Duration, ParseError> {
    // Some producers write an empty string for tests that were never timed.
    if value.trim().is_empty() {
        return Ok(Duration::ZERO);
    }
    // Some producers use a comma as the thousands separator.
    match value.replace(',', "").trim().parse::<f64>() {
        // Round to the nearest nanosecond so that values written with millisecond precision
        // read back exactly.
        Ok(secs) if secs.is_finite() && secs >= 0.0 => {
            Ok(Duration::from_nanos((secs * 1e9).round() as u64))
        }
        _ => Err(ParseError::InvalidTime {
            element,
            value,
            position,
        }),
    }
}
