//! Structured reporting of preprocessing runs.
//!
//! A thread-local reporter collects key/value pairs during a run and prints
//! them as one JSON object to stdout when the reporting guard is dropped.
//! Human-readable progress goes to stderr, the machine-readable report to
//! stdout, so runs can be piped into evaluation tooling.

use serde_json::{Map, Value};
use std::{cell::RefCell, mem::swap};

pub use serde_json::json;

pub mod benchmark;

#[derive(Debug, Default)]
struct Reporter {
    values: Map<String, Value>,
}

thread_local! {
    static REPORTER: RefCell<Option<Reporter>> = RefCell::new(None);
}

/// Record a key/value pair in the current run report, if reporting is enabled.
/// Reporting the same key twice is a bug in the calling phase.
pub fn report(key: String, val: Value) {
    REPORTER.with(|reporter| {
        if let Some(r) = reporter.borrow_mut().as_mut() {
            let prev = r.values.insert(key, val);
            assert!(prev.is_none());
        }
    });
}

/// Guard which prints the collected report on drop.
#[must_use]
pub struct ReportingGuard(());

impl Drop for ReportingGuard {
    fn drop(&mut self) {
        REPORTER.with(|reporter| {
            if let Some(r) = reporter.borrow_mut().as_mut() {
                let mut values = Map::new();
                swap(&mut values, &mut r.values);
                println!("{}", Value::Object(values));
            };
        });
    }
}

/// Enable reporting on the current thread and tag the report with the program name.
pub fn enable_reporting(program: &str) -> ReportingGuard {
    REPORTER.with(|reporter| *reporter.borrow_mut() = Some(Reporter::default()));
    report("program".to_string(), json!(program));
    ReportingGuard(())
}

#[macro_export]
macro_rules! report {
    ($k:expr, $($json:tt)+) => { $crate::report::report($k.to_string(), $crate::report::json!($($json)+)) };
}
