//! Utilities to measure how long parts of the preprocessing take.

use std::sync::atomic::{compiler_fence, Ordering::SeqCst};
use std::time::*;

/// Measure how long executing the given lambda takes, print the time to
/// stderr, report it under the given key and return the result of the lambda.
pub fn report_time<Out, F: FnOnce() -> Out>(name: &str, key: &'static str, f: F) -> Out {
    let (res, t_passed) = measure(f);
    let t_passed = t_passed.as_secs_f64() * 1000.0;
    eprintln!("{} done - took: {}ms", name, t_passed);
    crate::report!(key, t_passed);
    res
}

/// Measure how long executing the given lambda takes and return the result
/// together with the duration.
pub fn measure<Out, F: FnOnce() -> Out>(f: F) -> (Out, Duration) {
    compiler_fence(SeqCst);
    let start = Instant::now();
    let res = f();
    let t_passed = start.elapsed();
    compiler_fence(SeqCst);
    (res, t_passed)
}

/// A struct to repeatedly measure the time passed since the timer was started.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create and start a new `Timer`
    pub fn new() -> Timer {
        Timer { start: Instant::now() }
    }

    /// Reset the `Timer`
    pub fn restart(&mut self) {
        self.start = Instant::now();
    }

    /// Return the time passed since the timer was started
    pub fn get_passed(&self) -> Duration {
        self.start.elapsed()
    }
}
