//! Destinations for subprocess output lines.

use std::io::Write;

/// Receives one output line at a time, from a reader task.
pub trait LineSink: Send + Sync + 'static {
    fn accept(&self, line: &str);
}

/// Prints lines unchanged on the launcher's standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSink;

impl LineSink for PassthroughSink {
    fn accept(&self, line: &str) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        let _ = writeln!(handle, "{}", line);
    }
}

/// Prefix rewrites applied to test-runner log lines, in order.
const RUNNER_REWRITES: &[(&str, &str)] = &[
    ("[TestNG]", ""),
    ("[main] INFO org.testng.internal.Utils -", "[TestNG]"),
    ("Warning: [org.testng.ITest]", "[TestNG] Warning :"),
    ("[main] INFO org.testng.TestClass", "[TestNG]"),
];

/// Shortens the test runner's log prefixes before printing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunnerOutputSink;

impl RunnerOutputSink {
    pub fn reformat(line: &str) -> String {
        RUNNER_REWRITES
            .iter()
            .fold(line.to_string(), |acc, (from, to)| acc.replace(from, to))
    }
}

impl LineSink for RunnerOutputSink {
    fn accept(&self, line: &str) {
        PassthroughSink.accept(&Self::reformat(line));
    }
}
