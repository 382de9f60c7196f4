use core::fmt;

/// Where pass/fail lines go.
pub trait Reporter {
    fn report(&mut self, passed: bool, detail: fmt::Arguments<'_>);

    /// The process exit code: 0 if everything reported so far passed.
    fn summary(&self) -> i32;
}

/// Reports through the `log` facade: `PASS: <prefix>: <detail>`.
pub struct LogReporter {
    prefix: &'static str,
    tests: u32,
    failures: u32,
}

impl LogReporter {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            tests: 0,
            failures: 0,
        }
    }

    pub fn tests(&self) -> u32 {
        self.tests
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl Reporter for LogReporter {
    fn report(&mut self, passed: bool, detail: fmt::Arguments<'_>) {
        self.tests += 1;
        if passed {
            log::info!("PASS: {}: {}", self.prefix, detail);
        } else {
            self.failures += 1;
            log::error!("FAIL: {}: {}", self.prefix, detail);
        }
    }

    fn summary(&self) -> i32 {
        log::info!(
            "SUMMARY: {} tests, {} unexpected failures",
            self.tests,
            self.failures
        );
        if self.failures == 0 {
            0
        } else {
            1
        }
    }
}
