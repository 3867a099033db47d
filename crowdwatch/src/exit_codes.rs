use crowdwatch_core::TestRunStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// The run ended ABORTED or CANCELLED.
    RunStopped = 10,

    /// Invalid CLI/config (bad flags, bad durations, bad master URL, missing test run id, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, unreachable master for one-shot commands, etc.).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Exit code for the status a watch ended on. A run that is still going counts as success.
    #[must_use]
    pub fn from_status(status: &TestRunStatus) -> Self {
        match status {
            TestRunStatus::Aborted | TestRunStatus::Cancelled => Self::RunStopped,
            _ => Self::Success,
        }
    }
}
