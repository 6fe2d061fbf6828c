//! Test status values and the ordinal priority used for regression checks.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Outcome of a single functional test, as reported by the test tool.
///
/// The wire strings are fixed by the tool's status picker and must
/// round-trip exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TestStatus {
    /// Empty string — the tester never ran the test.
    Untested,
    /// "N/A" — the test does not apply to this client build.
    NotApplicable,
    /// "Not working".
    NotWorking,
    /// "Semi-working" — partial functionality.
    SemiWorking,
    /// "Working".
    Working,
}

impl TestStatus {
    /// Parse the exact wire string used by the tool.
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "" => Ok(TestStatus::Untested),
            "N/A" => Ok(TestStatus::NotApplicable),
            "Not working" => Ok(TestStatus::NotWorking),
            "Semi-working" => Ok(TestStatus::SemiWorking),
            "Working" => Ok(TestStatus::Working),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }

    /// The wire string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Untested => "",
            TestStatus::NotApplicable => "N/A",
            TestStatus::NotWorking => "Not working",
            TestStatus::SemiWorking => "Semi-working",
            TestStatus::Working => "Working",
        }
    }

    /// Ordinal priority used when comparing an old result against a new one.
    ///
    /// Working=3, Semi-working=2, Not working=1, N/A=0, untested=-1.
    pub fn priority(&self) -> i8 {
        match self {
            TestStatus::Working => 3,
            TestStatus::SemiWorking => 2,
            TestStatus::NotWorking => 1,
            TestStatus::NotApplicable => 0,
            TestStatus::Untested => -1,
        }
    }

    /// Returns `true` if the tester actually exercised the test.
    pub fn is_tested(&self) -> bool {
        self.priority() >= 1
    }

    /// Returns `true` if moving from `old` to `self` is a regression.
    ///
    /// A regression requires the old result to have been a real test outcome
    /// (untested or N/A results cannot regress) and the new priority to be
    /// strictly lower.
    pub fn is_regression_from(&self, old: TestStatus) -> bool {
        old.is_tested() && self.priority() < old.priority()
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
