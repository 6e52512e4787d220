//! Code evaluation contract.
//!
//! Grading runs a submission against test cases; complexity estimation ranks
//! the submission's asymptotic cost. Both live behind one [`Evaluator`] trait
//! so a sandboxed service can replace the local subprocess runner.

pub mod complexity;
pub mod runner;

use crate::questions::TestCase;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub use runner::{ProcessEvaluator, RunnerConfig};

/// Grading errors
#[derive(Debug, Error)]
pub enum GradingError {
    /// Evaluation exceeded its time bound; nothing was recorded
    #[error("Evaluation timed out after {0:?}")]
    Timeout(Duration),

    /// The evaluator itself failed (not a failing submission)
    #[error("Evaluator crashed: {0}")]
    Crashed(String),
}

/// Submission language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Python,
    JavaScript,
}

impl Language {
    /// Resolve a client-supplied language name. Unknown or missing names run as Python.
    pub fn parse(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            Some("javascript" | "js" | "node") => Language::JavaScript,
            _ => Language::Python,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::JavaScript => "js",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranked complexity classes, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComplexityClass {
    Constant,
    Logarithmic,
    Linear,
    Linearithmic,
    Quadratic,
    Cubic,
    Exponential,
    Unknown,
}

impl ComplexityClass {
    /// Lower is better. Unknown ranks last.
    pub fn rank(self) -> u32 {
        match self {
            ComplexityClass::Constant => 0,
            ComplexityClass::Logarithmic => 1,
            ComplexityClass::Linear => 2,
            ComplexityClass::Linearithmic => 3,
            ComplexityClass::Quadratic => 4,
            ComplexityClass::Cubic => 5,
            ComplexityClass::Exponential => 6,
            ComplexityClass::Unknown => 99,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ComplexityClass::Constant => "O(1)",
            ComplexityClass::Logarithmic => "O(log n)",
            ComplexityClass::Linear => "O(n)",
            ComplexityClass::Linearithmic => "O(n log n)",
            ComplexityClass::Quadratic => "O(n²)",
            ComplexityClass::Cubic => "O(n³)",
            ComplexityClass::Exponential => "O(2^n)",
            ComplexityClass::Unknown => "unknown",
        }
    }

    /// Parse a stored label. Anything unrecognised is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "O(1)" => ComplexityClass::Constant,
            "O(log n)" => ComplexityClass::Logarithmic,
            "O(n)" => ComplexityClass::Linear,
            "O(n log n)" => ComplexityClass::Linearithmic,
            "O(n²)" | "O(n^2)" => ComplexityClass::Quadratic,
            "O(n³)" | "O(n^3)" => ComplexityClass::Cubic,
            "O(2^n)" => ComplexityClass::Exponential,
            _ => ComplexityClass::Unknown,
        }
    }
}

impl fmt::Display for ComplexityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of running a submission against a question's test cases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeReport {
    /// All test cases passed
    pub passed: bool,
    /// One diagnostics line per test case
    pub output: String,
    pub passed_count: u32,
    pub total_count: u32,
}

impl GradeReport {
    /// Passed share in whole percent
    pub fn percentage(&self) -> u32 {
        if self.total_count == 0 {
            0
        } else {
            self.passed_count * 100 / self.total_count
        }
    }
}

/// Complexity estimate with a human-readable explanation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityEstimate {
    pub class: ComplexityClass,
    pub explanation: String,
}

/// Grades submissions and estimates their complexity
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Run `code` against every test case, hidden ones included
    async fn grade(
        &self,
        code: &str,
        language: Language,
        test_cases: &[TestCase],
    ) -> Result<GradeReport, GradingError>;

    async fn estimate_complexity(
        &self,
        code: &str,
        language: Language,
    ) -> Result<ComplexityEstimate, GradingError>;
}
