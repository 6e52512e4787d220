//! Local subprocess evaluator.
//!
//! Runs each test case in a fresh interpreter process with `input_data`
//! injected as a variable and compares trimmed stdout with the expected
//! output. There is no sandboxing: only use it with trusted code or behind
//! an isolated worker.

use super::{ComplexityEstimate, Evaluator, GradeReport, GradingError, Language, complexity};
use crate::questions::TestCase;
use async_trait::async_trait;
use log::{debug, warn};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use uuid::Uuid;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub python_bin: String,
    pub node_bin: String,
    /// Per test case execution bound
    pub exec_timeout: Duration,
    /// Directory for the temporary source files
    pub work_dir: PathBuf,
}

impl RunnerConfig {
    /// Create configuration from environment variables
    ///
    /// - `PYTHON_BIN` (default: python3)
    /// - `NODE_BIN` (default: node)
    /// - `CODE_EXEC_TIMEOUT_MS` (default: 10000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            python_bin: std::env::var("PYTHON_BIN").unwrap_or(defaults.python_bin),
            node_bin: std::env::var("NODE_BIN").unwrap_or(defaults.node_bin),
            exec_timeout: std::env::var("CODE_EXEC_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.exec_timeout),
            work_dir: defaults.work_dir,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            python_bin: "python3".to_string(),
            node_bin: "node".to_string(),
            exec_timeout: Duration::from_millis(10_000),
            work_dir: std::env::temp_dir(),
        }
    }
}

/// Result of a single test case run
#[derive(Debug, Clone, PartialEq, Eq)]
enum CaseOutcome {
    Passed,
    Mismatch { expected: String, got: String },
    Error(String),
}

impl CaseOutcome {
    fn line(&self) -> String {
        match self {
            CaseOutcome::Passed => "Passed".to_string(),
            CaseOutcome::Mismatch { expected, got } => format!("Expected: {expected} | Got: {got}"),
            CaseOutcome::Error(msg) => format!("Error: {msg}"),
        }
    }
}

/// Evaluator backed by local interpreter processes
#[derive(Debug, Clone, Default)]
pub struct ProcessEvaluator {
    config: RunnerConfig,
}

impl ProcessEvaluator {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    fn wrap(code: &str, language: Language, input: &str) -> Result<String, GradingError> {
        let literal =
            serde_json::to_string(input).map_err(|e| GradingError::Crashed(e.to_string()))?;
        Ok(match language {
            Language::Python => format!("input_data = {literal}\n{code}"),
            Language::JavaScript => format!("const input_data = {literal};\n{code}"),
        })
    }

    async fn run_case(
        &self,
        code: &str,
        language: Language,
        case: &TestCase,
    ) -> Result<CaseOutcome, GradingError> {
        let source = Self::wrap(code, language, &case.input)?;
        let path = self
            .config
            .work_dir
            .join(format!("br_{}.{}", Uuid::new_v4().simple(), language.extension()));

        tokio::fs::write(&path, source)
            .await
            .map_err(|e| GradingError::Crashed(format!("failed to write source: {e}")))?;

        let bin = match language {
            Language::Python => &self.config.python_bin,
            Language::JavaScript => &self.config.node_bin,
        };

        let child = Command::new(bin)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(GradingError::Crashed(format!("failed to spawn {bin}: {e}")));
            }
        };

        let outcome =
            match tokio::time::timeout(self.config.exec_timeout, child.wait_with_output()).await {
                Err(_) => CaseOutcome::Error(format!(
                    "Execution timed out ({}ms)",
                    self.config.exec_timeout.as_millis()
                )),
                Ok(Err(e)) => CaseOutcome::Error(e.to_string()),
                Ok(Ok(output)) if !output.status.success() => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    let msg = stderr.trim();
                    CaseOutcome::Error(if msg.is_empty() {
                        format!("process exited with {}", output.status)
                    } else {
                        msg.to_string()
                    })
                }
                Ok(Ok(output)) => {
                    let got = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    let expected = case.expected_output.trim().to_string();
                    if got == expected {
                        CaseOutcome::Passed
                    } else {
                        CaseOutcome::Mismatch { expected, got }
                    }
                }
            };

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove {}: {}", path.display(), e);
        }

        Ok(outcome)
    }
}

#[async_trait]
impl Evaluator for ProcessEvaluator {
    async fn grade(
        &self,
        code: &str,
        language: Language,
        test_cases: &[TestCase],
    ) -> Result<GradeReport, GradingError> {
        let mut lines = Vec::with_capacity(test_cases.len());
        let mut passed_count = 0;

        for case in test_cases {
            let outcome = self.run_case(code, language, case).await?;
            if outcome == CaseOutcome::Passed {
                passed_count += 1;
            }
            lines.push(outcome.line());
        }

        let total_count = test_cases.len() as u32;
        debug!("Graded {} submission: {}/{}", language, passed_count, total_count);

        Ok(GradeReport {
            // A question without cases proves nothing
            passed: total_count > 0 && passed_count == total_count,
            output: lines.join("\n"),
            passed_count,
            total_count,
        })
    }

    async fn estimate_complexity(
        &self,
        code: &str,
        language: Language,
    ) -> Result<ComplexityEstimate, GradingError> {
        Ok(complexity::estimate(code, language))
    }
}
