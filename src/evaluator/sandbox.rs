// src/evaluator/sandbox.rs — Isolated execution of generated programs
//
// Every program runs in a fresh interpreter process inside a throwaway
// directory with an empty environment. Whatever goes wrong (syntax errors,
// missing entry point, exceptions, infinite loops) comes back as `None`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::code::remove_prints;
use crate::infra::errors::MathselError;

/// Runs one program and reports its numeric result.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn run(&self, program: &str) -> Option<f64>;
}

/// Strip print statements, then execute. `None` on any failure.
pub async fn execute_and_get_answer(executor: &dyn CodeExecutor, code: &str) -> Option<f64> {
    let program = remove_prints(code);
    if program.trim().is_empty() {
        return None;
    }
    executor.run(&program).await
}

/// Reads the program from stdin, silences its stdout, calls `solution()` or
/// falls back to a top-level `result`, and writes one JSON line.
const RUNNER: &str = r#"
import contextlib
import io
import json
import math
import sys
import textwrap

_HOST_STDOUT = sys.stdout


def _emit(value, error=None):
    _HOST_STDOUT.write(json.dumps({"value": value, "error": error}) + "\n")
    _HOST_STDOUT.flush()


def _numeric(value):
    if isinstance(value, bool):
        return None
    try:
        value = float(value)
    except Exception:
        return None
    return value if math.isfinite(value) else None


def _run(code):
    try:
        compiled = compile(code, "<solution>", "exec")
    except IndentationError:
        compiled = compile(textwrap.dedent(code), "<solution>", "exec")
    ns = {"__name__": "__solution__"}
    exec(compiled, ns)
    entry = ns.get("solution")
    if callable(entry):
        return entry()
    return ns.get("result")


source = sys.stdin.read()
try:
    with contextlib.redirect_stdout(io.StringIO()):
        raw = _run(source)
    _emit(_numeric(raw))
except BaseException as exc:
    _emit(None, type(exc).__name__ + ": " + str(exc))
"#;

#[derive(Debug, Deserialize)]
struct RunnerReport {
    value: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

/// Read the runner's report from the last non-empty stdout line.
fn parse_runner_output(stdout: &str) -> Option<f64> {
    let line = stdout.lines().rev().find(|l| !l.trim().is_empty())?;
    let report: RunnerReport = serde_json::from_str(line.trim()).ok()?;
    if let Some(err) = &report.error {
        tracing::debug!(error = %err, "generated program raised");
    }
    report.value.filter(|v| v.is_finite())
}

/// Executes programs with a local Python interpreter.
pub struct PythonSandbox {
    python: PathBuf,
    timeout: Duration,
}

impl PythonSandbox {
    /// Resolve `python` on `PATH`. A missing interpreter is a configuration
    /// error: nothing program-based can run without it.
    pub fn new(python: &str, timeout: Duration) -> Result<Self, MathselError> {
        let python = which::which(python).map_err(|e| {
            MathselError::Config(format!("python interpreter '{python}' not found: {e}"))
        })?;
        Ok(Self { python, timeout })
    }

    pub fn interpreter(&self) -> &Path {
        &self.python
    }

    async fn execute(&self, program: &str) -> Result<Option<f64>, MathselError> {
        let workdir = tempfile::tempdir()?;

        let mut child = Command::new(&self.python)
            .arg("-I")
            .arg("-c")
            .arg(RUNNER)
            .current_dir(workdir.path())
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            MathselError::Other(anyhow::anyhow!("failed to capture interpreter stdin"))
        })?;
        stdin.write_all(program.as_bytes()).await?;
        stdin.shutdown().await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        Ok(parse_runner_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl CodeExecutor for PythonSandbox {
    async fn run(&self, program: &str) -> Option<f64> {
        // Dropping the timed-out future drops the child, which kills it.
        match tokio::time::timeout(self.timeout, self.execute(program)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "sandbox failed to run program");
                None
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "program timed out");
                None
            }
        }
    }
}
