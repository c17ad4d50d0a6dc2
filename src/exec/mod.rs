// ABOUTME: Subprocess execution engine for driving vendor CLIs.
// ABOUTME: Pluggable backend: real OS spawning or a deterministic mock for tests.

mod mock;
mod scoped_env;
mod system;

pub use mock::{MockRule, MockRunner};
pub use scoped_env::ScopedEnv;
pub use system::SystemRunner;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// One subprocess call: program, arguments, scoped environment, deadline.
///
/// `env` entries are merged on top of the parent environment when the
/// subprocess is spawned; the parent environment is never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn envs(mut self, vars: &HashMap<String, String>) -> Self {
        for (k, v) in vars {
            self.env.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// What a finished subprocess produced. Transient: consumed immediately by
/// the calling provider, never persisted.
#[derive(Debug, Clone)]
pub struct SubprocessResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl SubprocessResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Errors from attempting to run a subprocess.
///
/// A subprocess that ran and exited non-zero is NOT an error here: callers
/// get the `SubprocessResult` and decide. These variants mean the tool never
/// ran to completion, which callers must distinguish (absent tool routes to
/// the doctor; a timeout is retryable only for idempotent operations).
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("command not found: {program}")]
    NotFound { program: String },

    #[error("{program} timed out after {}s", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("failed to collect output from {program}: {source}")]
    Wait {
        program: String,
        source: std::io::Error,
    },
}

/// Execution backend. Real spawning in production, canned responses in tests.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion, capturing stdout/stderr.
    async fn run(&self, invocation: &Invocation) -> Result<SubprocessResult, ExecError>;

    /// Run with stdio inherited from the parent (interactive sessions such
    /// as `runpodctl connect`). Returns the exit code; no timeout applies.
    async fn run_interactive(&self, invocation: &Invocation) -> Result<i32, ExecError>;
}
