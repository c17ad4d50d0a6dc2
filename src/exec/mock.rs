// ABOUTME: Deterministic execution backend replaying canned vendor-CLI output.
// ABOUTME: Matches invocations by fixed-string containment, never flag parsing.

use super::{CommandRunner, ExecError, Invocation, SubprocessResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

/// A conditional mock: canned response for invocations of `program` whose
/// argument list contains every configured needle.
///
/// Matching is plain substring containment against the space-joined argument
/// list. Needles are data, never interpreted: a needle of `--version` is the
/// three characters `--v...`, not an option of the matcher. (An earlier shell
/// incarnation of this matcher piped arguments through grep and read exactly
/// such values as grep flags, producing auth-check false negatives.)
#[derive(Debug, Clone)]
pub struct MockRule {
    program: String,
    needles: Vec<String>,
    exit_code: i32,
    stdout: String,
    stderr: String,
}

impl MockRule {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            needles: Vec::new(),
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Require the joined argument list to contain this literal string.
    pub fn matching(mut self, needle: &str) -> Self {
        self.needles.push(needle.to_string());
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn stdout(mut self, stdout: &str) -> Self {
        self.stdout = stdout.to_string();
        self
    }

    pub fn stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.to_string();
        self
    }

    fn matches(&self, invocation: &Invocation) -> bool {
        if self.program != invocation.program {
            return false;
        }
        let joined = invocation.args.join(" ");
        self.needles.iter().all(|needle| joined.contains(needle))
    }
}

/// Execution backend for tests: replays [`MockRule`]s instead of touching
/// the operating system, and records every invocation for assertions.
///
/// A program with no rules at all behaves as an absent binary
/// ([`ExecError::NotFound`]); a known program whose arguments match no rule
/// fails with exit code 1 so a mis-mocked test fails loudly instead of
/// silently succeeding.
#[derive(Default)]
pub struct MockRunner {
    rules: Vec<MockRule>,
    log: Mutex<Vec<Invocation>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, rule: MockRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Every invocation seen so far, in call order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.log.lock().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.log.lock().len()
    }

    fn respond(&self, invocation: &Invocation) -> Result<SubprocessResult, ExecError> {
        self.log.lock().push(invocation.clone());

        let known_program = self
            .rules
            .iter()
            .any(|rule| rule.program == invocation.program);
        if !known_program {
            return Err(ExecError::NotFound {
                program: invocation.program.clone(),
            });
        }

        // First matching rule wins, in registration order.
        match self.rules.iter().find(|rule| rule.matches(invocation)) {
            Some(rule) => Ok(SubprocessResult {
                exit_code: rule.exit_code,
                stdout: rule.stdout.clone(),
                stderr: rule.stderr.clone(),
                duration: Duration::from_millis(1),
            }),
            None => Ok(SubprocessResult {
                exit_code: 1,
                stdout: String::new(),
                stderr: format!("no mock rule matched: {invocation}"),
                duration: Duration::from_millis(1),
            }),
        }
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, invocation: &Invocation) -> Result<SubprocessResult, ExecError> {
        self.respond(invocation)
    }

    async fn run_interactive(&self, invocation: &Invocation) -> Result<i32, ExecError> {
        self.respond(invocation).map(|result| result.exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_matching_rule_wins() {
        let runner = MockRunner::new()
            .rule(MockRule::new("tool").matching("alpha").stdout("a"))
            .rule(MockRule::new("tool").stdout("fallback"));

        let out = runner
            .run(&Invocation::new("tool", ["alpha", "beta"]))
            .await
            .unwrap();
        assert_eq!(out.stdout, "a");

        let out = runner
            .run(&Invocation::new("tool", ["gamma"]))
            .await
            .unwrap();
        assert_eq!(out.stdout, "fallback");
    }

    #[tokio::test]
    async fn unknown_program_reports_not_found() {
        let runner = MockRunner::new().rule(MockRule::new("runpodctl"));

        let err = runner
            .run(&Invocation::new("northflank", ["version"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::NotFound { .. }));
    }

    #[tokio::test]
    async fn known_program_with_unmatched_args_fails_loudly() {
        let runner = MockRunner::new().rule(MockRule::new("tool").matching("expected"));

        let out = runner
            .run(&Invocation::new("tool", ["unexpected"]))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 1);
        assert!(out.stderr.contains("no mock rule matched"));
    }

    #[tokio::test]
    async fn flag_like_needles_are_literal_strings() {
        // Regression: the matcher must treat `--version` as data. A matcher
        // that fed needles to an option-parsing tool would choke here or,
        // worse, match the wrong invocations.
        let runner = MockRunner::new()
            .rule(MockRule::new("tool").matching("--version").stdout("1.2.3"));

        let hit = runner
            .run(&Invocation::new("tool", ["--version"]))
            .await
            .unwrap();
        assert_eq!(hit.exit_code, 0);
        assert_eq!(hit.stdout, "1.2.3");

        let miss = runner
            .run(&Invocation::new("tool", ["--help"]))
            .await
            .unwrap();
        assert_eq!(miss.exit_code, 1);
    }

    #[tokio::test]
    async fn records_invocations_in_order() {
        let runner = MockRunner::new().rule(MockRule::new("tool"));

        runner
            .run(&Invocation::new("tool", ["first"]))
            .await
            .unwrap();
        runner
            .run(&Invocation::new("tool", ["second"]))
            .await
            .unwrap();

        let log = runner.invocations();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].args, vec!["first"]);
        assert_eq!(log[1].args, vec!["second"]);
    }
}
