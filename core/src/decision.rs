use std::fmt;

use crate::change::{ChangeDetector, LogHeuristic};
use crate::config::TriggerConfig;
use crate::interpreter::{CommandInterpreter, ExecutionError, Platform};
use crate::interrupt::InterruptSignal;
use crate::logger::{BuildListener, LogLevel};
use crate::outcome::BuildOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ResultTooSevere(BuildOutcome),
    NoCodeChange,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ResultTooSevere(outcome) => {
                write!(f, "build result {} is worse than UNSTABLE", outcome)
            }
            SkipReason::NoCodeChange => write!(f, "no code change since the previous build"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionResult {
    pub succeeded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    Skipped(SkipReason),
    Executed(ExecutionResult),
    /// The script could not be run at all.
    Failed {
        message: String,
    },
    Cancelled,
}

/// Terminal state of a decision. A decision is pending only while `decide`
/// runs, so there is no variant for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionState {
    Skipped,
    ExecutedOk,
    ExecutedFailed,
    Failed,
    Cancelled,
}

/// The host was interrupted while the post-build task ran. The build should
/// be marked aborted rather than failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("post build task interrupted")]
pub struct Interrupted;

impl DecisionOutcome {
    pub fn state(&self) -> DecisionState {
        match self {
            DecisionOutcome::Skipped(_) => DecisionState::Skipped,
            DecisionOutcome::Executed(ExecutionResult { succeeded: true }) => {
                DecisionState::ExecutedOk
            }
            DecisionOutcome::Executed(ExecutionResult { succeeded: false }) => {
                DecisionState::ExecutedFailed
            }
            DecisionOutcome::Failed { .. } => DecisionState::Failed,
            DecisionOutcome::Cancelled => DecisionState::Cancelled,
        }
    }

    /// Result reported to the host's build-step protocol: `Ok(true)` lets the
    /// build continue, `Ok(false)` marks it failed.
    pub fn step_result(&self) -> Result<bool, Interrupted> {
        match self {
            DecisionOutcome::Skipped(_) => Ok(true),
            DecisionOutcome::Executed(result) => Ok(result.succeeded),
            DecisionOutcome::Failed { .. } => Ok(false),
            DecisionOutcome::Cancelled => Err(Interrupted),
        }
    }
}

/// Decides whether the configured script runs after a build, and runs it.
pub struct PostBuildDecision<'a, I> {
    interpreter: &'a I,
    platform: Platform,
    listener: &'a dyn BuildListener,
    interrupt: &'a InterruptSignal,
    detector: Box<dyn ChangeDetector + 'a>,
}

impl<'a, I: CommandInterpreter> PostBuildDecision<'a, I> {
    pub fn new(
        interpreter: &'a I,
        platform: Platform,
        listener: &'a dyn BuildListener,
        interrupt: &'a InterruptSignal,
    ) -> Self {
        Self {
            interpreter,
            platform,
            listener,
            interrupt,
            detector: Box::new(LogHeuristic),
        }
    }

    pub fn with_change_detector(mut self, detector: impl ChangeDetector + 'a) -> Self {
        self.detector = Box::new(detector);
        self
    }

    pub async fn decide(
        &self,
        outcome: Option<BuildOutcome>,
        log: Option<&str>,
        config: &TriggerConfig,
    ) -> DecisionOutcome {
        let listener = self.listener;

        listener.println("Performing post build task...");
        listener.println(&format!(
            "Build result: {}",
            outcome.map_or_else(|| "UNKNOWN".to_string(), |o| o.to_string())
        ));
        listener.log(
            LogLevel::Debug,
            &format!(
                "Script: {} | run only if code changed: {}",
                config.script, config.run_if_job_code_base_changed
            ),
        );

        if let Some(outcome) = outcome.filter(|o| o.is_worse_than(BuildOutcome::Unstable)) {
            listener.log(
                LogLevel::Warning,
                &format!(
                    "Skipping post build task - job status is worse than unstable : {}",
                    outcome
                ),
            );
            return DecisionOutcome::Skipped(SkipReason::ResultTooSevere(outcome));
        }

        if config.run_if_job_code_base_changed {
            listener.println("Checking code changes between previous build and current build");
            if !self.detector.code_changed(log) {
                listener.println(
                    "There are no code changes between previous build and current build, skipping script",
                );
                return DecisionOutcome::Skipped(SkipReason::NoCodeChange);
            }
        }

        listener.println(&format!("Running script : {}", config.script));

        match self
            .interpreter
            .run_script(&config.script, self.platform, listener, self.interrupt)
            .await
        {
            Ok(succeeded) => {
                let (level, status) = if succeeded {
                    (LogLevel::Info, "SUCCESS")
                } else {
                    (LogLevel::Error, "FAILURE")
                };
                listener.log(level, &format!("POST BUILD TASK : {}", status));
                listener.println("END OF POST BUILD TASK");
                DecisionOutcome::Executed(ExecutionResult { succeeded })
            }
            Err(ExecutionError::Interrupted) => {
                listener.log(LogLevel::Warning, "Post build task interrupted");
                DecisionOutcome::Cancelled
            }
            Err(err) => {
                let message = err.to_string();
                listener.log(
                    LogLevel::Error,
                    &format!("Exception when executing the script : {}", message),
                );
                DecisionOutcome::Failed { message }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::logger::MemoryListener;
    use std::cell::{Cell, RefCell};
    use std::io;

    pub(crate) enum Response {
        Exit(bool),
        IoError(&'static str),
        Interrupted,
    }

    pub(crate) struct FakeInterpreter {
        response: Response,
        pub(crate) scripts: RefCell<Vec<String>>,
    }

    impl FakeInterpreter {
        pub(crate) fn new(response: Response) -> Self {
            Self {
                response,
                scripts: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.scripts.borrow().len()
        }
    }

    impl CommandInterpreter for FakeInterpreter {
        async fn run_script(
            &self,
            script: &str,
            _platform: Platform,
            _listener: &dyn BuildListener,
            _interrupt: &InterruptSignal,
        ) -> Result<bool, ExecutionError> {
            self.scripts.borrow_mut().push(script.to_string());
            match self.response {
                Response::Exit(ok) => Ok(ok),
                Response::IoError(message) => Err(ExecutionError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    message,
                ))),
                Response::Interrupted => Err(ExecutionError::Interrupted),
            }
        }
    }

    const CHANGED_LOG: &str = " > git checkout -f 4f2c9e1\n > git rev-list 9b0d3aa\n";
    const UNCHANGED_LOG: &str = " > git checkout -f 4f2c9e1\n > git rev-list 4f2c9e1\n";

    async fn decide_with(
        interpreter: &FakeInterpreter,
        listener: &MemoryListener,
        outcome: Option<BuildOutcome>,
        log: Option<&str>,
        config: &TriggerConfig,
    ) -> DecisionOutcome {
        let interrupt = InterruptSignal::new();
        let result = PostBuildDecision::new(interpreter, Platform::Unix, listener, &interrupt)
            .decide(outcome, log, config)
            .await;
        result
    }

    #[tokio::test]
    async fn test_severe_results_skip_without_running() {
        for outcome in [
            BuildOutcome::Failure,
            BuildOutcome::NotBuilt,
            BuildOutcome::Aborted,
        ] {
            let interpreter = FakeInterpreter::new(Response::Exit(true));
            let listener = MemoryListener::new();
            let config = TriggerConfig::new("make scan", false);

            let result = decide_with(&interpreter, &listener, Some(outcome), None, &config).await;

            assert_eq!(
                result,
                DecisionOutcome::Skipped(SkipReason::ResultTooSevere(outcome))
            );
            assert_eq!(interpreter.calls(), 0);
            assert!(listener.contains("worse than unstable"));
        }
    }

    #[tokio::test]
    async fn test_success_unstable_and_unknown_results_run() {
        for outcome in [Some(BuildOutcome::Success), Some(BuildOutcome::Unstable), None] {
            let interpreter = FakeInterpreter::new(Response::Exit(true));
            let listener = MemoryListener::new();
            let config = TriggerConfig::new("make scan", false);

            let result = decide_with(&interpreter, &listener, outcome, None, &config).await;

            assert_eq!(
                result,
                DecisionOutcome::Executed(ExecutionResult { succeeded: true })
            );
            assert_eq!(*interpreter.scripts.borrow(), vec!["make scan".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_detector_not_consulted_when_flag_off() {
        let interpreter = FakeInterpreter::new(Response::Exit(true));
        let listener = MemoryListener::new();
        let interrupt = InterruptSignal::new();
        let consulted = Cell::new(0);
        let config = TriggerConfig::new("make scan", false);

        let result = PostBuildDecision::new(&interpreter, Platform::Unix, &listener, &interrupt)
            .with_change_detector(|_log: Option<&str>| {
                consulted.set(consulted.get() + 1);
                false
            })
            .decide(Some(BuildOutcome::Success), Some(UNCHANGED_LOG), &config)
            .await;

        assert_eq!(consulted.get(), 0);
        assert_eq!(result.state(), DecisionState::ExecutedOk);
    }

    #[tokio::test]
    async fn test_no_code_change_skips() {
        let interpreter = FakeInterpreter::new(Response::Exit(true));
        let listener = MemoryListener::new();
        let config = TriggerConfig::new("make scan", true);

        let result = decide_with(
            &interpreter,
            &listener,
            Some(BuildOutcome::Success),
            Some(UNCHANGED_LOG),
            &config,
        )
        .await;

        assert_eq!(result, DecisionOutcome::Skipped(SkipReason::NoCodeChange));
        assert_eq!(result.step_result(), Ok(true));
        assert_eq!(interpreter.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_log_counts_as_no_change() {
        let interpreter = FakeInterpreter::new(Response::Exit(true));
        let listener = MemoryListener::new();
        let config = TriggerConfig::new("make scan", true);

        let result = decide_with(&interpreter, &listener, None, None, &config).await;

        assert_eq!(result.state(), DecisionState::Skipped);
        assert_eq!(interpreter.calls(), 0);
    }

    #[tokio::test]
    async fn test_code_change_runs_script() {
        let interpreter = FakeInterpreter::new(Response::Exit(true));
        let listener = MemoryListener::new();
        let config = TriggerConfig::new("make scan", true);

        let result = decide_with(
            &interpreter,
            &listener,
            Some(BuildOutcome::Unstable),
            Some(CHANGED_LOG),
            &config,
        )
        .await;

        assert_eq!(result.state(), DecisionState::ExecutedOk);
        assert!(listener.contains("Running script : make scan"));
        assert!(listener.contains("POST BUILD TASK : SUCCESS"));
        assert!(listener.contains("END OF POST BUILD TASK"));
    }

    #[tokio::test]
    async fn test_failing_script_maps_to_failure() {
        let interpreter = FakeInterpreter::new(Response::Exit(false));
        let listener = MemoryListener::new();
        let config = TriggerConfig::new("exit 1", false);

        let result = decide_with(&interpreter, &listener, None, None, &config).await;

        assert_eq!(
            result,
            DecisionOutcome::Executed(ExecutionResult { succeeded: false })
        );
        assert_eq!(result.state(), DecisionState::ExecutedFailed);
        assert_eq!(result.step_result(), Ok(false));
        assert!(listener.contains("POST BUILD TASK : FAILURE"));
    }

    #[tokio::test]
    async fn test_execution_error_logged_once() {
        let interpreter = FakeInterpreter::new(Response::IoError("disk on fire"));
        let listener = MemoryListener::new();
        let config = TriggerConfig::new("make scan", false);

        let result = decide_with(&interpreter, &listener, None, None, &config).await;

        assert_eq!(result.state(), DecisionState::Failed);
        assert_eq!(result.step_result(), Ok(false));
        assert_eq!(listener.count_containing("disk on fire"), 1);
    }

    #[tokio::test]
    async fn test_interruption_is_cancelled_not_failed() {
        let interpreter = FakeInterpreter::new(Response::Interrupted);
        let listener = MemoryListener::new();
        let config = TriggerConfig::new("sleep 100", false);

        let result = decide_with(&interpreter, &listener, None, None, &config).await;

        assert_eq!(result, DecisionOutcome::Cancelled);
        assert_eq!(result.step_result(), Err(Interrupted));
    }

    #[tokio::test]
    async fn test_decide_is_repeatable() {
        let interpreter = FakeInterpreter::new(Response::Exit(true));
        let config = TriggerConfig::new("make scan", true);

        let first = decide_with(
            &interpreter,
            &MemoryListener::new(),
            Some(BuildOutcome::Success),
            Some(CHANGED_LOG),
            &config,
        )
        .await;
        let second = decide_with(
            &interpreter,
            &MemoryListener::new(),
            Some(BuildOutcome::Success),
            Some(CHANGED_LOG),
            &config,
        )
        .await;

        assert_eq!(first, second);
    }

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::ResultTooSevere(BuildOutcome::Failure);
        assert_eq!(reason.to_string(), "build result FAILURE is worse than UNSTABLE");
    }
}
