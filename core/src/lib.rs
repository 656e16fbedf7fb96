pub mod change;
pub mod cli;
pub mod config;
pub mod decision;
pub mod interpreter;
pub mod interrupt;
pub mod logger;
pub mod outcome;
pub mod recorder;

pub use change::{detect_code_change, trailing_revisions, ChangeDetector, LogHeuristic, RevisionPair};
pub use cli::{Cli, Commands};
pub use config::{Config, ConfigurationStore, MemoryConfigStore, TomlConfigStore, TriggerConfig};
pub use decision::{
    DecisionOutcome, DecisionState, ExecutionResult, Interrupted, PostBuildDecision, SkipReason,
};
pub use interpreter::{CommandInterpreter, ExecutionError, Platform, ScriptKind, ShellInterpreter};
pub use interrupt::InterruptSignal;
pub use logger::{BuildListener, LogLevel, Logger, MemoryListener};
pub use outcome::BuildOutcome;
pub use recorder::{BuildContext, BuildStepMonitor, Descriptor, LocalBuild, PostBuildRecorder};
