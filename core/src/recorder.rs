use crate::config::{ConfigurationStore, TriggerConfig};
use crate::decision::{DecisionOutcome, Interrupted, PostBuildDecision};
use crate::interpreter::{CommandInterpreter, Platform, ShellInterpreter};
use crate::interrupt::InterruptSignal;
use crate::logger::{BuildListener, LogLevel, Logger};
use crate::outcome::BuildOutcome;

/// What a host exposes about a finished build.
pub trait BuildContext {
    type Interpreter: CommandInterpreter;

    fn result(&self) -> Option<BuildOutcome>;
    fn log(&self) -> Option<&str>;
    fn platform(&self) -> Platform;
    fn interpreter(&self) -> &Self::Interpreter;
    fn listener(&self) -> &dyn BuildListener;
    fn interrupt(&self) -> &InterruptSignal;
}

/// Lock a post-build step needs while running. The recorder takes none, so
/// concurrent builds of the same job may run it side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStepMonitor {
    None,
}

#[derive(Debug, Clone, Default)]
pub struct Descriptor;

impl Descriptor {
    pub fn display_name(&self) -> &'static str {
        "SAT Analyzer Trigger"
    }

    pub fn is_applicable(&self, _project_kind: &str) -> bool {
        true
    }

    /// Binds submitted form data and persists it.
    pub fn configure<S: ConfigurationStore + ?Sized>(
        &self,
        form_data: &serde_json::Value,
        store: &S,
    ) -> anyhow::Result<TriggerConfig> {
        let config = TriggerConfig::from_form(form_data)?;
        store.save(&config)?;
        Ok(config)
    }
}

/// Post-build step that runs the configured script after eligible builds.
#[derive(Debug, Clone, Default)]
pub struct PostBuildRecorder {
    descriptor: Descriptor,
}

impl PostBuildRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Steps of this kind may run concurrently.
    pub fn required_monitor(&self) -> BuildStepMonitor {
        BuildStepMonitor::None
    }

    pub async fn run<C, S>(&self, build: &C, store: &S) -> DecisionOutcome
    where
        C: BuildContext,
        S: ConfigurationStore + ?Sized,
    {
        let listener = build.listener();

        let config = match store.load() {
            Ok(config) => config,
            Err(err) => {
                let message = format!("{:#}", err);
                listener.log(
                    LogLevel::Error,
                    &format!("Failed to load post build task configuration: {}", message),
                );
                return DecisionOutcome::Failed { message };
            }
        };

        PostBuildDecision::new(
            build.interpreter(),
            build.platform(),
            listener,
            build.interrupt(),
        )
        .decide(build.result(), build.log(), &config)
        .await
    }

    /// `Ok(true)` lets the build continue, `Ok(false)` marks it failed.
    pub async fn perform<C, S>(&self, build: &C, store: &S) -> Result<bool, Interrupted>
    where
        C: BuildContext,
        S: ConfigurationStore + ?Sized,
    {
        self.run(build, store).await.step_result()
    }
}

/// A build that finished on this machine.
pub struct LocalBuild<I = ShellInterpreter, L = Logger> {
    result: Option<BuildOutcome>,
    log: Option<String>,
    platform: Platform,
    interpreter: I,
    listener: L,
    interrupt: InterruptSignal,
}

impl LocalBuild {
    pub fn new(result: Option<BuildOutcome>, log: Option<String>) -> Self {
        Self {
            result,
            log,
            platform: Platform::current(),
            interpreter: ShellInterpreter::new(),
            listener: Logger::new(),
            interrupt: InterruptSignal::new(),
        }
    }
}

impl<I, L> LocalBuild<I, L> {
    pub fn with_interpreter<J>(self, interpreter: J) -> LocalBuild<J, L> {
        LocalBuild {
            result: self.result,
            log: self.log,
            platform: self.platform,
            interpreter,
            listener: self.listener,
            interrupt: self.interrupt,
        }
    }

    pub fn with_listener<M>(self, listener: M) -> LocalBuild<I, M> {
        LocalBuild {
            result: self.result,
            log: self.log,
            platform: self.platform,
            interpreter: self.interpreter,
            listener,
            interrupt: self.interrupt,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptSignal) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn listener_ref(&self) -> &L {
        &self.listener
    }
}

impl<I: CommandInterpreter, L: BuildListener> BuildContext for LocalBuild<I, L> {
    type Interpreter = I;

    fn result(&self) -> Option<BuildOutcome> {
        self.result
    }

    fn log(&self) -> Option<&str> {
        self.log.as_deref()
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn interpreter(&self) -> &I {
        &self.interpreter
    }

    fn listener(&self) -> &dyn BuildListener {
        &self.listener
    }

    fn interrupt(&self) -> &InterruptSignal {
        &self.interrupt
    }
}
