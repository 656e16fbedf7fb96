use std::borrow::Cow;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::interrupt::InterruptSignal;
use crate::logger::{BuildListener, LogLevel};

const TERMINATE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(unix) {
            Platform::Unix
        } else {
            Platform::Windows
        }
    }

    pub fn is_unix(&self) -> bool {
        *self == Platform::Unix
    }
}

/// How a script is written to disk and launched on a given platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Shell,
    BatchFile,
}

impl ScriptKind {
    pub fn for_platform(platform: Platform) -> Self {
        if platform.is_unix() {
            ScriptKind::Shell
        } else {
            ScriptKind::BatchFile
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ScriptKind::Shell => ".sh",
            ScriptKind::BatchFile => ".bat",
        }
    }

    pub fn contents(&self, script: &str) -> String {
        match self {
            ScriptKind::Shell => script.replace("\r\n", "\n"),
            ScriptKind::BatchFile => format!("{}\r\nexit %ERRORLEVEL%", script),
        }
    }

    /// Command line running the script stored at `script_path`. A shell
    /// script starting with `#!` is run by the interpreter it names.
    pub fn command_line(&self, script: &str, script_path: &Path) -> Vec<String> {
        let path = script_path.display().to_string();

        match self {
            ScriptKind::Shell => {
                if let Some(shebang) = script.strip_prefix("#!") {
                    let first_line = shebang.lines().next().unwrap_or_default();
                    let mut cmd: Vec<String> =
                        first_line.split_whitespace().map(str::to_string).collect();
                    if !cmd.is_empty() {
                        cmd.push(path);
                        return cmd;
                    }
                }
                vec!["sh".to_string(), "-xe".to_string(), path]
            }
            ScriptKind::BatchFile => vec![
                "cmd".to_string(),
                "/c".to_string(),
                "call".to_string(),
                path,
            ],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("failed to write script file: {0}")]
    ScriptFile(#[source] io::Error),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error while running script: {0}")]
    Io(#[from] io::Error),

    #[error("script execution interrupted")]
    Interrupted,
}

/// Runs script text with the platform's command interpreter.
///
/// Returns `Ok(true)` when the script exits successfully and `Ok(false)` when
/// it exits with a failure. Output goes to `listener`. If `interrupt` fires
/// while the script is running, the process is terminated and
/// [`ExecutionError::Interrupted`] is returned.
#[allow(async_fn_in_trait)]
pub trait CommandInterpreter {
    async fn run_script(
        &self,
        script: &str,
        platform: Platform,
        listener: &dyn BuildListener,
        interrupt: &InterruptSignal,
    ) -> Result<bool, ExecutionError>;
}

/// Launches scripts as local child processes.
#[derive(Debug, Clone, Default)]
pub struct ShellInterpreter {
    working_dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl ShellInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    fn write_script(kind: ScriptKind, script: &str) -> Result<tempfile::TempPath, ExecutionError> {
        let mut file = tempfile::Builder::new()
            .prefix("sat-trigger")
            .suffix(kind.extension())
            .tempfile()
            .map_err(ExecutionError::ScriptFile)?;

        file.write_all(kind.contents(script).as_bytes())
            .map_err(ExecutionError::ScriptFile)?;
        file.flush().map_err(ExecutionError::ScriptFile)?;

        Ok(file.into_temp_path())
    }
}

impl CommandInterpreter for ShellInterpreter {
    async fn run_script(
        &self,
        script: &str,
        platform: Platform,
        listener: &dyn BuildListener,
        interrupt: &InterruptSignal,
    ) -> Result<bool, ExecutionError> {
        let kind = ScriptKind::for_platform(platform);
        // Removed from disk when dropped, after the process has exited.
        let script_path = Self::write_script(kind, script)?;
        let command = kind.command_line(script, &script_path);
        let program = &command[0];

        let mut cmd = Command::new(program);
        cmd.args(&command[1..])
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so an interrupt reaches everything the script started.
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| ExecutionError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "failed to capture stderr"))?;

        let mut stdout_lines = BufReader::new(stdout).split(b'\n');
        let mut stderr_lines = BufReader::new(stderr).split(b'\n');
        let mut stdout_open = true;
        let mut stderr_open = true;

        while stdout_open || stderr_open {
            let interrupted = tokio::select! {
                line = stdout_lines.next_segment(), if stdout_open => {
                    match line? {
                        Some(line) => listener.println(&decode_line(&line)),
                        None => stdout_open = false,
                    }
                    false
                }
                line = stderr_lines.next_segment(), if stderr_open => {
                    match line? {
                        Some(line) => listener.log(LogLevel::Error, &decode_line(&line)),
                        None => stderr_open = false,
                    }
                    false
                }
                _ = interrupt.interrupted() => true,
            };

            if interrupted {
                terminate(&mut child).await;
                return Err(ExecutionError::Interrupted);
            }
        }

        let status = tokio::select! {
            status = child.wait() => Some(status?),
            _ = interrupt.interrupted() => None,
        };
        let Some(status) = status else {
            terminate(&mut child).await;
            return Err(ExecutionError::Interrupted);
        };

        report_status(&status, listener);
        Ok(status.success())
    }
}

/// Output is forwarded even when it is not valid UTF-8.
fn decode_line(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes)
}

async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            // The child leads its own process group.
            let group = Pid::from_raw(pid as i32);
            let _ = killpg(group, Signal::SIGTERM);
            let exited = tokio::time::timeout(TERMINATE_GRACE, child.wait())
                .await
                .is_ok();
            if exited {
                return;
            }
            let _ = killpg(group, Signal::SIGKILL);
        }
    }

    let _ = child.kill().await;
}

fn report_status(status: &ExitStatus, listener: &dyn BuildListener) {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            let signal_name = match signal {
                1 => "SIGHUP",
                2 => "SIGINT",
                3 => "SIGQUIT",
                6 => "SIGABRT",
                9 => "SIGKILL",
                11 => "SIGSEGV",
                13 => "SIGPIPE",
                15 => "SIGTERM",
                _ => "unknown signal",
            };
            listener.log(
                LogLevel::Error,
                &format!("Process terminated by signal {} ({})", signal, signal_name),
            );
            return;
        }
    }

    match status.code() {
        Some(0) => {}
        Some(code) => listener.log(
            LogLevel::Warning,
            &format!("Process exited with code: {}", code),
        ),
        None => listener.log(LogLevel::Error, "Process terminated abnormally (no exit code)"),
    }
}
