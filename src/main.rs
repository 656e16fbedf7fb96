use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use sat_trigger_core::{
    trailing_revisions, BuildListener, Cli, Commands, Config, ConfigurationStore, Descriptor,
    InterruptSignal, LocalBuild, LogLevel, Logger, MemoryConfigStore, PostBuildRecorder,
    TomlConfigStore, TriggerConfig,
};

const EXIT_FAILED: u8 = 1;
const EXIT_INTERRUPTED: u8 = 130;

fn config_path(cli: &Cli) -> Result<PathBuf> {
    let workspace = cli
        .workspace_directory()
        .context("Failed to resolve workspace directory")?;
    Ok(Config::locate(cli.config.as_deref(), &workspace))
}

fn read_log(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("Failed to read build log from stdin")?;
        return Ok(String::from_utf8_lossy(&bytes).into_owned());
    }

    // Build logs carry whatever the tools printed, not necessarily UTF-8.
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read build log: {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn run_post_build(
    cli: &Cli,
    result: Option<sat_trigger_core::BuildOutcome>,
    log: Option<&Path>,
    script: Option<&str>,
    run_if_changed: bool,
    no_timestamps: bool,
) -> Result<ExitCode> {
    let path = config_path(cli)?;
    let config = Config::load_from_file(&path)?;

    let logger = Logger::new()
        .with_colors(config.display.colors && atty::is(atty::Stream::Stdout))
        .with_timestamps(config.display.show_timestamps && !no_timestamps);

    let log = log.map(read_log).transpose()?;

    let store: Box<dyn ConfigurationStore> = if script.is_some() || run_if_changed {
        Box::new(MemoryConfigStore::new(
            config.trigger.with_overrides(script, run_if_changed),
        ))
    } else {
        Box::new(TomlConfigStore::new(&path))
    };

    let mut interpreter = sat_trigger_core::ShellInterpreter::new();
    if let Some(dir) = &cli.workspace {
        interpreter = interpreter.with_working_dir(dir);
    }

    let interrupt = InterruptSignal::new();
    let ctrl_c = interrupt.interrupt_on_ctrl_c();

    let build = LocalBuild::new(result, log)
        .with_interpreter(interpreter)
        .with_listener(logger)
        .with_interrupt(interrupt);

    let outcome = PostBuildRecorder::new().perform(&build, store.as_ref()).await;
    ctrl_c.abort();

    match outcome {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::from(EXIT_FAILED)),
        Err(interrupted) => {
            build.listener_ref().log(LogLevel::Warning, &interrupted.to_string());
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}

fn check_log(path: &Path) -> Result<ExitCode> {
    let log = read_log(path)?;

    match trailing_revisions(Some(&log)) {
        Some(pair) if pair.differs() => {
            println!("Code changed: {} (previous {})", pair.checkout, pair.previous);
        }
        Some(pair) => {
            println!("No code change: {}", pair.checkout);
        }
        None => {
            println!("No code change: log does not end with a checkout and rev-list");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn configure(cli: &Cli, form: &str) -> Result<ExitCode> {
    let form_data: serde_json::Value =
        serde_json::from_str(form).context("Form data is not valid JSON")?;
    let path = config_path(cli)?;
    let store = TomlConfigStore::new(&path);

    let config = Descriptor.configure(&form_data, &store)?;

    println!("Saved configuration to {}", path.display());
    println!("  script: {}", config.script);
    println!(
        "  run_if_job_code_base_changed: {}",
        config.run_if_job_code_base_changed
    );

    Ok(ExitCode::SUCCESS)
}

fn init_config(cli: &Cli, script: Option<String>, run_if_changed: bool) -> Result<ExitCode> {
    let workspace = cli
        .workspace_directory()
        .context("Failed to resolve workspace directory")?;
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| workspace.join(sat_trigger_core::config::CONFIG_FILE_NAME));

    if path.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first if you want to reinitialize.",
            path.display()
        );
    }

    let mut config = Config::default();
    config.trigger = TriggerConfig::new(script.unwrap_or_default(), run_if_changed);

    config
        .save_to_file(&path)
        .context("Failed to save configuration")?;

    println!("Created {}", path.display());

    Ok(ExitCode::SUCCESS)
}

fn show_config(cli: &Cli) -> Result<ExitCode> {
    let path = config_path(cli)?;
    let trigger = TomlConfigStore::new(&path).load()?;

    println!("{}", PostBuildRecorder::new().descriptor().display_name());
    println!("  config: {}", path.display());
    println!("  script: {}", trigger.script);
    println!(
        "  run_if_job_code_base_changed: {}",
        trigger.run_if_job_code_base_changed
    );

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run {
            result,
            log,
            script,
            run_if_changed,
            no_timestamps,
        } => {
            run_post_build(
                &cli,
                *result,
                log.as_deref(),
                script.as_deref(),
                *run_if_changed,
                *no_timestamps,
            )
            .await
        }
        Commands::Check { log } => check_log(log),
        Commands::Configure { form } => configure(&cli, form),
        Commands::Init {
            script,
            run_if_changed,
        } => init_config(&cli, script.clone(), *run_if_changed),
        Commands::Show => show_config(&cli),
    }
}
