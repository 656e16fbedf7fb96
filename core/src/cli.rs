use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::outcome::BuildOutcome;

#[derive(Parser, Debug)]
#[command(name = "sat-trigger")]
#[command(author, version, about = "Run a script after a build when the code changed", long_about = None)]
pub struct Cli {
    #[arg(
        short = 'C',
        long = "directory",
        value_name = "DIR",
        help = "Job workspace directory"
    )]
    pub workspace: Option<PathBuf>,

    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Run the post build task for a finished build")]
    Run {
        #[arg(
            short,
            long,
            value_name = "RESULT",
            help = "Build result (SUCCESS, UNSTABLE, FAILURE, NOT_BUILT, ABORTED)"
        )]
        result: Option<BuildOutcome>,

        #[arg(short, long, value_name = "FILE", help = "Build log file, '-' for stdin")]
        log: Option<PathBuf>,

        #[arg(short, long, help = "Script to run instead of the configured one")]
        script: Option<String>,

        #[arg(long, help = "Only run the script when the build log shows a code change")]
        run_if_changed: bool,

        #[arg(long, help = "Do not prefix output lines with a timestamp")]
        no_timestamps: bool,
    },

    #[command(about = "Report whether a build log shows a code change")]
    Check {
        #[arg(value_name = "FILE", help = "Build log file, '-' for stdin")]
        log: PathBuf,
    },

    #[command(about = "Bind JSON form data and save it as the job configuration")]
    Configure {
        #[arg(long, value_name = "JSON")]
        form: String,
    },

    #[command(about = "Initialize a new sat-trigger.toml configuration")]
    Init {
        #[arg(long, help = "Script to run after the build")]
        script: Option<String>,

        #[arg(long, help = "Only run the script when the code changed")]
        run_if_changed: bool,
    },

    #[command(about = "Show the effective configuration")]
    Show,
}

impl Cli {
    pub fn workspace_directory(&self) -> std::io::Result<PathBuf> {
        match &self.workspace {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "sat-trigger",
            "run",
            "--result",
            "unstable",
            "--log",
            "build.log",
            "--run-if-changed",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                result,
                log,
                script,
                run_if_changed,
                no_timestamps,
            } => {
                assert_eq!(result, Some(BuildOutcome::Unstable));
                assert_eq!(log, Some(PathBuf::from("build.log")));
                assert!(script.is_none());
                assert!(run_if_changed);
                assert!(!no_timestamps);
            }
            _ => panic!("Expected Run"),
        }
    }

    #[test]
    fn test_reject_unknown_result() {
        assert!(Cli::try_parse_from(["sat-trigger", "run", "--result", "GREEN"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["sat-trigger", "show", "--config", "/tmp/x.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
        assert!(matches!(cli.command, Commands::Show));
    }
}
