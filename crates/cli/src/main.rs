use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Arc;

use squall_core::{Config, init_logging};
use squall_guard::{
    AutoApprove, ConfirmationCoordinator, ExecutionGate, ExecutionOutcome, PatternRegistry,
    PromptRenderer, RiskClassifier, SessionPolicyStore,
};
use squall_tools::SystemExecutor;

mod prompt;
use prompt::{StdinPrompt, paint_category};

#[derive(Parser)]
#[command(name = "squall", version, about = "Command-risk classification and confirmation engine")]
struct Cli {
    /// Path to squall.toml (defaults to ./squall.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a command and print the assessment without running it
    Check {
        /// The shell command to classify
        command: String,

        /// Working directory for classification context
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Print the assessment as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a command through the confirmation engine
    Run {
        /// The shell command to execute
        command: String,

        /// Working directory for the command
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Approve prompts automatically (blocked commands stay blocked)
        #[arg(long)]
        yes: bool,
    },

    /// Print an example configuration file
    ExampleConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => {
            let default = PathBuf::from("squall.toml");
            if default.exists() {
                Config::from_file(&default).context("failed to load ./squall.toml")
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn working_directory(cwd: Option<PathBuf>) -> Result<PathBuf> {
    match cwd {
        Some(path) => Ok(path),
        None => std::env::current_dir().context("failed to determine current directory"),
    }
}

fn build_gate(config: &Config, renderer: Arc<dyn PromptRenderer>) -> Result<ExecutionGate> {
    let registry = PatternRegistry::with_config(&config.security)?;
    let classifier = RiskClassifier::new(registry, &config.security);
    let coordinator = ConfirmationCoordinator::new(
        classifier,
        Arc::new(SessionPolicyStore::new()),
        renderer,
        &config.security,
    )?;
    Ok(ExecutionGate::new(Arc::new(coordinator), Arc::new(SystemExecutor), &config.security))
}

async fn check(config: &Config, command: &str, cwd: PathBuf, json: bool) -> Result<()> {
    let registry = PatternRegistry::with_config(&config.security)?;
    let classifier = RiskClassifier::new(registry, &config.security);
    let assessment = classifier.classify(command, &cwd);

    if json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
        return Ok(());
    }

    println!(
        "{} [{}] score {}",
        command.bold(),
        paint_category(assessment.category),
        assessment.risk_score
    );
    for factor in &assessment.risk_factors {
        println!("  - {}", factor);
    }
    for impact in &assessment.context.potential_impact {
        println!("  {} {}", "impact:".dimmed(), impact);
    }
    for suggestion in &assessment.context.mitigation_suggestions {
        println!("  {} {}", "hint:".dimmed(), suggestion);
    }
    if assessment.should_block {
        println!("{}", "would be blocked".bright_red());
    } else if assessment.requires_confirmation {
        println!("{}", "would prompt for confirmation".yellow());
    } else {
        println!("{}", "would run without confirmation".green());
    }

    Ok(())
}

async fn run(config: &Config, command: &str, cwd: PathBuf, yes: bool) -> Result<i32> {
    let renderer: Arc<dyn PromptRenderer> =
        if yes { Arc::new(AutoApprove) } else { Arc::new(StdinPrompt) };
    let gate = build_gate(config, renderer)?;

    let verdict = gate.request_execution(command, &cwd).await?;

    let exit_code = match verdict.outcome {
        Some(ExecutionOutcome::Completed { exit_code, stdout, stderr }) => {
            print!("{}", stdout);
            eprint!("{}", stderr);
            exit_code
        }
        Some(ExecutionOutcome::TimedOut { elapsed_ms }) => {
            eprintln!("{} execution timed out after {}ms", "error:".bright_red(), elapsed_ms);
            124
        }
        None => {
            let refusal = verdict.refusal.unwrap_or_else(|| "command refused".to_string());
            eprintln!("{} {}", "refused:".bright_red(), refusal);
            1
        }
    };

    gate.coordinator().end_session();
    Ok(exit_code)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let _log_guard = init_logging(Some(config.logging.clone()))?;

    let exit_code = match cli.command {
        Commands::Check { command, cwd, json } => {
            check(&config, &command, working_directory(cwd)?, json).await?;
            0
        }
        Commands::Run { command, cwd, yes } => {
            run(&config, &command, working_directory(cwd)?, yes).await?
        }
        Commands::ExampleConfig => {
            print!("{}", Config::example());
            0
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_missing_default_falls_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let config = load_config(None).unwrap();
        assert_eq!(config, Config::default());

        std::env::set_current_dir(original).unwrap();
    }

    #[test]
    fn test_load_config_from_explicit_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("squall.toml");
        std::fs::write(&path, "[security]\nconfirmation_timeout_ms = 5000\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.security.confirmation_timeout_ms, 5_000);
    }

    #[test]
    fn test_load_config_rejects_bad_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("squall.toml");
        std::fs::write(&path, "[security]\nalways_block_patterns = [\"[bad\"]\n").unwrap();

        assert!(load_config(Some(&path)).is_err());
    }

    #[tokio::test]
    async fn test_build_gate_with_defaults() {
        let config = Config::default();
        let gate = build_gate(&config, Arc::new(AutoApprove)).unwrap();

        let verdict = gate
            .request_execution("echo from-the-cli", &std::env::temp_dir())
            .await
            .unwrap();
        assert!(verdict.executed());
    }
}
