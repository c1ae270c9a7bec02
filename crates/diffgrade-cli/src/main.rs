//! diffgrade CLI
//!
//! Text tools and collaborator probes around the grading engine.
//!
//! ## Commands
//!
//! - `side-by-side`: Show two files as an aligned expected/actual table
//! - `compare-output`: Compare two captured outputs the way a spec would
//! - `style`: Run the style checker over a submitted class
//! - `exists`: Check that a file was submitted
//! - `leaderboard`: Compute the time-decay leaderboard value
//! - `config`: Print the effective configuration

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use diffgrade_core::{
    leaderboard, CommandFileProbe, CommandStyleChecker, FileProbe, GraderConfig, SideBySide,
    StructuralComparator, StyleChecker, DEFAULT_TOLERANCE,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "diffgrade")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Differential-testing autograder tools", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show two files side by side, line by line
    SideBySide {
        /// File holding the expected text
        expected: PathBuf,

        /// File holding the actual text
        actual: PathBuf,
    },

    /// Compare two captured outputs
    CompareOutput {
        expected: PathBuf,

        actual: PathBuf,

        /// Numeric tolerance for short numeric output
        #[arg(short, long, default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f64,

        /// Text printed above the diagnostic
        #[arg(long, default_value = "")]
        hint: String,
    },

    /// Run the style checker over a submitted class
    Style {
        /// Class name, with or without the .java suffix
        class_name: String,

        /// Submission directory (default: from configuration)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Style checker program (default: from configuration)
        #[arg(long)]
        checker: Option<String>,
    },

    /// Check that a file exists in the submission
    Exists {
        file_name: String,

        /// Submission directory (default: from configuration)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// Compute the leaderboard entry for a score
    Leaderboard {
        /// Points earned
        #[arg(long)]
        earned: f64,

        /// Points possible
        #[arg(long)]
        possible: f64,

        /// Submission metadata document (default: from configuration)
        #[arg(short, long)]
        metadata: Option<PathBuf>,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    diffgrade_core::telemetry::init_tracing(cli.json, level);

    let config = GraderConfig::from_env().context("Failed to read DIFFGRADE_* configuration")?;

    match cli.command {
        Commands::SideBySide { expected, actual } => cmd_side_by_side(&expected, &actual),
        Commands::CompareOutput {
            expected,
            actual,
            tolerance,
            hint,
        } => cmd_compare_output(&expected, &actual, tolerance, &hint),
        Commands::Style {
            class_name,
            root,
            checker,
        } => cmd_style(&config, &class_name, root, checker).await,
        Commands::Exists { file_name, root } => cmd_exists(&config, &file_name, root).await,
        Commands::Leaderboard {
            earned,
            possible,
            metadata,
        } => cmd_leaderboard(&config, earned, possible, metadata.as_deref()),
        Commands::Config => cmd_config(&config),
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

fn cmd_side_by_side(expected: &Path, actual: &Path) -> Result<()> {
    let table = SideBySide::from_text(&read(expected)?, &read(actual)?);
    print!("{}", table);
    Ok(())
}

/// Prints the mismatch and fails when the outputs differ.
fn cmd_compare_output(expected: &Path, actual: &Path, tolerance: f64, hint: &str) -> Result<()> {
    let comparator = StructuralComparator::new(tolerance);
    match comparator.compare_output(&read(expected)?, &read(actual)?, hint) {
        Ok(()) => {
            println!("Outputs match");
            Ok(())
        }
        Err(mismatch) => {
            println!("{}", mismatch);
            bail!("outputs differ")
        }
    }
}

async fn cmd_style(
    config: &GraderConfig,
    class_name: &str,
    root: Option<PathBuf>,
    checker: Option<String>,
) -> Result<()> {
    let style = CommandStyleChecker::new(
        checker.unwrap_or_else(|| config.style_checker.clone()),
        root.unwrap_or_else(|| config.submission_root.clone()),
        config.collaborator_timeout(),
    );
    let verdict = style
        .check(class_name)
        .await
        .with_context(|| format!("Style check of {} failed to run", class_name))?;

    print!("{}", verdict.output);
    if verdict.passed {
        info!(class_name = %class_name, "style check passed");
        Ok(())
    } else {
        bail!("style check failed: {}", verdict.summary)
    }
}

async fn cmd_exists(config: &GraderConfig, file_name: &str, root: Option<PathBuf>) -> Result<()> {
    let root = root.unwrap_or_else(|| config.submission_root.clone());
    let probe = CommandFileProbe::new(&root, config.collaborator_timeout());
    if probe.exists(file_name).await? {
        println!("{} found in {:?}", file_name, root);
        Ok(())
    } else {
        bail!("{} missing", file_name)
    }
}

fn cmd_leaderboard(
    config: &GraderConfig,
    earned: f64,
    possible: f64,
    metadata: Option<&Path>,
) -> Result<()> {
    let path = metadata.unwrap_or(config.metadata_path.as_path());
    let entry = leaderboard::compute(path, earned, possible);
    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}

fn cmd_config(config: &GraderConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["diffgrade", "exists", "Adder.java", "--verbose"])
            .expect("valid arguments");
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Exists { ref file_name, root: None } if file_name == "Adder.java"));
    }

    #[test]
    fn test_compare_output_defaults_tolerance() {
        let cli = Cli::try_parse_from(["diffgrade", "compare-output", "a.txt", "b.txt"])
            .expect("valid arguments");
        match cli.command {
            Commands::CompareOutput { tolerance, hint, .. } => {
                assert_eq!(tolerance, DEFAULT_TOLERANCE);
                assert!(hint.is_empty());
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_compare_output_command() {
        let dir = tempfile::tempdir().unwrap();
        let e = dir.path().join("expected.txt");
        let a = dir.path().join("actual.txt");
        std::fs::write(&e, "3.14159\n").unwrap();
        std::fs::write(&a, "3.142\n").unwrap();
        assert!(cmd_compare_output(&e, &a, DEFAULT_TOLERANCE, "").is_ok());

        std::fs::write(&a, "2.71\n").unwrap();
        assert!(cmd_compare_output(&e, &a, DEFAULT_TOLERANCE, "").is_err());
    }

    #[test]
    fn test_side_by_side_missing_file() {
        let err = cmd_side_by_side(Path::new("/nonexistent/a"), Path::new("/nonexistent/b"))
            .expect_err("missing input");
        assert!(err.to_string().contains("Failed to read"));
    }

    #[tokio::test]
    async fn test_exists_command() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Adder.java"), "class Adder {}").unwrap();
        let config = GraderConfig::default();
        let root = Some(dir.path().to_path_buf());
        assert!(cmd_exists(&config, "Adder.java", root.clone()).await.is_ok());
        assert!(cmd_exists(&config, "Bag.java", root).await.is_err());
    }
}
