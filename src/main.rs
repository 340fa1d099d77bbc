//! label-juggler CLI
//!
//! Runs the webhook server or evaluates single issues from the command line

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use label_juggler::{
    config::{
        find_local_config, load_config_from_file, parse_repository, sample_config,
        DEFAULT_BIND_ADDRESS,
    },
    server::{run_server, AppState},
    Error, Evaluation, GitHubClient, GroupDefinition, GroupKey, GroupMatcher, JugglerConfig,
    LabelJuggler, Result, ServiceConfig,
};

/// label-juggler CLI
///
/// Keeps at most one label per configured group on issues and pull requests
#[derive(Parser)]
#[command(
    name = "label-juggler",
    version,
    about = "Keeps GitHub labels mutually exclusive within configured groups",
    long_about = "Removes labels that conflict with a newly applied label. Groups are read from \
    .github/label-juggler.yml in each repository, either as glob patterns or as lists of names."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// GitHub access token
    #[arg(short = 't', long, global = true)]
    access_token: Option<String>,

    /// Dry run mode (don't remove any labels)
    #[arg(long, global = true)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server
    Serve {
        /// Address to listen on
        #[arg(short = 'b', long, default_value = DEFAULT_BIND_ADDRESS)]
        bind: String,

        /// Webhook secret used to verify deliveries
        #[arg(long, env = "GITHUB_WEBHOOK_SECRET", hide_env_values = true)]
        webhook_secret: Option<String>,
    },

    /// Evaluate a single issue or pull request
    Evaluate {
        /// Target repository (owner/repo format)
        #[arg(short = 'r', long)]
        repository: Option<String>,

        /// Issue or pull request number
        #[arg(short = 'n', long)]
        number: u64,

        /// Node ID of the label to keep in its group
        #[arg(short = 'l', long)]
        label: Option<String>,
    },

    /// Validate a configuration file and show the group of each label
    Check {
        /// Configuration file path (defaults to .github/label-juggler.yml)
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Label names to match against the groups
        labels: Vec<String>,
    },

    /// Output a sample configuration
    Init {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Serve {
            bind,
            webhook_secret,
        } => {
            let config = ServiceConfig {
                access_token: get_access_token(cli.access_token)?,
                webhook_secret,
                bind_address: bind,
                dry_run: cli.dry_run,
            };
            run_serve(config).await
        }

        Commands::Evaluate {
            repository,
            number,
            label,
        } => {
            let token = get_access_token(cli.access_token)?;
            let repository = require_repository(repository)?;
            run_evaluate(token, repository, number, label, cli.dry_run, cli.verbose).await
        }

        Commands::Check { config, labels } => run_check(config, &labels),

        Commands::Init { output } => run_init(output),
    }
}

/// Initialize logging
///
/// `RUST_LOG` takes precedence over the verbosity flag
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("label_juggler={default_level},tower_http=info")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Execute serve command
async fn run_serve(config: ServiceConfig) -> Result<()> {
    config.validate()?;
    let addr = config.socket_addr()?;

    if config.webhook_secret.is_none() {
        tracing::warn!("No webhook secret configured, deliveries are not authenticated");
    }
    if config.dry_run {
        tracing::info!("Running in dry-run mode, no labels will be removed");
    }

    let client = GitHubClient::new(&config.access_token)?;
    let state = Arc::new(AppState::new(
        LabelJuggler::new(client, config.dry_run),
        config.webhook_secret,
    ));

    run_server(state, addr).await
}

/// Execute evaluate command
async fn run_evaluate(
    access_token: String,
    repository: String,
    number: u64,
    label: Option<String>,
    dry_run: bool,
    verbose: bool,
) -> Result<()> {
    let (owner, repo) = parse_repository(&repository)?;

    if verbose {
        println!(
            "{} Evaluating {}",
            "•".blue(),
            format!("{owner}/{repo}#{number}").cyan()
        );
        if dry_run {
            println!(
                "{} Running in dry-run mode (no changes will be made)",
                "!".yellow()
            );
        }
    }

    let client = GitHubClient::new(&access_token)?;
    let juggler = LabelJuggler::new(client, dry_run);
    let just_applied: HashSet<String> = label.into_iter().collect();

    let evaluation = juggler.evaluate(&owner, &repo, number, &just_applied).await?;
    display_evaluation(&evaluation);

    Ok(())
}

/// Execute check command
fn run_check(config_path: Option<PathBuf>, labels: &[String]) -> Result<()> {
    let path = match config_path.or_else(find_local_config) {
        Some(path) => path,
        None => {
            return Err(Error::configuration(
                "No configuration found. Use -c or run from a repository with .github/label-juggler.yml",
            ))
        }
    };

    let config = load_config_from_file(&path)?;
    let matcher = GroupMatcher::new(&config.groups)?;

    println!(
        "{} {} is valid ({} groups)",
        "✓".green(),
        path.display().to_string().cyan(),
        matcher.len()
    );

    for line in describe_groups(&config) {
        println!("  {}", line);
    }

    if !labels.is_empty() {
        println!();
        for label in labels {
            match matcher.match_group(label) {
                GroupKey::Group(index) => {
                    println!("  {} -> {}", label.cyan(), format!("group #{index}").green())
                }
                GroupKey::Ungrouped => println!("  {} -> {}", label.cyan(), "ungrouped".dimmed()),
            }
        }
    }

    Ok(())
}

/// One line per configured group
fn describe_groups(config: &JugglerConfig) -> Vec<String> {
    config
        .groups
        .iter()
        .enumerate()
        .map(|(index, group)| match group {
            GroupDefinition::Pattern(pattern) => {
                format!("#{index}: pattern {pattern}")
            }
            GroupDefinition::Literals(names) => {
                format!("#{index}: one of {}", names.join(", "))
            }
        })
        .collect()
}

/// Execute init command
fn run_init(output: Option<PathBuf>) -> Result<()> {
    let content = sample_config();

    match output {
        Some(output_path) => {
            write_sample(&output_path, content)?;
            println!(
                "{} Sample configuration written to: {}",
                "✓".green(),
                output_path.display().to_string().cyan()
            );
        }
        None => print!("{}", content),
    }

    Ok(())
}

fn write_sample(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Display evaluation results
fn display_evaluation(evaluation: &Evaluation) {
    if !evaluation.has_changes() {
        println!("\n{} No conflicting labels", "✓".green());
        return;
    }

    if evaluation.dry_run {
        println!("\n{} Conflicting labels (dry-run mode):", "📋".blue());
    } else {
        println!("\n{} Removed conflicting labels:", "✓".green());
    }

    for label in &evaluation.removed {
        println!("  🗑️ {} {}", label.name.red(), format!("({})", label.id).dimmed());
    }
}

/// Require a repository argument
fn require_repository(repo: Option<String>) -> Result<String> {
    repo.ok_or_else(|| {
        Error::config_validation("Repository is required. Use -r or --repository flag")
    })
}

/// Get access token
fn get_access_token(arg_token: Option<String>) -> Result<String> {
    arg_token
        .or_else(|| std::env::var("GITHUB_TOKEN").ok())
        .ok_or_else(|| Error::config_validation(
            "GitHub access token is required. Set via --access-token, GITHUB_TOKEN env var, or -t flag"
        ))
}
