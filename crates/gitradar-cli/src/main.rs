use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use gitradar_core::runtime::{load_branches, load_diff, load_divergence, load_graph};
use gitradar_core::{
    Config, ConfigStore, DiffLine, GitBackend, GitRunner, RepositoryBackend, SearchQuery,
    demo_repository, filter_commits,
};
use log::info;

mod logging;
mod render;
mod tui;

#[derive(Debug, Parser)]
#[command(name = "git-radar", version)]
#[command(about = "Read-only terminal inspector for git branches and history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactive dashboard (the default)
    Tui(TuiCmd),
    /// Sorted branch list as JSON
    Branches(RepoArgs),
    /// Commit graph of a branch as JSON
    Graph(GraphCmd),
    /// Merge base, incoming and outgoing commits between two branches as JSON
    Divergence(DivergenceCmd),
    /// Classified, collapsed diff of one file in one commit
    Diff(DiffCmd),
    Config(ConfigCmd),
}

#[derive(Debug, Default, Args)]
struct RepoArgs {
    #[arg(long)]
    repo: Option<PathBuf>,
}

#[derive(Debug, Default, Args)]
struct TuiCmd {
    #[command(flatten)]
    repo: RepoArgs,
    /// Branch to show first instead of the checked-out one
    #[arg(long)]
    branch: Option<String>,
    #[arg(long)]
    limit: Option<usize>,
    /// Browse a built-in sample repository
    #[arg(long)]
    demo: bool,
}

#[derive(Debug, Args)]
struct GraphCmd {
    #[command(flatten)]
    repo: RepoArgs,
    #[arg(long)]
    branch: Option<String>,
    #[arg(long)]
    limit: Option<usize>,
    /// Keep only commits whose message, short id or author match
    #[arg(long)]
    search: Option<String>,
    #[arg(long, requires = "search")]
    regex: bool,
    #[arg(long, requires = "search")]
    case_sensitive: bool,
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Args)]
struct DivergenceCmd {
    #[command(flatten)]
    repo: RepoArgs,
    #[arg(long)]
    target: String,
    /// Defaults to the checked-out branch
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Args)]
struct DiffCmd {
    #[command(flatten)]
    repo: RepoArgs,
    #[arg(long)]
    commit: String,
    #[arg(long)]
    path: String,
}

#[derive(Debug, Subcommand)]
enum ConfigSubcommand {
    /// Print the config file location
    Path,
    /// Print the effective configuration
    Show,
    /// Write a config file with the defaults
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
struct ConfigCmd {
    #[command(subcommand)]
    subcommand: ConfigSubcommand,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Tui(TuiCmd::default()));
    match &command {
        Commands::Tui(_) => logging::init_to_file(),
        _ => logging::init_stderr(),
    }
    run(command)
}

fn run(command: Commands) -> Result<()> {
    let store = ConfigStore::default_store().context("failed to resolve config path")?;
    let mut config = store.load().context("failed to load config")?;

    match command {
        Commands::Tui(cmd) => {
            if let Some(limit) = cmd.limit {
                config.log_limit = limit;
            }
            config.validate()?;
            let backend: Arc<dyn RepositoryBackend> = if cmd.demo {
                info!("starting in demo mode");
                Arc::new(demo_repository(Utc::now().timestamp())?)
            } else {
                Arc::new(open_backend(&cmd.repo, &config)?)
            };
            tui::run(backend, config, cmd.branch).context("dashboard failed")?;
        }
        Commands::Branches(repo) => {
            let backend = open_backend(&repo, &config)?;
            let listing = load_branches(&backend).context("failed to list branches")?;
            println!("{}", serde_json::to_string_pretty(&listing.branches)?);
        }
        Commands::Graph(cmd) => {
            if let Some(limit) = cmd.limit {
                config.log_limit = limit;
            }
            config.validate()?;
            let backend = open_backend(&cmd.repo, &config)?;
            let reference = match cmd.branch {
                Some(branch) => branch,
                None => backend.current_branch()?.unwrap_or_default(),
            };
            let mut graph = load_graph(
                &backend,
                &reference,
                config.log_limit,
                &config.default_remote,
            )
            .with_context(|| format!("failed to load graph for {reference:?}"))?;
            if let Some(text) = cmd.search {
                let query = SearchQuery {
                    text,
                    case_sensitive: cmd.case_sensitive,
                    use_regex: cmd.regex,
                };
                let keep = filter_commits(&graph.commits, &query)?;
                graph.commits = keep
                    .into_iter()
                    .filter_map(|idx| graph.commits.get(idx).cloned())
                    .collect();
            }
            print_json(&graph, cmd.pretty)?;
        }
        Commands::Divergence(cmd) => {
            let backend = open_backend(&cmd.repo, &config)?;
            let source = match cmd.source {
                Some(source) => source,
                None => backend
                    .current_branch()?
                    .ok_or_else(|| anyhow!("HEAD is detached, pass --source"))?,
            };
            let result = load_divergence(&backend, &cmd.target, &source, &config.default_remote)
                .with_context(|| format!("failed to compare {source} against {}", cmd.target))?;
            for warning in &result.warnings {
                log::warn!("{warning}");
            }
            print_json(&result, cmd.pretty)?;
        }
        Commands::Diff(cmd) => {
            let backend = open_backend(&cmd.repo, &config)?;
            let lines = load_diff(
                &backend,
                &cmd.commit,
                &cmd.path,
                config.collapse_threshold,
                config.collapse_context,
            )
            .with_context(|| format!("failed to diff {} in {}", cmd.path, cmd.commit))?;
            if lines.is_empty() {
                println!("(no changes)");
            }
            for line in &lines {
                println!("{}", format_diff_line(line));
            }
        }
        Commands::Config(cmd) => match cmd.subcommand {
            ConfigSubcommand::Path => println!("{}", store.path().display()),
            ConfigSubcommand::Show => println!("{}", serde_json::to_string_pretty(&config)?),
            ConfigSubcommand::Init { force } => {
                if store.path().exists() && !force {
                    return Err(anyhow!(
                        "{} already exists (pass --force to overwrite)",
                        store.path().display()
                    ));
                }
                store
                    .save(&Config::default())
                    .context("failed to write config")?;
                println!("wrote {}", store.path().display());
            }
        },
    }

    Ok(())
}

fn open_backend(args: &RepoArgs, config: &Config) -> Result<GitBackend> {
    let path = match &args.repo {
        Some(repo) => repo.clone(),
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };
    let backend = GitBackend::open(GitRunner::new(config.git_binary.clone()), &path)
        .with_context(|| {
            format!(
                "{} is not a git repository (pass --repo, or run git-radar inside one)",
                path.display()
            )
        })?;
    info!("opened repository {}", backend.repo_path().display());
    Ok(backend)
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

fn format_diff_line(line: &DiffLine) -> String {
    match line {
        DiffLine::Equal(text) => format!("  {text}"),
        DiffLine::Add(text) => format!("+ {text}"),
        DiffLine::Delete(text) => format!("- {text}"),
        DiffLine::Collapsed { hidden } => format!("  ... {hidden} unchanged lines ..."),
    }
}
