//! # Skillbank CLI (`skb`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `skb init` | Create the database, migrate legacy fields, ensure indexes |
//! | `skb health` | Round trip to the database |
//! | `skb search "<query>"` | Hybrid search |
//! | `skb get <id>` | Print one skill |
//! | `skb add --file draft.json` | Create a skill unless a near-duplicate exists |
//! | `skb update <id> --file patch.json` | Partial update with version bump |
//! | `skb serve mcp` | Start the HTTP tool server |
//! | `skb completions <shell>` | Print shell completions |

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use skillbank::{config, db, edit, get, logging, migrate, search, server};

/// Skillbank: retrieve, deduplicate, and version support playbooks.
#[derive(Parser)]
#[command(name = "skb", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/skb.toml")]
    config: PathBuf,

    /// More log output (-v, -vv, -vvv). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and indexes. Idempotent.
    Init,

    /// Check that the database answers.
    Health,

    /// Hybrid vector + keyword search.
    Search {
        query: String,

        /// Max results (defaults to `[retrieval].top_k`).
        #[arg(long)]
        limit: Option<usize>,

        /// Drop results scoring below this.
        #[arg(long)]
        min_score: Option<f64>,

        /// Show the vector and keyword components of each score.
        #[arg(long)]
        explain: bool,
    },

    /// Print a skill by id.
    Get { id: String },

    /// Create a skill from a JSON draft.
    Add {
        #[arg(long)]
        file: PathBuf,
    },

    /// Apply a JSON patch to a skill.
    Update {
        id: String,
        #[arg(long)]
        file: PathBuf,
    },

    /// Start a server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },

    /// Print shell completions to stdout.
    Completions { shell: Shell },
}

#[derive(Subcommand)]
enum ServeService {
    /// HTTP tool API plus MCP at `/mcp`, bound to `[server].bind`.
    Mcp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose, cli.log_json);

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "skb", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => migrate::run_init(&cfg).await?,
        Commands::Health => db::run_health(&cfg).await?,
        Commands::Search {
            query,
            limit,
            min_score,
            explain,
        } => search::run_search(&cfg, &query, limit, min_score, explain).await?,
        Commands::Get { id } => get::run_get(&cfg, &id).await?,
        Commands::Add { file } => edit::run_add(&cfg, &file).await?,
        Commands::Update { id, file } => edit::run_update(&cfg, &id, &file).await?,
        Commands::Serve { service } => match service {
            ServeService::Mcp => server::run_server(&cfg).await?,
        },
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}
