//! Federation kernel CLI.
//!
//! Provides the `fedkernel` binary with subcommands for inspecting a
//! federation store file without going through the HTTP server: the
//! repository list, the review queue, and the graph. Reads the same
//! SQLite database the server writes, via the same storage backend.

use std::process;

use clap::{Parser, Subcommand};

use fedkernel_core::{PatchStatus, RepoId};
use fedkernel_store::traits::LinkDirection;
use fedkernel_store::{FederationStore, SqliteStore, StorageError};

/// Federation graph and patch queue tools.
#[derive(Parser)]
#[command(name = "fedkernel", about = "Federation graph and patch queue tools")]
struct Cli {
    /// Path to the federation database file.
    #[arg(short, long, default_value = "fedkernel.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List registered repositories and their ingestion status.
    Repos,

    /// Show the patch review queue.
    Queue {
        /// Filter by status (Proposed, UnderReview, Conflicted, Approved,
        /// Rejected, Superseded).
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Dump live graph nodes and their outgoing links.
    Graph {
        /// Restrict to one repository id.
        #[arg(short, long)]
        repo_id: Option<i64>,
    },
}

fn main() {
    let cli = Cli::parse();

    let store = match SqliteStore::new(&cli.db) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("error: failed to open '{}': {}", cli.db, err);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Repos => run_repos(&store),
        Commands::Queue { status } => run_queue(&store, status.as_deref()),
        Commands::Graph { repo_id } => run_graph(&store, repo_id.map(RepoId)),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run_repos(store: &SqliteStore) -> Result<(), StorageError> {
    let repos = store.list_repos()?;
    if repos.is_empty() {
        println!("no repositories registered");
        return Ok(());
    }
    for repo in repos {
        println!(
            "{:>5}  {}/{} [{}] {}",
            repo.repo_id.0,
            repo.owner,
            repo.repo,
            repo.default_branch,
            repo.status.as_str(),
        );
    }
    Ok(())
}

fn run_queue(store: &SqliteStore, status: Option<&str>) -> Result<(), StorageError> {
    let filter = match status {
        Some(s) => match PatchStatus::parse(s) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                eprintln!("error: {err}");
                process::exit(1);
            }
        },
        None => None,
    };

    let proposals = store.list_proposals(filter)?;
    if proposals.is_empty() {
        println!("queue is empty");
        return Ok(());
    }
    for proposal in proposals {
        let conflicts = if proposal.conflicts_with.is_empty() {
            String::new()
        } else {
            let ids: Vec<String> = proposal
                .conflicts_with
                .iter()
                .map(|id| id.to_string())
                .collect();
            format!("  conflicts: {}", ids.join(", "))
        };
        println!(
            "{}  {:<11}  {}/{} {} by {}{}",
            proposal.patch_id,
            proposal.status.as_str(),
            proposal.owner,
            proposal.repo,
            proposal.file_path,
            proposal.actor,
            conflicts,
        );
    }
    Ok(())
}

fn run_graph(store: &SqliteStore, repo_id: Option<RepoId>) -> Result<(), StorageError> {
    let nodes = store.list_nodes(repo_id)?;
    let live: Vec<_> = nodes.into_iter().filter(|n| n.is_live()).collect();
    if live.is_empty() {
        println!("no live nodes");
        return Ok(());
    }
    for node in live {
        println!(
            "{}  repo={} {}:{} ({})",
            node.node_id,
            node.repo_id.0,
            node.file_path,
            node.name,
            node.kind,
        );
        for link in store.list_links(node.node_id, LinkDirection::Outgoing)? {
            if link.retired {
                continue;
            }
            let target = store
                .get_node(link.to)?
                .map(|n| format!("{}:{}", n.file_path, n.name))
                .unwrap_or_else(|| link.to.to_hex());
            println!("    -> {} [{}] weight={}", target, link.kind, link.weight);
        }
    }
    Ok(())
}
