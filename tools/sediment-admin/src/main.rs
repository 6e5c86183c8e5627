//! Sediment Admin: offline maintenance CLI for the state store.
//!
//! Every command opens the store at `--datadir`, runs one maintenance job
//! from `sediment-maint`, prints a summary and exits. Integrity failures
//! exit non-zero with the offending reference on stderr. Ctrl-C requests a
//! cooperative stop; interruptible jobs persist a resumable state and exit
//! cleanly.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use sediment_maint::{
    check_dangling_storage, prune_all, traverse_raw_state, traverse_state, verify_state, Migrator,
    Pruner,
};
use sediment_snapshot::SnapshotTree;
use sediment_trie::adapters::{RocksStore, StoreHistoryLog};
use sediment_trie::ports::{HistoryLog, KeyValueStore};
use sediment_trie::schema::{self, Scheme};
use sediment_types::{hex32, parse_hash, Hash};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sediment-admin")]
#[command(about = "Offline maintenance for the Sediment state store")]
struct Args {
    /// Data directory holding the state store
    #[arg(long)]
    datadir: PathBuf,

    /// Reachability filter size in megabytes (prune-state)
    #[arg(long, default_value_t = 256)]
    bloom_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delete state unreachable from the target root and the genesis root
    PruneState {
        /// Target state root (defaults to the head root)
        root: Option<String>,
    },
    /// Keep only the genesis state. Destroys all historical state and the
    /// flat snapshot; historical queries stop working permanently
    InsecurePruneAll {
        /// Genesis spec file; its stateRoot field selects the retained root
        genesis_path: PathBuf,
    },
    /// Rebuild the state root from the flat snapshot, compare it to the
    /// trie root, then audit the flat storage for dangling entries
    VerifyState {
        root: Option<String>,
    },
    /// Resolve every account, storage trie and code blob (content trusted)
    TraverseState {
        root: Option<String>,
    },
    /// Resolve and digest-check every single trie node
    TraverseRawstate {
        root: Option<String>,
    },
    /// Find flat storage entries without an owning account entry
    CheckDanglingStorage,
    /// Migrate trie nodes from hash-addressed to path-addressed keys
    HbssToPbss {
        /// Storage-trie copy workers
        jobs: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let store: Arc<dyn KeyValueStore> = Arc::new(
        RocksStore::open(&args.datadir)
            .with_context(|| format!("opening store at {}", args.datadir.display()))?,
    );
    let history = Arc::new(StoreHistoryLog::new(Arc::clone(&store)));

    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let interrupt = Arc::clone(&interrupt);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt requested, stopping at the next batch boundary");
                interrupt.store(true, Ordering::Relaxed);
            }
        });
    }

    match args.command {
        Command::PruneState { root } => {
            let root = resolve_root(root.as_deref(), history.as_ref())?;
            let report = Pruner::new(Arc::clone(&store))
                .with_bloom_size_mb(args.bloom_size)
                .with_interrupt(interrupt)
                .run(root)?;
            println!(
                "pruned {} nodes and {} code blobs ({} bytes) out of {} scanned in {:.1?}{}",
                report.nodes_deleted,
                report.codes_deleted,
                report.bytes_freed,
                report.nodes_scanned,
                report.elapsed,
                if report.interrupted {
                    ", interrupted (rerun to finish)"
                } else {
                    ""
                }
            );
        }
        Command::InsecurePruneAll { genesis_path } => {
            let genesis = genesis_root(&genesis_path, store.as_ref())?;
            let report = prune_all(store.as_ref(), genesis)?;
            println!(
                "retained genesis state only: {} nodes deleted, {} bytes freed in {:.1?}",
                report.nodes_deleted, report.bytes_freed, report.elapsed
            );
        }
        Command::VerifyState { root } => {
            let root = resolve_root(root.as_deref(), history.as_ref())?;
            let tree = SnapshotTree::open(Arc::clone(&store))?;
            let report = verify_state(&tree, root)?;
            let audit = check_dangling_storage(store.as_ref())?;
            println!(
                "snapshot matches root {}: {} accounts, {} slots, {} storage owners audited in {:.1?}",
                hex32(&root),
                report.accounts,
                report.slots,
                audit.accounts_checked,
                report.elapsed + audit.elapsed
            );
        }
        Command::TraverseState { root } => {
            let root = resolve_root(root.as_deref(), history.as_ref())?;
            let scheme = store_scheme(store.as_ref())?;
            let report = traverse_state(store.as_ref(), scheme, root)?;
            println!(
                "state at {} is complete: {} accounts, {} slots, {} codes in {:.1?}",
                hex32(&root),
                report.accounts,
                report.slots,
                report.codes,
                report.elapsed
            );
        }
        Command::TraverseRawstate { root } => {
            let root = resolve_root(root.as_deref(), history.as_ref())?;
            let scheme = store_scheme(store.as_ref())?;
            let report = traverse_raw_state(store.as_ref(), scheme, root)?;
            println!(
                "state at {} is sound: {} nodes verified ({} accounts, {} slots, {} codes) in {:.1?}",
                hex32(&root),
                report.nodes,
                report.accounts,
                report.slots,
                report.codes,
                report.elapsed
            );
        }
        Command::CheckDanglingStorage => {
            let report = check_dangling_storage(store.as_ref())?;
            println!(
                "no dangling storage: {} accounts, {} slots checked in {:.1?}",
                report.accounts_checked, report.slots_scanned, report.elapsed
            );
        }
        Command::HbssToPbss { jobs } => {
            let root = resolve_root(None, history.as_ref())?;
            let mut migrator = Migrator::new(Arc::clone(&store), history).with_interrupt(interrupt);
            if let Some(jobs) = jobs {
                migrator = migrator.with_jobs(jobs);
            }
            let report = migrator.run(root)?;
            if report.interrupted {
                println!(
                    "migration interrupted after {} nodes; store still hash-addressed, rerun to finish",
                    report.account_nodes + report.storage_nodes
                );
            } else {
                println!(
                    "migrated {} nodes ({} accounts) to the path scheme, state id {} in {:.1?}",
                    report.account_nodes + report.storage_nodes,
                    report.accounts,
                    report.state_id,
                    report.elapsed
                );
            }
        }
    }
    Ok(())
}

/// Explicit root argument, or the history log's head.
fn resolve_root(arg: Option<&str>, history: &dyn HistoryLog) -> Result<Hash> {
    match arg {
        Some(text) => parse_hash(text).ok_or_else(|| anyhow!("invalid state root: {text}")),
        None => history
            .head_root()?
            .ok_or_else(|| anyhow!("no root given and the history log has no head root")),
    }
}

fn store_scheme(store: &dyn KeyValueStore) -> Result<Scheme> {
    schema::read_scheme(store)?.ok_or_else(|| anyhow!("store carries no scheme marker"))
}

/// Extract the genesis state root: the `stateRoot` field of the genesis
/// spec if present, otherwise the root recorded in the store.
fn genesis_root(path: &PathBuf, store: &dyn KeyValueStore) -> Result<Hash> {
    if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading genesis spec {}", path.display()))?;
        let spec: serde_json::Value =
            serde_json::from_str(&raw).context("genesis spec is not valid JSON")?;
        if let Some(text) = spec.get("stateRoot").and_then(|v| v.as_str()) {
            return parse_hash(text)
                .ok_or_else(|| anyhow!("genesis spec has an invalid stateRoot"));
        }
    }
    if let Some(root) = schema::read_genesis_root(store)? {
        return Ok(root);
    }
    bail!(
        "no genesis root: {} has no stateRoot and the store records none",
        path.display()
    )
}
