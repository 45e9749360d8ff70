use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use bytes::Bytes;
use colored::Colorize;
use dlog_config::{DistributedLogConfiguration, DynamicDistributedLogConfiguration};
use dlog_coord::{CoordinationClient, InMemoryCoordination};
use dlog_entrystore::{
    EntryStoreError, LogSegmentEntryReader, LogSegmentEntryStore, LogSegmentEntryWriter,
    LogSegmentRandomAccessEntryReader, NoopFailureInjector,
};
use dlog_ledger::{InMemoryLedgerStore, LedgerClient, LedgerClientHandle};
use dlog_namespace::{NamespaceDriver, Role};
use dlog_types::{LedgerId, LogSegmentMetadata};
use serde_json::json;
use tracing::info;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Config(args) => match args.action {
            ConfigAction::Check { path } => cmd_config_check(&path, cli.format),
            ConfigAction::Show { path } => cmd_config_show(path.as_deref(), cli.format),
        },
        Command::Smoke(args) => cmd_smoke(args, cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<DistributedLogConfiguration> {
    match path {
        Some(path) => DistributedLogConfiguration::load(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(DistributedLogConfiguration::default()),
    }
}

fn cmd_config_check(path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let result = load_config(Some(path));
    match format {
        OutputFormat::Json => {
            let report = match &result {
                Ok(_) => json!({ "path": path.display().to_string(), "valid": true }),
                Err(e) => json!({
                    "path": path.display().to_string(),
                    "valid": false,
                    "error": format!("{e:#}"),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => match &result {
            Ok(conf) => {
                println!("{} {} is valid", "✓".green().bold(), path.display().to_string().bold());
                println!(
                    "  Quorum: ensemble={} write={} ack={}",
                    conf.ensemble_size, conf.write_quorum_size, conf.ack_quorum_size
                );
                let pool = if conf.enable_ledger_allocator_pool {
                    format!(
                        "{}/{} (core size {})",
                        conf.ledger_allocator_pool_path,
                        conf.ledger_allocator_pool_name,
                        conf.ledger_allocator_pool_core_size
                    )
                    .cyan()
                } else {
                    "disabled".dimmed()
                };
                println!("  Allocator pool: {pool}");
            }
            Err(e) => println!("{} {e:#}", "✗".red().bold()),
        },
    }
    result.map(|_| ())
}

fn cmd_config_show(path: Option<&Path>, format: OutputFormat) -> anyhow::Result<()> {
    let conf = load_config(path)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&conf)?),
        OutputFormat::Text => print!("{}", toml::to_string_pretty(&conf)?),
    }
    Ok(())
}

/// What a smoke run did, for printing.
#[derive(Debug)]
struct SmokeReport {
    log: String,
    ledger_id: LedgerId,
    pooled: bool,
    written: u64,
    tailed: usize,
    read: usize,
    last_payload: Option<Bytes>,
    deleted: bool,
}

fn cmd_smoke(args: SmokeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut conf = load_config(args.config.as_deref())?;
    if args.pooled {
        conf.enable_ledger_allocator_pool = true;
    }
    let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
    let report = runtime.block_on(smoke(conf, &args.log, args.entries))?;

    match format {
        OutputFormat::Json => {
            let report = json!({
                "log": report.log,
                "ledger_id": report.ledger_id.get(),
                "pooled": report.pooled,
                "written": report.written,
                "tailed": report.tailed,
                "read": report.read,
                "last_payload": report.last_payload.as_deref().map(hex::encode),
                "deleted": report.deleted,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            let mode = if report.pooled { "pooled" } else { "direct" };
            println!(
                "{} Smoke run on log {} ({mode} allocation)",
                "✓".green().bold(),
                report.log.bold()
            );
            println!("  Ledger: {}", report.ledger_id.to_string().yellow());
            println!("  Written: {}", report.written);
            println!("  Tailed while in progress: {}", report.tailed);
            println!("  Read after sealing: {}", report.read);
            if let Some(payload) = &report.last_payload {
                println!("  Last entry: {}", hex::encode(payload).dimmed());
            }
            let deleted = if report.deleted { "yes".green() } else { "no".red() };
            println!("  Deleted: {deleted}");
        }
    }
    Ok(())
}

/// Allocate a segment, write it, tail it, seal it, read it back and delete
/// it, all against in-memory backends.
async fn smoke(
    conf: DistributedLogConfiguration,
    log: &str,
    entries: u64,
) -> anyhow::Result<SmokeReport> {
    let pooled = conf.enable_ledger_allocator_pool;
    let store = InMemoryLedgerStore::new();
    let client: Arc<dyn LedgerClient> = Arc::new(store.clone());
    let ledgers = Arc::new(LedgerClientHandle::new("smoke", client));
    let coord: Arc<dyn CoordinationClient> = Arc::new(InMemoryCoordination::new());
    let dyn_conf = Arc::new(DynamicDistributedLogConfiguration::new(conf.clone()));
    let driver = NamespaceDriver::initialize(
        conf,
        dyn_conf,
        "/dlog/smoke",
        coord,
        ledgers,
        Arc::new(NoopFailureInjector),
    )
    .await?;

    let allocator = driver.segment_allocator(log).await?;
    let mut writer = allocator.try_obtain().await?;
    let ledger_id = writer.ledger_id();
    for i in 0..entries {
        writer
            .add_entry(Bytes::from(format!("{log}-{i}")))
            .await
            .with_context(|| format!("appending entry {i}"))?;
    }
    info!(ledger_id = %ledger_id, entries, "wrote segment");

    let store_for_readers = driver.entry_store(Role::Reader)?;
    let live = LogSegmentMetadata::in_progress(log, 1, ledger_id, 1);
    let mut tail = store_for_readers.open_reader(&live, 0).await?;
    let mut tailed = 0;
    loop {
        let batch = tail.read_next(usize::MAX).await?;
        if batch.is_empty() {
            break;
        }
        tailed += batch.len();
    }
    tail.close().await?;

    let last_entry = writer.last_add_confirmed();
    writer.close().await?;
    let sealed = live
        .complete(entries as i64, last_entry, entries)
        .context("sealing segment metadata")?;

    let mut reader = store_for_readers.open_reader(&sealed, 0).await?;
    let mut read = 0;
    loop {
        match reader.read_next(usize::MAX).await {
            Ok(batch) => read += batch.len(),
            Err(EntryStoreError::EndOfSegment(_)) => break,
            Err(e) => return Err(e.into()),
        }
    }
    reader.close().await?;

    let mut random = store_for_readers
        .open_random_access_reader(&sealed, false)
        .await?;
    let last_payload = match last_entry {
        Some(last) => random
            .read_entries(last, last)
            .await?
            .pop()
            .map(|entry| entry.payload),
        None => None,
    };
    random.close().await?;

    if read as u64 != entries {
        bail!("read {read} entries back, wrote {entries}");
    }

    store_for_readers.delete_log_segment(&sealed).await?;
    let deleted = !store.contains(ledger_id);
    driver.close().await?;

    Ok(SmokeReport {
        log: log.to_string(),
        ledger_id,
        pooled,
        written: entries,
        tailed,
        read,
        last_payload,
        deleted,
    })
}
