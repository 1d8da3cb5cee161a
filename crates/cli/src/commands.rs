use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use dump_mirror_common::{parse_partition_date, Clock, SystemClock};
use dump_mirror_provider_http::HttpProviderSource;
use dump_mirror_storage::{
    DrainSummary, FileDescriptor, KeyDeriver, ObsoleteObjectSet, Reconciler, StorageClient,
    SyncListing, SyncReport, SyncRunner, UploadOptions, Uploader,
};
use dump_mirror_storage_crt::CrtStorageClient;

use crate::config::MirrorConfig;

/// Mirror provider data dumps into S3
#[derive(Parser)]
#[command(name = "dump-mirror", version, about)]
pub struct Cli {
    /// Configuration file (defaults to ./dump-mirror.toml)
    #[arg(long, global = true, env = "DUMP_MIRROR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload missing files from a listing and prune obsolete requests
    Sync(SyncArgs),
    /// Print the storage key a file would be written to
    Key {
        #[arg(long)]
        table: String,
        #[arg(long)]
        filename: String,
        /// Partition date (YYYY-MM-DD), today if omitted
        #[arg(long)]
        date: Option<String>,
    },
    /// Print current-term objects that a listing no longer contains
    Obsolete {
        /// Provider sync listing (JSON)
        #[arg(long)]
        listing: PathBuf,
    },
}

#[derive(Args)]
struct SyncArgs {
    /// Provider sync listing (JSON)
    #[arg(long)]
    listing: PathBuf,
    /// Count transfer results in the report and exit status (transfers
    /// always finish before exit)
    #[arg(long)]
    wait: bool,
    /// Skip pruning of the current-term prefix
    #[arg(long)]
    no_cleanup: bool,
    /// Log obsolete objects instead of deleting them
    #[arg(long)]
    dry_run: bool,
    /// Concurrent uploads (overrides max_concurrency)
    #[arg(long)]
    concurrency: Option<usize>,
    /// Treat non-200 provider responses as failures
    #[arg(long)]
    strict: bool,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = MirrorConfig::load(self.config.as_deref())
            .context("failed to load configuration")?;
        tracing::debug!(
            bucket = %config.bucket,
            region = %config.region,
            daily_root = %config.daily_root,
            current_term_root = %config.current_term_root,
            "Loaded configuration"
        );

        match self.command {
            Commands::Sync(args) => sync(&config, args).await,
            Commands::Key {
                table,
                filename,
                date,
            } => key(&config, &table, &filename, date.as_deref()),
            Commands::Obsolete { listing } => obsolete(&config, &listing).await,
        }
    }
}

fn read_listing(path: &Path) -> anyhow::Result<SyncListing> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read listing {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid listing {}", path.display()))
}

fn key_deriver(config: &MirrorConfig) -> KeyDeriver {
    KeyDeriver::new(config.layout()).with_salt(config.partition_salt.clone())
}

async fn storage_client(config: &MirrorConfig) -> anyhow::Result<Arc<dyn StorageClient>> {
    config.validate().map_err(anyhow::Error::msg)?;
    let client = CrtStorageClient::new(config.storage_settings()).await?;
    Ok(Arc::new(client))
}

async fn sync(config: &MirrorConfig, args: SyncArgs) -> anyhow::Result<()> {
    let listing: SyncListing = read_listing(&args.listing)?;
    let client: Arc<dyn StorageClient> = storage_client(config).await?;
    let provider =
        HttpProviderSource::new(config.http_connect_timeout(), config.http_read_timeout())?;

    let uploader = Uploader::new(Arc::clone(&client), Arc::new(provider), key_deriver(config))
        .with_options(
            UploadOptions::new()
                .with_strict_provider_status(args.strict || config.strict_provider_status),
        );

    let mut options = config
        .sync_options()
        .with_wait_for_transfers(args.wait)
        .with_cleanup(!args.no_cleanup)
        .with_dry_run(args.dry_run);
    if let Some(concurrency) = args.concurrency {
        options = options.with_max_concurrency(concurrency);
    }

    let runner = SyncRunner::new(client, uploader, options);
    let report: SyncReport = runner.run(&listing).await?;
    print_report(&report);

    if runner.pending_transfers() > 0 {
        let background: DrainSummary = runner.drain_transfers().await;
        println!(
            "Background transfers: {} completed, {} failed",
            background.completed, background.failed
        );
    }

    if !report.errors.is_empty() {
        for error in &report.errors {
            eprintln!("  {error}");
        }
        bail!("{} of {} file(s) failed", report.errors.len(), report.files_processed);
    }
    Ok(())
}

fn key(
    config: &MirrorConfig,
    table: &str,
    filename: &str,
    date: Option<&str>,
) -> anyhow::Result<()> {
    let date: NaiveDate = match date {
        Some(raw) => parse_partition_date(raw)?,
        None => SystemClock.today(),
    };
    let keys: KeyDeriver = key_deriver(config);
    let file = FileDescriptor::new(table, filename, "");
    println!("{}", keys.storage_key(&file, &keys.partition_key(date)));
    Ok(())
}

async fn obsolete(config: &MirrorConfig, listing: &Path) -> anyhow::Result<()> {
    let listing: SyncListing = read_listing(listing)?;
    if listing.incomplete {
        eprintln!("warning: listing is marked incomplete; results may include current files");
    }

    let client: Arc<dyn StorageClient> = storage_client(config).await?;
    let obsolete: ObsoleteObjectSet = Reconciler::new(client, key_deriver(config))
        .find_obsolete(&listing.manifest())
        .await?;

    for key in obsolete.iter() {
        println!("{key}");
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("Files processed:     {}", report.files_processed);
    println!("  already present:   {}", report.already_present);
    println!("  uploads started:   {}", report.uploads_started);
    println!("  provider rejected: {}", report.provider_rejected);
    if report.transfers_completed + report.transfers_failed > 0 {
        println!(
            "Transfers:           {} completed, {} failed, {} bytes",
            report.transfers_completed, report.transfers_failed, report.bytes_transferred
        );
    }
    if report.cleanup_skipped {
        println!("Cleanup:             skipped");
    } else {
        println!(
            "Cleanup:             {} obsolete, {} deleted",
            report.obsolete_found, report.objects_deleted
        );
    }
}
