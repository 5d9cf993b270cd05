// src/bin/queue_admin.rs - Operator commands for the NAR validation queue
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use resolution_lib::cache::{PgValidationCache, ValidationCache};
use resolution_lib::models::queue::{ResetRequest, DEFAULT_PRIORITY};
use resolution_lib::queue::{PgWorkQueue, WorkQueue};
use resolution_lib::reporting::{fetch_export_rows, write_csv};
use resolution_lib::utils::config::ResolverConfig;
use resolution_lib::utils::db_connect::connect;
use resolution_lib::utils::env::load_env;
use resolution_lib::utils::progress_bars::logging::ResolutionLogger;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Manage the NAR address validation queue", long_about = None)]
struct AdminArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Queue specific properties (completed/failed items are re-queued)
    Enqueue {
        /// Property IDs to queue
        #[arg(required = true)]
        property_ids: Vec<String>,

        /// Priority, 1 = highest
        #[arg(long, default_value_t = DEFAULT_PRIORITY)]
        priority: i32,
    },
    /// Queue every property that has never been validated
    EnqueueUnvalidated {
        #[arg(long, default_value_t = DEFAULT_PRIORITY)]
        priority: i32,

        /// Stop after this many properties
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Counts per status, plus stuck items and daily statistics
    Status {
        /// Days of daily statistics to show
        #[arg(long, default_value_t = 7)]
        days: i32,
    },
    /// Most recently completed items
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Return failed and/or stale processing items to pending
    Reset {
        /// Reset failed items
        #[arg(long)]
        failed: bool,

        /// Reset processing items older than STALE_AFTER_MINUTES
        #[arg(long)]
        stale: bool,

        /// Also zero the attempt counters
        #[arg(long)]
        clear_attempts: bool,
    },
    /// Validation cache statistics
    CacheStats,
    /// Export completed items with raw, resolver and persisted columns as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        limit: Option<i64>,

        /// Only rows whose resolver confidence is at least this
        #[arg(long)]
        min_confidence: Option<i32>,
    },
}

fn fmt_opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    load_env();
    let args = AdminArgs::parse();
    let config = ResolverConfig::from_env();
    let logger = ResolutionLogger::new("ADMIN", "🧰");

    let pool = connect(1).await.context("Failed to connect to database")?;
    let queue = PgWorkQueue::new(pool.clone(), config.stale_after);

    match args.command {
        Command::Enqueue { property_ids, priority } => {
            let mut changed = 0;
            for id in &property_ids {
                if queue.enqueue(id, priority).await? {
                    changed += 1;
                } else {
                    info!("{} is already pending or processing; left alone", id);
                }
            }
            println!("Queued {} of {} properties (priority {})", changed, property_ids.len(), priority);
        }
        Command::EnqueueUnvalidated { priority, limit } => {
            let inserted = queue.enqueue_unvalidated(priority, limit).await?;
            println!("Queued {} never-validated properties (priority {})", inserted, priority);
        }
        Command::Status { days } => {
            println!("{:<12} {:>10} {:>13}  {:<25} {:<25}", "STATUS", "COUNT", "AVG ATTEMPTS", "OLDEST", "NEWEST");
            for line in queue.status_summary().await? {
                println!(
                    "{} {:<10} {:>10} {:>13.2}  {:<25} {:<25}",
                    line.status.emoji(),
                    line.status.as_str(),
                    line.count,
                    line.avg_attempts,
                    fmt_opt(line.oldest_queued_at.map(|t| t.to_rfc3339())),
                    fmt_opt(line.newest_queued_at.map(|t| t.to_rfc3339()))
                );
            }
            let health = queue.health().await?;
            println!();
            println!(
                "Stuck in processing: {}   Failed: {}   Last completion: {}",
                health.stuck,
                health.failed,
                fmt_opt(health.last_completed_at.map(|t| t.to_rfc3339()))
            );
            let daily = queue.daily_stats(days).await?;
            if !daily.is_empty() {
                println!();
                println!(
                    "{:<12} {:>10} {:>10} {:>10} {:>8} {:>8} {:>8}",
                    "DATE", "VALIDATED", "FOUND", "HIGH CONF", "CITIES", "POSTAL", "GEOCODE"
                );
                for day in daily {
                    println!(
                        "{:<12} {:>10} {:>10} {:>10} {:>8} {:>8} {:>8}",
                        day.date,
                        day.total_validated,
                        day.nar_found,
                        day.high_confidence,
                        day.cities_updated,
                        day.postal_codes_updated,
                        day.geocoding_updated
                    );
                }
            }
        }
        Command::Recent { limit } => {
            for r in queue.recent_results(limit).await? {
                println!(
                    "{} | {} | {} -> {} | confidence {} | found {} | {}",
                    r.property_id,
                    fmt_opt(r.address_line1),
                    fmt_opt(r.city_before),
                    fmt_opt(r.city_after),
                    fmt_opt(r.confidence_score),
                    fmt_opt(r.found),
                    fmt_opt(r.completed_at.map(|t| t.to_rfc3339()))
                );
            }
        }
        Command::Reset { failed, stale, clear_attempts } => {
            if !failed && !stale {
                anyhow::bail!("Nothing to reset: pass --failed and/or --stale");
            }
            let reset = queue
                .reset(&ResetRequest {
                    include_failed: failed,
                    stale_after: stale.then_some(config.stale_after),
                    clear_attempts,
                })
                .await?;
            println!("Reset {} item(s) to pending", reset);
        }
        Command::CacheStats => {
            let cache = PgValidationCache::new(pool.clone());
            let stats = cache.stats().await?;
            logger.log_cache_stats(&stats);
            println!("Entries:        {}", stats.total_entries);
            println!("Total lookups:  {}", stats.total_hits);
            println!("Average hits:   {:.2}", stats.avg_hits);
            println!("Max hits:       {}", stats.max_hits);
            println!("Reused entries: {} ({:.1}%)", stats.reused_entries, stats.reuse_rate());
        }
        Command::Export { output, limit, min_confidence } => {
            let rows = fetch_export_rows(&pool, limit, min_confidence).await?;
            match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    write_csv(&rows, BufWriter::new(file))?;
                    info!("📤 Wrote {} rows to {}", rows.len(), path.display());
                }
                None => write_csv(&rows, io::stdout().lock())?,
            }
        }
    }
    Ok(())
}
