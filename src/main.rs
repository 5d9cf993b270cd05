use anyhow::{Context, Result};
use log::{error, info, warn};
use resolution_lib::cache::{LayeredValidationCache, PgValidationCache, ValidationCache};
use resolution_lib::matching::{
    AddressMatcher, AmalgamationTable, CityIndex, MunicipalityResolver, PgReferenceStore,
    ReferenceStore,
};
use resolution_lib::models::address::DEFAULT_PROVINCE;
use resolution_lib::orchestrator::{AddressResolver, BatchConfig, BatchProcessor, ResolutionOrchestrator};
use resolution_lib::queue::{PgWorkQueue, WorkQueue};
use resolution_lib::store::PgPropertyStore;
use resolution_lib::utils::config::ResolverConfig;
use resolution_lib::utils::db_connect::{connect, get_pool_status};
use resolution_lib::utils::env::load_env;
use resolution_lib::utils::get_memory_usage;
use resolution_lib::utils::progress_bars::logging::ResolutionLogger;
use resolution_lib::utils::progress_bars::progress_config::ProgressConfig;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging and environment
    env_logger::init();
    info!("Starting NAR address validation service");
    load_env();

    let config = ResolverConfig::from_env();
    config.log_summary();
    let progress_config = ProgressConfig::from_env();
    info!("Progress tracking: enabled={}", progress_config.enabled);
    let multi_progress = progress_config.create_multi_progress();

    let logger = ResolutionLogger::new("SERVICE", "🛰️");
    logger.log_start("address resolution against the national address register");

    let pool = connect(config.worker_count)
        .await
        .context("Failed to connect to database")?;
    info!("Successfully connected to the database");

    logger.log_phase("Loading reference cities", Some(&config.reference_table));
    let reference = Arc::new(
        PgReferenceStore::new(pool.clone(), &config.reference_table, &config.default_province)
            .context("Failed to configure reference store")?,
    );
    let cities = match reference.distinct_cities().await {
        Ok(names) => CityIndex::from_names(names),
        Err(e) => {
            warn!("⚠️ Could not load reference cities ({}); city checks will query the store", e);
            CityIndex::default()
        }
    };
    logger.log_data_loaded(cities.len(), "distinct reference cities");

    let amalgamations = if config.default_province == DEFAULT_PROVINCE {
        AmalgamationTable::ontario()
    } else {
        AmalgamationTable::default()
    };
    info!("Amalgamation table: {} former municipalities", amalgamations.len());

    let municipality = MunicipalityResolver::new(
        reference.clone(),
        Arc::new(cities),
        Arc::new(amalgamations),
        config.fuzzy_city_threshold,
    );
    let matcher = AddressMatcher::new(reference.clone(), config.match_min_city_confidence);
    let cache: Arc<dyn ValidationCache> = Arc::new(LayeredValidationCache::new(
        config.memory_cache_size,
        Arc::new(PgValidationCache::new(pool.clone())),
    ));
    let resolver = AddressResolver::new(cache.clone(), municipality, matcher, config.max_range_span);

    let queue: Arc<dyn WorkQueue> = Arc::new(PgWorkQueue::new(pool.clone(), config.stale_after));
    let properties = Arc::new(PgPropertyStore::new(pool.clone()));
    let orchestrator = Arc::new(ResolutionOrchestrator::new(
        resolver,
        properties,
        queue.clone(),
        config.update_confidence_threshold,
    ));

    match queue.health().await {
        Ok(health) => {
            if health.stuck > 0 {
                logger.log_warning(&format!(
                    "{} item(s) stuck in processing; run `queue_admin reset --stale` or set AUTO_RESET_STALE=true",
                    health.stuck
                ));
            }
            if health.failed > 0 {
                logger.log_warning(&format!("{} failed item(s) awaiting operator reset", health.failed));
            }
        }
        Err(e) => error!("Queue health check failed: {:#}", e),
    }

    let processor = BatchProcessor::new(orchestrator, queue.clone(), BatchConfig::from(&config));
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("🛑 Shutdown requested; finishing the current batch"),
            Err(e) => {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await
            }
        }
    };
    logger.log_phase("Processing queue", None);
    let totals = processor
        .run_service_loop(config.poll_interval, multi_progress, shutdown)
        .await;

    match cache.stats().await {
        Ok(stats) => logger.log_cache_stats(&stats),
        Err(e) => logger.log_warning(&format!("Could not read cache statistics: {:#}", e)),
    }
    if progress_config.should_show_memory() {
        info!("Memory in use: {} MB", get_memory_usage().await);
    }
    if progress_config.should_show_db_connection_stats() {
        let (size, idle, in_use) = get_pool_status(&pool);
        info!("DB pool: {} connections ({} idle, {} in use)", size, idle, in_use);
    }
    info!(
        "NAR address validation service stopped: {} completed, {} failed over {:.1}s of batch time",
        totals.completed, totals.failed, totals.processing_time
    );
    Ok(())
}
