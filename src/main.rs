use std::sync::Arc;
use std::time::Duration;

use hike_safety::clock::{Clock, SystemClock};
use hike_safety::config::AppConfig;
use hike_safety::db::{self, PgStore};
use hike_safety::kafka;
use hike_safety::processor::{
    AlertDetector, AlertNotifier, ConfigProvider, NotificationDispatcher, TrackIngestor,
};
use hike_safety::scheduler::Scheduler;
use hike_safety::store::Stores;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Hike Safety Service...");

    let pool = db::init_pool(&config.database_url).await?;
    info!("Connected to database");

    let stores = Stores::from_backend(Arc::new(PgStore::new(pool)));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let thresholds_source = ConfigProvider::new(stores.config.clone(), &config.alert_config_group);

    let (notifier, notices) = AlertNotifier::channel(config.notify_queue_capacity);
    let dispatcher = NotificationDispatcher::new(
        stores.activities.clone(),
        stores.users.clone(),
        stores.notifications.clone(),
    )
    .spawn(notices);

    let detector = AlertDetector::new(stores.clone(), thresholds_source.clone(), notifier, clock);
    let scan_minutes = thresholds_source.thresholds().await.scan_interval_minutes.max(1);
    let mut scheduler = Scheduler::start(
        detector.clone(),
        Duration::from_secs((scan_minutes as u64).saturating_mul(60)),
    );

    let ingestor = TrackIngestor::new(stores, detector);
    let outcome = tokio::select! {
        result = kafka::start_kafka_consumer(&config, ingestor) => {
            if let Err(e) = &result {
                error!("Kafka consumer stopped: {}", e);
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    scheduler.stop().await;
    dispatcher.abort();
    info!("Hike Safety Service stopped");
    outcome
}
