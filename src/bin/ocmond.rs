use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::future::join_all;
use ocloud_monitor::{
    actors::{
        dispatcher::DispatcherHandle, evaluator::EvaluatorHandle, reporter::ReporterHandle,
    },
    config::{MonitorConfig, read_config_file},
    notify::NotificationSender,
    storage::MemoryStore,
};
use tokio::time::timeout;
use tracing::{debug, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// How long shutdown waits for each loop before abandoning it.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (defaults apply when omitted)
    #[arg(short)]
    file: Option<String>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("ocloud_monitor", LevelFilter::TRACE),
        ("ocmond", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();

    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => MonitorConfig::default(),
    };

    let store = Arc::new(MemoryStore::new());

    let (dispatcher, dispatcher_join) = DispatcherHandle::spawn(
        store.clone(),
        store.clone(),
        store.clone(),
        NotificationSender::new(config.delivery_timeout_secs, config.max_retries),
    );

    let mut joins = vec![("dispatcher", dispatcher_join)];

    let evaluator = if config.enable_automatic_alarms {
        let (evaluator, join) = EvaluatorHandle::spawn(
            config.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            dispatcher.clone(),
        )
        .await;
        joins.push(("evaluator", join));
        Some(evaluator)
    } else {
        info!("automatic alarm creation is disabled in config");
        None
    };

    let (reporter, reporter_join) = ReporterHandle::spawn(
        store.clone(),
        store.clone(),
        NotificationSender::new(config.report_delivery_timeout_secs, 1),
        config.report_check_interval_secs,
    );
    joins.push(("reporter", reporter_join));

    info!("monitoring core started");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    dispatcher.shutdown().await;
    reporter.shutdown().await;
    if let Some(evaluator) = &evaluator {
        evaluator.shutdown().await;
    }

    join_all(joins.into_iter().map(|(name, join)| async move {
        match timeout(SHUTDOWN_DEADLINE, join).await {
            Ok(_) => debug!("{name} stopped"),
            // An in-flight delivery may be abandoned here.
            Err(_) => warn!("{name} did not stop within deadline, abandoning"),
        }
    }))
    .await;

    Ok(())
}
