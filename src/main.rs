//! Fraud Decision Engine - Main Entry Point
//!
//! Consumes transactions from NATS, decides on each one, answers request-reply
//! callers and publishes prediction records and fraud alerts.

use anyhow::Result;
use fraud_decision_engine::{
    config::{AppConfig, LoggingConfig},
    consumer::TransactionConsumer,
    engine::DecisionEngine,
    explain::TemplateExplainer,
    metrics::MetricsReporter,
    models::ModelLoader,
    producer::NatsPublisher,
    profiles::{NoProfiles, ProfileProvider, StaticProfiles},
    types::RawTransaction,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("fraud_decision_engine={}", config.level))
    })?;

    if config.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };

    init_logging(&config.logging)?;

    info!("Starting Fraud Decision Engine");
    info!(
        flag_threshold = config.decision.flag_threshold,
        alert_threshold = config.decision.alert_threshold,
        "Configuration loaded successfully"
    );

    // Load the classifier; a missing model means rule-only decisions
    let scorer = ModelLoader::with_threads(config.model.onnx_threads).load_scorer(&config.model)?;

    let profiles: Arc<dyn ProfileProvider> = match &config.profiles.path {
        Some(path) => {
            let profiles = StaticProfiles::from_json_file(path)?;
            info!(customers = profiles.len(), "Customer profiles loaded");
            Arc::new(profiles)
        }
        None => {
            info!("No profile source configured, using feature defaults");
            Arc::new(NoProfiles)
        }
    };

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = TransactionConsumer::new(
        client.clone(),
        &config.nats.transaction_subject,
        &config.nats.queue_group,
    );
    let publisher = Arc::new(NatsPublisher::new(
        client.clone(),
        &config.nats.prediction_subject,
        &config.nats.alert_subject,
    ));

    let engine = Arc::new(
        DecisionEngine::new(&config, scorer, publisher.clone())
            .with_profiles(profiles)
            .with_explainer(Arc::new(TemplateExplainer)),
    );
    info!(
        scorer = %engine.scorer_name(),
        rules = engine.rule_count(),
        "Decision engine initialized"
    );

    let num_workers = config.pipeline.workers;
    info!(
        workers = num_workers,
        subject = %consumer.subject(),
        alerts = %publisher.alert_subject(),
        "Starting transaction processing loop"
    );

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    // Start metrics reporter (prints summary every 30 seconds)
    let reporter = MetricsReporter::new(engine.metrics().clone(), 30);
    tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let message = tokio::select! {
            message = subscription.next() => match message {
                Some(message) => message,
                None => break,
            },
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        };

        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(error = %e, "Worker pool closed");
                break;
            }
        };

        let engine = engine.clone();
        let publisher = publisher.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let reply = message.reply.as_ref().map(|s| s.to_string());

            let transaction = match serde_json::from_slice::<RawTransaction>(&message.payload) {
                Ok(transaction) => transaction,
                Err(e) => {
                    engine.metrics().record_malformed_input();
                    warn!(error = %e, "Failed to deserialize transaction");
                    if let Some(subject) = reply {
                        if let Err(e) = publisher.reply_error(subject, &e.to_string()).await {
                            error!(error = %e, "Failed to send error reply");
                        }
                    }
                    drop(permit);
                    return;
                }
            };

            let customer_id = transaction.customer_id.clone();
            match engine.process(transaction).await {
                Ok(assessment) => {
                    if let Some(subject) = reply {
                        if let Err(e) = publisher.reply(subject, &assessment.decision).await {
                            error!(customer_id = %customer_id, error = %e, "Failed to send decision reply");
                        }
                    }

                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % 100 == 0 {
                        let stats = engine.metrics().get_processing_stats();
                        info!(
                            processed = count,
                            throughput = format!("{:.1} tx/s", engine.metrics().get_throughput()),
                            avg_latency_us = stats.mean_us,
                            "Processing milestone"
                        );
                    }
                }
                Err(e) => {
                    debug!(customer_id = %customer_id, error = %e, "Transaction rejected");
                    if let Some(subject) = reply {
                        if let Err(e) = publisher.reply_error(subject, &e.to_string()).await {
                            error!(customer_id = %customer_id, error = %e, "Failed to send error reply");
                        }
                    }
                }
            }

            drop(permit);
        });
    }

    // Wait for in-flight decisions, then for the writes they started
    let _ = semaphore.acquire_many(num_workers as u32).await;
    let grace = Duration::from_millis(config.pipeline.persist_timeout_ms.saturating_mul(2));
    engine.shutdown(grace).await;
    if let Err(e) = client.flush().await {
        error!(error = %e, "Failed to flush NATS publishes");
    }

    info!("Decision engine shutting down...");
    engine.metrics().print_summary();

    Ok(())
}
