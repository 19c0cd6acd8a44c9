//! Test Transaction Producer
//!
//! Generates and publishes test transactions to NATS for engine testing.
//!
//! Usage: test-producer [nats_url] [subject] [count] [fraud_rate] [delay_ms] [request]
//!
//! With `request` as the last argument every transaction is sent as a NATS
//! request and the decision reply is logged.

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use fraud_decision_engine::types::RawTransaction;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    fn customer_id(&mut self) -> String {
        format!("CUST{:05}", self.rng.gen_range(1..5000))
    }

    /// Daytime timestamp within the last week
    fn daytime(&mut self) -> NaiveDateTime {
        let day = Utc::now().date_naive() - ChronoDuration::days(self.rng.gen_range(0..7));
        day.and_hms_opt(self.rng.gen_range(8..22), self.rng.gen_range(0..60), 0)
            .unwrap_or_else(|| Utc::now().naive_utc())
    }

    /// Timestamp inside the 02:00-04:59 window
    fn night(&mut self) -> NaiveDateTime {
        let day = Utc::now().date_naive() - ChronoDuration::days(self.rng.gen_range(0..7));
        day.and_hms_opt(self.rng.gen_range(2..5), self.rng.gen_range(0..60), 0)
            .unwrap_or_else(|| Utc::now().naive_utc())
    }

    /// Generate a random legitimate transaction
    fn generate_legitimate(&mut self) -> RawTransaction {
        let customer_id = self.customer_id();
        let timestamp = self.daytime();

        RawTransaction {
            customer_id,
            kyc_verified: 1,
            account_age_days: self.rng.gen_range(30..2000),
            transaction_amount: (self.rng.gen_range(5.0..800.0_f64) * 100.0).round() / 100.0,
            channel: self.random_choice(&["POS", "Mobile", "ATM", "Web"]).to_string(),
            timestamp: timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }

    /// Generate a suspicious transaction that trips one or more rules
    fn generate_suspicious(&mut self) -> RawTransaction {
        let customer_id = self.customer_id();
        let timestamp = if self.rng.gen_bool(0.6) {
            self.night()
        } else {
            self.daytime()
        };

        let transaction_amount = if self.rng.gen_bool(0.2) {
            self.rng.gen_range(200_001.0..500_000.0_f64)
        } else {
            self.rng.gen_range(1_500.0..50_000.0_f64)
        };

        RawTransaction {
            customer_id,
            kyc_verified: u8::from(self.rng.gen_bool(0.3)),
            account_age_days: self.rng.gen_range(0..30),
            transaction_amount: (transaction_amount * 100.0).round() / 100.0,
            channel: self
                .random_choice(&["International", "Wire", "Web", "Mobile"])
                .to_string(),
            timestamp: timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Transaction Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("transactions");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args
        .get(4)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.1_f64)
        .clamp(0.0, 1.0);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);
    let request_mode = args.get(6).is_some_and(|s| s == "request");

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        request_mode = request_mode,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, fraud_rate, delay_ms).await;
        }
    };

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    info!("Starting to publish {} transactions...", count);

    let mut legitimate_count = 0;
    let mut suspicious_count = 0;
    let mut flagged_count = 0;

    for i in 0..count {
        let transaction = if rng.gen_bool(fraud_rate) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            legitimate_count += 1;
            generator.generate_legitimate()
        };

        let payload = serde_json::to_vec(&transaction)?;

        if request_mode {
            match client.request(subject.to_string(), payload.into()).await {
                Ok(reply) => {
                    let decision: serde_json::Value = serde_json::from_slice(&reply.payload)?;
                    if decision["is_fraud"].as_bool() == Some(true) {
                        flagged_count += 1;
                    }
                    info!(
                        customer_id = %transaction.customer_id,
                        amount = transaction.transaction_amount,
                        decision = %decision,
                        "Decision received"
                    );
                }
                Err(e) => warn!(error = %e, "Request failed"),
            }
        } else {
            client.publish(subject.to_string(), payload.into()).await?;
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} transactions ({} legitimate, {} suspicious)",
                i + 1,
                count,
                legitimate_count,
                suspicious_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    client.flush().await?;

    info!(
        "Completed! Published {} transactions ({} legitimate, {} suspicious)",
        count, legitimate_count, suspicious_count
    );
    if request_mode {
        info!(flagged = flagged_count, "Decisions flagged as fraud");
    }

    Ok(())
}

async fn run_dry_mode(count: u64, fraud_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let transaction = if rng.gen_bool(fraud_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        let json = serde_json::to_string_pretty(&transaction)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample transaction {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
