// Recurring drivers: the invoice-check loop and the treasury loop run on
// independent cadences against the same funds.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::intake::{IntakePipeline, InvoiceSource};
use crate::invoice::InvoiceState;
use crate::scheduler::PaymentScheduler;
use crate::time::Clock;
use crate::treasury::TreasuryRebalancer;

/// Recurring cadence for a background loop.
///
/// Parsed from config strings: `"hourly"`, `"daily:2"` (02:00 UTC), `"300s"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Once per day at the given UTC hour.
    Daily { utc_hour: u32 },
    /// Every `secs` seconds.
    Interval { secs: u64 },
}

impl Cadence {
    pub fn hourly() -> Self {
        Cadence::Interval { secs: 3600 }
    }

    /// Next instant this cadence should run after `now`.
    pub fn next_run(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Cadence::Interval { secs } => now + Duration::seconds(*secs as i64),
            Cadence::Daily { utc_hour } => {
                let today = now.date_naive().and_hms_opt(*utc_hour, 0, 0).unwrap();
                let today_dt = Utc.from_utc_datetime(&today);

                // If the hour has passed today, run tomorrow.
                if today_dt <= now {
                    let tomorrow = (now.date_naive() + Duration::days(1))
                        .and_hms_opt(*utc_hour, 0, 0)
                        .unwrap();
                    Utc.from_utc_datetime(&tomorrow)
                } else {
                    today_dt
                }
            }
        }
    }
}

impl FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "hourly" {
            return Ok(Cadence::hourly());
        }
        if let Some(hour) = s.strip_prefix("daily:") {
            let utc_hour: u32 = hour
                .parse()
                .map_err(|_| format!("bad daily cadence hour: {}", s))?;
            if utc_hour > 23 {
                return Err(format!("daily cadence hour out of range: {}", s));
            }
            return Ok(Cadence::Daily { utc_hour });
        }
        if let Some(secs) = s.strip_suffix('s') {
            let secs: u64 = secs
                .parse()
                .map_err(|_| format!("bad interval cadence: {}", s))?;
            if secs == 0 {
                return Err("interval cadence must be positive".to_string());
            }
            return Ok(Cadence::Interval { secs });
        }
        Err(format!("unrecognized cadence: {}", s))
    }
}

/// The autonomous agent: polls for invoices, schedules payments, rebalances
/// the treasury. No failure in either loop crashes the process or drops a
/// pending payment timer.
pub struct Agent {
    source: Arc<dyn InvoiceSource>,
    intake: Arc<IntakePipeline>,
    scheduler: Arc<PaymentScheduler>,
    rebalancer: Arc<TreasuryRebalancer>,
    clock: Arc<dyn Clock>,
    invoice_cadence: Cadence,
    treasury_cadence: Cadence,
}

impl Agent {
    pub fn new(
        source: Arc<dyn InvoiceSource>,
        intake: Arc<IntakePipeline>,
        scheduler: Arc<PaymentScheduler>,
        rebalancer: Arc<TreasuryRebalancer>,
        clock: Arc<dyn Clock>,
        invoice_cadence: Cadence,
        treasury_cadence: Cadence,
    ) -> Self {
        Self {
            source,
            intake,
            scheduler,
            rebalancer,
            clock,
            invoice_cadence,
            treasury_cadence,
        }
    }

    /// Start both recurring loops in the background.
    pub fn start(self: Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let agent = self.clone();
        let invoice_loop = tokio::spawn(async move {
            loop {
                let next = agent.invoice_cadence.next_run(agent.clock.now());
                info!("⏰ Next invoice check at {}", next.format("%Y-%m-%d %H:%M:%S"));
                agent.clock.sleep_until(next).await;
                agent.run_invoice_check().await;
            }
        });

        let agent = self.clone();
        let treasury_loop = tokio::spawn(async move {
            loop {
                let next = agent.treasury_cadence.next_run(agent.clock.now());
                info!("⏰ Next treasury tick at {}", next.format("%Y-%m-%d %H:%M:%S"));
                agent.clock.sleep_until(next).await;
                agent.run_treasury_tick().await;
            }
        });

        (invoice_loop, treasury_loop)
    }

    /// One pass of the invoice-check loop: ingest every pending blob and
    /// schedule payment for each record that came out schedulable.
    pub async fn run_invoice_check(&self) {
        info!("🔄 Checking for new invoices");

        let blobs = match self.source.poll().await {
            Ok(blobs) => blobs,
            Err(e) => {
                error!("Invoice source poll failed: {}", e);
                return;
            }
        };

        if blobs.is_empty() {
            info!("✓ No new invoices");
            return;
        }

        for text in blobs {
            let record = match self.intake.record_invoice(&text).await {
                Ok(record) => record,
                Err(e) => {
                    error!("Invoice intake failed: {}", e);
                    continue;
                }
            };

            if record.state != InvoiceState::Received {
                continue;
            }

            if let Err(e) = self.scheduler.schedule(&record.invoice_number).await {
                error!(
                    "Scheduling invoice {} failed: {}",
                    record.invoice_number, e
                );
            }
        }

        info!("✓ Invoice check completed");
    }

    /// One treasury tick. Failures skip the tick; the next cadence retries.
    pub async fn run_treasury_tick(&self) {
        match self.rebalancer.tick(self.clock.now()).await {
            Ok(Some(action)) => info!("✓ Treasury rebalanced: {:?}", action),
            Ok(None) => {}
            Err(e) => error!("❌ Treasury tick failed, waiting for next cadence: {}", e),
        }
    }
}
