use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::{
    agent::Agent,
    api::handler::AppState,
    config::Config,
    error::AppResult,
    extraction::LlmExtractor,
    gateway::{ExecutionGateway, SignerGateway},
    intake::{FsInboxSource, IntakePipeline},
    invoice::InvoiceRepository,
    scheduler::PaymentScheduler,
    time::{Clock, SystemClock},
    treasury::TreasuryRebalancer,
};

pub fn initialize_app_state(config: &Config) -> AppResult<(AppState, Arc<Agent>)> {
    info!("Initializing application components ...");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let repo = Arc::new(InvoiceRepository::new());
    info!("✅ Invoice repository initialized");

    let gateway: Arc<dyn ExecutionGateway> =
        Arc::new(SignerGateway::new(config.gateway.clone()));
    info!(
        "✅ Execution gateway initialized (signer: {}, denom: {})",
        config.gateway.signer_url, config.gateway.denom
    );

    let extractor = Arc::new(LlmExtractor::new(config.extraction.clone()));
    let intake = Arc::new(IntakePipeline::new(
        extractor,
        config.vendors.clone(),
        repo.clone(),
        clock.clone(),
    ));
    info!(
        "✅ Intake pipeline initialized ({} allow-listed vendors)",
        config.vendors.len()
    );

    let scheduler = Arc::new(PaymentScheduler::new(
        config.payment_buffer_days,
        repo.clone(),
        gateway.clone(),
        clock.clone(),
    ));
    info!(
        "✅ Payment scheduler initialized (buffer: {} days)",
        config.payment_buffer_days
    );

    let rebalancer = Arc::new(TreasuryRebalancer::new(
        config.treasury_keep_threshold,
        config.liquidity_lookahead_hours,
        repo.clone(),
        gateway.clone(),
    ));
    info!(
        "✅ Treasury rebalancer initialized (keep-threshold: {}, lookahead: {}h)",
        config.treasury_keep_threshold, config.liquidity_lookahead_hours
    );

    let source = Arc::new(FsInboxSource::new(config.inbox_dir.clone()));
    let agent = Arc::new(Agent::new(
        source,
        intake,
        scheduler.clone(),
        rebalancer.clone(),
        clock,
        config.invoice_check_cadence,
        config.treasury_cadence,
    ));

    let state = AppState {
        repo,
        scheduler,
        rebalancer,
        gateway,
        started_at: Utc::now(),
    };

    Ok((state, agent))
}
