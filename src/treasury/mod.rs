// Treasury Rebalancer - keeps idle funds earning yield without starving
// scheduled payments of liquidity.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::error::AppResult;
use crate::gateway::ExecutionGateway;
use crate::invoice::InvoiceRepository;

/// One funds movement decided by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceAction {
    /// Move excess operating balance into the yield pool.
    DepositExcess(Decimal),
    /// Pull funds out of the pool to cover upcoming scheduled payments.
    WithdrawShortfall(Decimal),
}

/// Decide what a tick should do, given the operating balance, the configured
/// keep-threshold and the total owed by soon-firing scheduled payments.
///
/// Liquidity comes first: if upcoming payments exceed the balance the pool is
/// tapped, regardless of the threshold. Only a balance that also clears the
/// threshold gets skimmed.
pub fn plan(
    balance: Decimal,
    keep_threshold: Decimal,
    upcoming: Decimal,
) -> Option<RebalanceAction> {
    if upcoming > balance {
        return Some(RebalanceAction::WithdrawShortfall(upcoming - balance));
    }
    if balance > keep_threshold {
        return Some(RebalanceAction::DepositExcess(balance - keep_threshold));
    }
    None
}

pub struct TreasuryRebalancer {
    keep_threshold: Decimal,
    lookahead: Duration,
    repo: Arc<InvoiceRepository>,
    gateway: Arc<dyn ExecutionGateway>,
}

impl TreasuryRebalancer {
    pub fn new(
        keep_threshold: Decimal,
        lookahead_hours: i64,
        repo: Arc<InvoiceRepository>,
        gateway: Arc<dyn ExecutionGateway>,
    ) -> Self {
        Self {
            keep_threshold,
            lookahead: Duration::hours(lookahead_hours),
            repo,
            gateway,
        }
    }

    pub fn keep_threshold(&self) -> Decimal {
        self.keep_threshold
    }

    /// Preview what a tick at `now` would do, without touching the gateway's
    /// transaction path. Used by the status API.
    pub async fn preview(&self, now: DateTime<Utc>) -> AppResult<Option<RebalanceAction>> {
        let balance = self.gateway.get_balance().await?;
        let upcoming = self.repo.scheduled_amount_due_by(now + self.lookahead).await;
        Ok(plan(balance, self.keep_threshold, upcoming))
    }

    /// One rebalance tick. A gateway failure bubbles up and leaves the
    /// treasury unchanged; the caller's cadence loop retries next tick.
    pub async fn tick(&self, now: DateTime<Utc>) -> AppResult<Option<RebalanceAction>> {
        let balance = self.gateway.get_balance().await?;
        let upcoming = self.repo.scheduled_amount_due_by(now + self.lookahead).await;

        let Some(action) = plan(balance, self.keep_threshold, upcoming) else {
            info!(
                "Treasury balanced: balance {}, threshold {}, upcoming {}",
                balance, self.keep_threshold, upcoming
            );
            return Ok(None);
        };

        match action {
            RebalanceAction::DepositExcess(amount) => {
                info!("Depositing {} excess into the lending pool", amount);
                self.gateway.deposit(amount).await?;
            }
            RebalanceAction::WithdrawShortfall(amount) => {
                info!(
                    "Withdrawing {} from the lending pool to cover {} of upcoming payments",
                    amount, upcoming
                );
                self.gateway.withdraw(amount).await?;
            }
        }

        Ok(Some(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::{GatewayCall, MockGateway};
    use crate::invoice::InvoiceRecord;
    use rust_decimal_macros::dec;

    fn rebalancer(
        balance: Decimal,
        keep: Decimal,
    ) -> (TreasuryRebalancer, Arc<MockGateway>, Arc<InvoiceRepository>) {
        let repo = Arc::new(InvoiceRepository::new());
        let gateway = Arc::new(MockGateway::with_balance(balance));
        let rebalancer = TreasuryRebalancer::new(
            keep,
            24,
            repo.clone(),
            gateway.clone() as Arc<dyn ExecutionGateway>,
        );
        (rebalancer, gateway, repo)
    }

    #[test]
    fn test_plan_deposits_exact_excess() {
        // Balance 1500, threshold 100 -> deposit exactly 1400.
        assert_eq!(
            plan(dec!(1500), dec!(100), dec!(0)),
            Some(RebalanceAction::DepositExcess(dec!(1400)))
        );
    }

    #[test]
    fn test_plan_no_action_at_or_below_threshold() {
        assert_eq!(plan(dec!(100), dec!(100), dec!(0)), None);
        assert_eq!(plan(dec!(50), dec!(100), dec!(0)), None);
    }

    #[test]
    fn test_plan_withdraws_shortfall() {
        assert_eq!(
            plan(dec!(200), dec!(100), dec!(700)),
            Some(RebalanceAction::WithdrawShortfall(dec!(500)))
        );
    }

    #[test]
    fn test_plan_shortfall_beats_excess() {
        // Balance above the threshold but still short of upcoming payments.
        assert_eq!(
            plan(dec!(300), dec!(100), dec!(900)),
            Some(RebalanceAction::WithdrawShortfall(dec!(600)))
        );
    }

    #[tokio::test]
    async fn test_tick_deposits_excess() {
        let (rebalancer, gateway, _repo) = rebalancer(dec!(1500), dec!(100));

        let action = rebalancer.tick(Utc::now()).await.unwrap();
        assert_eq!(action, Some(RebalanceAction::DepositExcess(dec!(1400))));
        assert_eq!(gateway.calls(), vec![GatewayCall::Deposit(dec!(1400))]);
        assert_eq!(gateway.balance(), dec!(100));
    }

    #[tokio::test]
    async fn test_tick_withdraws_for_upcoming_payment() {
        let (rebalancer, gateway, repo) = rebalancer(dec!(100), dec!(100));
        let now = Utc::now();

        repo.insert(InvoiceRecord::received(
            "Acme Corp".to_string(),
            "INV-9".to_string(),
            "sei1vendor1".to_string(),
            "2025-08-30".to_string(),
            dec!(600),
            now,
        ))
        .await;
        repo.mark_scheduled("INV-9", now + Duration::hours(12), now)
            .await
            .unwrap();

        let action = rebalancer.tick(now).await.unwrap();
        assert_eq!(action, Some(RebalanceAction::WithdrawShortfall(dec!(500))));
        assert_eq!(gateway.calls(), vec![GatewayCall::Withdraw(dec!(500))]);
    }

    #[tokio::test]
    async fn test_tick_ignores_payments_beyond_lookahead() {
        let (rebalancer, gateway, repo) = rebalancer(dec!(100), dec!(100));
        let now = Utc::now();

        repo.insert(InvoiceRecord::received(
            "Acme Corp".to_string(),
            "INV-10".to_string(),
            "sei1vendor1".to_string(),
            "2025-12-01".to_string(),
            dec!(600),
            now,
        ))
        .await;
        repo.mark_scheduled("INV-10", now + Duration::days(30), now)
            .await
            .unwrap();

        let action = rebalancer.tick(now).await.unwrap();
        assert_eq!(action, None);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tick_failure_leaves_treasury_unchanged() {
        let (rebalancer, gateway, _repo) = rebalancer(dec!(1500), dec!(100));
        gateway.fail_deposits();

        let result = rebalancer.tick(Utc::now()).await;
        assert!(result.is_err());
        assert_eq!(gateway.balance(), dec!(1500));
    }
}
