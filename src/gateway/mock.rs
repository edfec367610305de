use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::error::GatewayError;
use crate::gateway::{ExecutionGateway, Receipt, TxHash};

/// Every funds movement the mock observed, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Withdraw(Decimal),
    Deposit(Decimal),
    Transfer { to: String, amount: Decimal },
}

/// Deterministic gateway double. Tracks an operating balance and records
/// calls so scheduler/rebalancer tests can assert on exact amounts.
pub struct MockGateway {
    state: Mutex<MockState>,
}

struct MockState {
    balance: Decimal,
    calls: Vec<GatewayCall>,
    fail_transfer: bool,
    fail_withdraw: bool,
    fail_deposit: bool,
}

impl MockGateway {
    pub fn with_balance(balance: Decimal) -> Self {
        Self {
            state: Mutex::new(MockState {
                balance,
                calls: Vec::new(),
                fail_transfer: false,
                fail_withdraw: false,
                fail_deposit: false,
            }),
        }
    }

    pub fn fail_transfers(&self) {
        self.state.lock().fail_transfer = true;
    }

    pub fn fail_withdrawals(&self) {
        self.state.lock().fail_withdraw = true;
    }

    pub fn fail_deposits(&self) {
        self.state.lock().fail_deposit = true;
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().calls.clone()
    }

    pub fn balance(&self) -> Decimal {
        self.state.lock().balance
    }
}

#[async_trait]
impl ExecutionGateway for MockGateway {
    async fn withdraw(&self, amount: Decimal) -> Result<Receipt, GatewayError> {
        let mut state = self.state.lock();
        if state.fail_withdraw {
            return Err(GatewayError::WithdrawFailed("mock failure".to_string()));
        }
        state.calls.push(GatewayCall::Withdraw(amount));
        state.balance += amount;
        Ok(Receipt {
            tx_hash: format!("WITHDRAW-{}", state.calls.len()),
        })
    }

    async fn deposit(&self, amount: Decimal) -> Result<Receipt, GatewayError> {
        let mut state = self.state.lock();
        if state.fail_deposit {
            return Err(GatewayError::DepositFailed("mock failure".to_string()));
        }
        state.calls.push(GatewayCall::Deposit(amount));
        state.balance -= amount;
        Ok(Receipt {
            tx_hash: format!("DEPOSIT-{}", state.calls.len()),
        })
    }

    async fn transfer(
        &self,
        to_address: &str,
        amount: Decimal,
    ) -> Result<TxHash, GatewayError> {
        let mut state = self.state.lock();
        if state.fail_transfer {
            return Err(GatewayError::TransferFailed("mock failure".to_string()));
        }
        state.calls.push(GatewayCall::Transfer {
            to: to_address.to_string(),
            amount,
        });
        state.balance -= amount;
        Ok(format!("TX-{}", state.calls.len()))
    }

    async fn get_balance(&self) -> Result<Decimal, GatewayError> {
        Ok(self.state.lock().balance)
    }
}
