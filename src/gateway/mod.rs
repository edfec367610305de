// Execution Gateway - the core's only path to funds movement.
//
// Everything chain-facing (withdraw from the lending pool, build transfer,
// broadcast, deposit back into the pool) sits behind this trait so the
// scheduler and rebalancer can be tested against a deterministic double.

pub mod signer;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::GatewayError;

pub use signer::SignerGateway;

/// Receipt for a pool withdraw/deposit.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub tx_hash: String,
}

pub type TxHash = String;

/// Boundary contract consumed by the payment scheduler and the treasury
/// rebalancer. All calls can fail and are not retried by the core; retry
/// policy, if any, belongs to the implementation behind this trait.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Withdraw funds from the yield pool into the operating balance.
    async fn withdraw(&self, amount: Decimal) -> Result<Receipt, GatewayError>;

    /// Deposit operating funds into the yield pool.
    async fn deposit(&self, amount: Decimal) -> Result<Receipt, GatewayError>;

    /// Transfer stablecoins from the operating balance to `to_address`.
    async fn transfer(&self, to_address: &str, amount: Decimal)
        -> Result<TxHash, GatewayError>;

    /// Current operating balance, in whole stablecoin units.
    async fn get_balance(&self) -> Result<Decimal, GatewayError>;
}

/// Scale a whole-unit amount to the stablecoin's smallest unit.
///
/// Amounts with sub-smallest-unit precision are rejected rather than rounded;
/// a payment must move exactly what the invoice says.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<u64, GatewayError> {
    if amount.is_sign_negative() {
        return Err(GatewayError::AmountOutOfRange(amount.to_string()));
    }
    let scaled = amount
        .checked_mul(Decimal::from(10u64.pow(decimals)))
        .ok_or_else(|| GatewayError::AmountOutOfRange(amount.to_string()))?;
    if scaled.fract() != Decimal::ZERO {
        return Err(GatewayError::AmountOutOfRange(amount.to_string()));
    }
    scaled
        .to_u64()
        .ok_or_else(|| GatewayError::AmountOutOfRange(amount.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_to_base_units_six_decimals() {
        assert_eq!(to_base_units(dec!(500), 6).unwrap(), 500_000_000);
        assert_eq!(to_base_units(dec!(0.25), 6).unwrap(), 250_000);
        assert_eq!(to_base_units(dec!(0), 6).unwrap(), 0);
    }

    #[test]
    fn test_to_base_units_rejects_sub_unit_precision() {
        assert!(to_base_units(dec!(0.0000001), 6).is_err());
    }

    #[test]
    fn test_to_base_units_rejects_negative() {
        assert!(to_base_units(dec!(-1), 6).is_err());
    }
}
