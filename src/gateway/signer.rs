use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::{to_base_units, ExecutionGateway, Receipt, TxHash};

/// Gateway backed by a signer sidecar.
///
/// The sidecar owns the wallet key and the lending-pool contract calls; this
/// side only speaks JSON over HTTP. Wallet nonces are a shared mutable
/// resource, so the three transaction-submitting calls are serialized behind
/// `tx_lock`; only the balance query runs unlocked.
pub struct SignerGateway {
    client: reqwest::Client,
    config: GatewayConfig,
    tx_lock: tokio::sync::Mutex<()>,
}

#[derive(Deserialize)]
struct TxResponse {
    tx_hash: String,
}

#[derive(Deserialize)]
struct BalanceResponse {
    /// Balance in smallest units of the configured denom.
    amount: u64,
}

impl SignerGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            tx_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn submit(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<TxResponse, GatewayError> {
        let _guard = self.tx_lock.lock().await;

        let url = format!("{}/{}", self.config.signer_url, endpoint);
        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(GatewayError::Transport(format!(
                "{} returned {}",
                endpoint,
                response.status()
            )));
        }

        let parsed: TxResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("bad {} response: {}", endpoint, e)))?;
        Ok(parsed)
    }
}

#[async_trait]
impl ExecutionGateway for SignerGateway {
    async fn withdraw(&self, amount: Decimal) -> Result<Receipt, GatewayError> {
        let base_units = to_base_units(amount, self.config.decimals)?;
        info!("Withdrawing {} {} from lending pool", amount, self.config.denom);

        let response = self
            .submit(
                "pool/withdraw",
                serde_json::json!({
                    "denom": self.config.denom,
                    "amount": base_units.to_string(),
                }),
            )
            .await
            .map_err(|e| GatewayError::WithdrawFailed(e.to_string()))?;

        Ok(Receipt {
            tx_hash: response.tx_hash,
        })
    }

    async fn deposit(&self, amount: Decimal) -> Result<Receipt, GatewayError> {
        let base_units = to_base_units(amount, self.config.decimals)?;
        info!("Depositing {} {} into lending pool", amount, self.config.denom);

        let response = self
            .submit(
                "pool/deposit",
                serde_json::json!({
                    "denom": self.config.denom,
                    "amount": base_units.to_string(),
                }),
            )
            .await
            .map_err(|e| GatewayError::DepositFailed(e.to_string()))?;

        Ok(Receipt {
            tx_hash: response.tx_hash,
        })
    }

    async fn transfer(
        &self,
        to_address: &str,
        amount: Decimal,
    ) -> Result<TxHash, GatewayError> {
        let base_units = to_base_units(amount, self.config.decimals)?;
        info!("Transferring {} {} to {}", amount, self.config.denom, to_address);

        let response = self
            .submit(
                "transfer",
                serde_json::json!({
                    "to_address": to_address,
                    "denom": self.config.denom,
                    "amount": base_units.to_string(),
                }),
            )
            .await
            .map_err(|e| GatewayError::TransferFailed(e.to_string()))?;

        Ok(response.tx_hash)
    }

    async fn get_balance(&self) -> Result<Decimal, GatewayError> {
        let url = format!("{}/balance/{}", self.config.signer_url, self.config.denom);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::BalanceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::BalanceUnavailable(format!(
                "balance query returned {}",
                response.status()
            )));
        }

        let parsed: BalanceResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::BalanceUnavailable(e.to_string()))?;

        Ok(Decimal::from_i128_with_scale(
            parsed.amount as i128,
            self.config.decimals,
        ))
    }
}
