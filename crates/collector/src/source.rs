use common::earnings_api::{ApiError, EarningsApiClient};
use common::types::WalletInfo;

/// Where a collector cycle gets its wallets and readings from.
pub trait EarningsSource {
    fn fetch_wallets(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<WalletInfo>, ApiError>> + Send;

    fn fetch_unclaimed_earnings(
        &self,
        wallet_id: &str,
    ) -> impl std::future::Future<Output = Result<f64, ApiError>> + Send;
}

impl EarningsSource for EarningsApiClient {
    async fn fetch_wallets(&self) -> Result<Vec<WalletInfo>, ApiError> {
        EarningsApiClient::fetch_wallets(self).await
    }

    async fn fetch_unclaimed_earnings(&self, wallet_id: &str) -> Result<f64, ApiError> {
        EarningsApiClient::fetch_unclaimed_earnings(self, wallet_id).await
    }
}
