use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::types::WalletInfo;

/// Client for the node-earnings API: wallet listing and per-wallet unclaimed earnings.
pub struct EarningsApiClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("API rejected request: {0}")]
    Rejected(String),
    #[error("malformed API response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Short label for logs and the `kind` metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::Rejected(_) => "rejected",
            Self::Malformed(_) => "malformed",
        }
    }
}

/// Every response is wrapped as `{status, data, message}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct EarningsRequest<'a> {
    #[serde(rename = "walletID")]
    wallet_id: &'a str,
}

/// Earnings arrive either as a JSON number or as a numeric string.
#[derive(Debug)]
struct Earnings(f64);

impl<'de> Deserialize<'de> for Earnings {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de;

        struct NumberOrString;

        impl de::Visitor<'_> for NumberOrString {
            type Value = Earnings;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "a number or numeric string")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(Earnings(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Earnings(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Earnings(v as f64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.trim()
                    .parse::<f64>()
                    .map(Earnings)
                    .map_err(|e| E::custom(format!("invalid earnings {v:?}: {e}")))
            }
        }

        deserializer.deserialize_any(NumberOrString)
    }
}

/// Decode an envelope body and unwrap its payload.
pub fn parse_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let envelope: Envelope<T> =
        serde_json::from_slice(body).map_err(|e| ApiError::Malformed(e.to_string()))?;
    if !envelope.status {
        return Err(ApiError::Rejected(
            envelope
                .message
                .unwrap_or_else(|| "no message".to_string()),
        ));
    }
    envelope
        .data
        .ok_or_else(|| ApiError::Malformed("envelope has no data".to_string()))
}

/// Decode an earnings response into a non-negative amount.
pub fn parse_earnings(body: &[u8]) -> Result<f64, ApiError> {
    let Earnings(value) = parse_envelope(body)?;
    if !value.is_finite() || value < 0.0 {
        return Err(ApiError::Malformed(format!(
            "earnings must be a non-negative number, got {value}"
        )));
    }
    Ok(value)
}

impl EarningsApiClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }

    pub fn wallets_url(&self) -> String {
        format!("{}/wallet/getWallets", self.base_url)
    }

    pub fn earnings_url(&self) -> String {
        format!("{}/key/keyUnclaimedEarning", self.base_url)
    }

    /// Current wallet id → display name mapping, in API order.
    pub async fn fetch_wallets(&self) -> Result<Vec<WalletInfo>, ApiError> {
        let request = self.client.post(self.wallets_url());
        let body = self.send("wallets", request).await?;
        let wallets: Vec<WalletInfo> = parse_envelope(&body)?;
        debug!(count = wallets.len(), "fetched wallets");
        Ok(wallets)
    }

    pub async fn fetch_unclaimed_earnings(&self, wallet_id: &str) -> Result<f64, ApiError> {
        let request = self
            .client
            .post(self.earnings_url())
            .json(&EarningsRequest { wallet_id });
        let body = self.send("earnings", request).await?;
        let value = parse_earnings(&body)?;
        debug!(wallet_id, value, "fetched unclaimed earnings");
        Ok(value)
    }

    async fn send(
        &self,
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<u8>, ApiError> {
        let start = Instant::now();
        let result = self.send_inner(request).await;
        let ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!(
            "wallet_monitor_api_latency_ms",
            "endpoint" => endpoint,
            "status" => if result.is_ok() { "ok" } else { "err" }
        )
        .record(ms);
        result
    }

    async fn send_inner(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let resp = request.bearer_auth(&self.token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}
