// =============================================================================
// Broker REST API Client — Kite Connect style token-header auth
// =============================================================================
//
// SECURITY: the access token is never logged or serialized. Every request
// carries `Authorization: token <api_key>:<access_token>` plus the API
// version header. Order submission is a single blocking request/response with
// no retry and no idempotency key — a transport failure mid-order leaves the
// order state unknown to the caller.
// =============================================================================

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::broker::instruments::{parse_instrument_dump, Instrument};

/// Broker REST client.
///
/// The access token is folded into the default `Authorization` header at
/// construction time and kept nowhere else.
#[derive(Clone)]
pub struct KiteClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

/// One net position leg from the broker's positions book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetPosition {
    pub tradingsymbol: String,
    pub exchange: String,
    pub product: String,
    pub quantity: i64,
    #[serde(default)]
    pub average_price: f64,
    #[serde(default)]
    pub pnl: f64,
}

impl KiteClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new `KiteClient`.
    ///
    /// # Arguments
    /// * `api_key`      — application API key.
    /// * `access_token` — daily access token obtained from the login flow.
    pub fn new(api_key: impl Into<String>, access_token: impl Into<String>) -> Self {
        let api_key = api_key.into();
        let access_token = access_token.into();

        let mut default_headers = HeaderMap::new();
        default_headers.insert("X-Kite-Version", HeaderValue::from_static("3"));
        if let Ok(val) = HeaderValue::from_str(&format!("token {api_key}:{access_token}")) {
            default_headers.insert(reqwest::header::AUTHORIZATION, val);
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        debug!("KiteClient initialised (base_url=https://api.kite.trade)");

        Self {
            api_key,
            base_url: "https://api.kite.trade".to_string(),
            client,
        }
    }

    /// Override the base URL (stub servers in integration setups).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------

    /// SHA-256 checksum over `api_key + request_token + api_secret`, required
    /// by the session-token exchange.
    pub fn session_checksum(api_key: &str, request_token: &str, api_secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(api_key.as_bytes());
        hasher.update(request_token.as_bytes());
        hasher.update(api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// POST /session/token — exchange a login request token for an access
    /// token. Used once per trading day before the engine starts.
    #[instrument(skip(self, request_token, api_secret), name = "kite::exchange_request_token")]
    pub async fn exchange_request_token(
        &self,
        request_token: &str,
        api_secret: &str,
    ) -> Result<String> {
        let checksum = Self::session_checksum(&self.api_key, request_token, api_secret);
        let url = format!("{}/session/token", self.base_url);

        let resp = self
            .client
            .post(&url)
            .form(&[
                ("api_key", self.api_key.as_str()),
                ("request_token", request_token),
                ("checksum", checksum.as_str()),
            ])
            .send()
            .await
            .context("POST /session/token request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse session response")?;

        if !status.is_success() {
            anyhow::bail!("broker POST /session/token returned {}: {}", status, body);
        }

        body["data"]["access_token"]
            .as_str()
            .map(str::to_string)
            .context("session response missing access_token")
    }

    // -------------------------------------------------------------------------
    // Quotes
    // -------------------------------------------------------------------------

    /// GET /quote/ltp — last traded price for one instrument key
    /// (e.g. "NSE:NIFTY 50").
    #[instrument(skip(self), name = "kite::ltp")]
    pub async fn ltp(&self, instrument_key: &str) -> Result<f64> {
        let url = format!("{}/quote/ltp", self.base_url);

        let resp = self
            .client
            .get(&url)
            .query(&[("i", instrument_key)])
            .send()
            .await
            .context("GET /quote/ltp request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse ltp response")?;

        if !status.is_success() {
            anyhow::bail!("broker GET /quote/ltp returned {}: {}", status, body);
        }

        let price = body["data"][instrument_key]["last_price"]
            .as_f64()
            .with_context(|| format!("ltp response missing last_price for {instrument_key}"))?;

        debug!(instrument_key, price, "spot price retrieved");
        Ok(price)
    }

    // -------------------------------------------------------------------------
    // Instruments
    // -------------------------------------------------------------------------

    /// GET /instruments/{exchange} — full contract dump for one exchange
    /// segment, served as CSV.
    #[instrument(skip(self), name = "kite::instruments")]
    pub async fn instruments(&self, exchange: &str) -> Result<Vec<Instrument>> {
        let url = format!("{}/instruments/{}", self.base_url, exchange);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET /instruments/{exchange} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("broker GET /instruments/{} returned {}", exchange, status);
        }

        let body = resp
            .text()
            .await
            .context("failed to read instrument dump body")?;

        let instruments = parse_instrument_dump(body.as_bytes())
            .context("failed to parse instrument dump CSV")?;

        debug!(exchange, count = instruments.len(), "instrument dump fetched");
        Ok(instruments)
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// POST /orders/regular — submit a market order.
    ///
    /// # Arguments
    /// * `exchange`         — e.g. "NFO"
    /// * `tradingsymbol`    — resolved contract symbol
    /// * `transaction_type` — "BUY" or "SELL"
    /// * `quantity`         — order quantity in units
    /// * `product`          — e.g. "MIS"
    ///
    /// Returns the broker-assigned order id.
    #[instrument(skip(self), name = "kite::place_market_order")]
    pub async fn place_market_order(
        &self,
        exchange: &str,
        tradingsymbol: &str,
        transaction_type: &str,
        quantity: u32,
        product: &str,
    ) -> Result<String> {
        let url = format!("{}/orders/regular", self.base_url);
        let quantity = quantity.to_string();

        debug!(exchange, tradingsymbol, transaction_type, %quantity, "placing order");

        let resp = self
            .client
            .post(&url)
            .form(&[
                ("exchange", exchange),
                ("tradingsymbol", tradingsymbol),
                ("transaction_type", transaction_type),
                ("quantity", quantity.as_str()),
                ("product", product),
                ("order_type", "MARKET"),
            ])
            .send()
            .await
            .context("POST /orders/regular request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse order response")?;

        if !status.is_success() {
            anyhow::bail!("broker POST /orders/regular returned {}: {}", status, body);
        }

        let order_id = body["data"]["order_id"]
            .as_str()
            .context("order response missing order_id")?
            .to_string();

        debug!(tradingsymbol, order_id = %order_id, "order placed");
        Ok(order_id)
    }

    // -------------------------------------------------------------------------
    // Positions
    // -------------------------------------------------------------------------

    /// GET /portfolio/positions — the net positions book.
    #[instrument(skip(self), name = "kite::net_positions")]
    pub async fn net_positions(&self) -> Result<Vec<NetPosition>> {
        let url = format!("{}/portfolio/positions", self.base_url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /portfolio/positions request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse positions response")?;

        if !status.is_success() {
            anyhow::bail!("broker GET /portfolio/positions returned {}: {}", status, body);
        }

        let net = body["data"]["net"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut positions = Vec::with_capacity(net.len());
        for entry in net {
            match serde_json::from_value::<NetPosition>(entry) {
                Ok(pos) => positions.push(pos),
                Err(e) => warn!(error = %e, "skipping malformed position entry"),
            }
        }

        debug!(count = positions.len(), "net positions retrieved");
        Ok(positions)
    }
}

impl std::fmt::Debug for KiteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KiteClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_checksum_is_sha256_hex() {
        // sha256("abc") — the three parts concatenate before hashing.
        let sum = KiteClient::session_checksum("a", "b", "c");
        assert_eq!(
            sum,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn debug_redacts_credentials() {
        let client = KiteClient::new("key", "secret-token");
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
