use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::model::{ModelKind, PopularStock, PredictionRequest, PredictionResponse};
use reqwest::StatusCode;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("stockify-tui/", env!("CARGO_PKG_VERSION"));
const PREDICT_FAILED_MESSAGE: &str = "Failed to get predictions";

/// HTTP client for the prediction service.
///
/// Clones share the in-flight flags, so a clone handed to a background task
/// still blocks overlapping submissions from the client it came from.
#[derive(Clone)]
pub struct PredictionClient {
    http: reqwest::Client,
    config: ClientConfig,
    predict_in_flight: Arc<AtomicBool>,
    list_in_flight: Arc<AtomicBool>,
}

/// Holds an in-flight flag for the lifetime of one request.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, ClientError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ClientError::Busy)?;
        Ok(Self(flag.clone()))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PredictionClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        info!("Prediction client targeting {}", config.api_base_url);
        Ok(Self {
            http,
            config,
            predict_in_flight: Arc::new(AtomicBool::new(false)),
            list_in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn predict_in_flight(&self) -> bool {
        self.predict_in_flight.load(Ordering::Acquire)
    }

    /// Validates the form values, then runs `POST /predict`.
    pub async fn predict(
        &self,
        ticker: &str,
        model: ModelKind,
        days: i64,
    ) -> Result<PredictionResponse, ClientError> {
        let request = PredictionRequest::new(ticker, model, days)?;
        self.submit(&request).await
    }

    async fn submit(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionResponse, ClientError> {
        let _guard = InFlightGuard::acquire(&self.predict_in_flight)?;
        let url = self.config.endpoint("predict")?;
        info!(
            "Requesting {}-day prediction for {} using {}",
            request.days(),
            request.ticker(),
            request.model()
        );

        let body = with_timeout(self.config.predict_timeout, async {
            let res = self.http.post(url).json(request).send().await?;
            read_body(res).await
        })
        .await
        .inspect_err(|e| warn!("Prediction request for {} failed: {}", request.ticker(), e))?;

        let response: PredictionResponse = serde_json::from_str(&body).map_err(|e| {
            ClientError::Transport(format!("Unreadable response from prediction service: {}", e))
        })?;

        if response.is_error() {
            let message = response
                .error
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(PREDICT_FAILED_MESSAGE)
                .to_string();
            warn!("Prediction service reported an error for {}: {}", request.ticker(), message);
            return Err(ClientError::Application(message));
        }

        debug!(
            "Received {} predictions for {}",
            response.predictions.len(),
            request.ticker()
        );
        Ok(response)
    }

    /// `GET /popular`. An empty or non-array payload is an error.
    pub async fn list_popular(&self) -> Result<Vec<PopularStock>, ClientError> {
        let _guard = InFlightGuard::acquire(&self.list_in_flight)?;
        let url = self.config.endpoint("popular")?;
        debug!("Fetching popular stocks from {}", url);

        let body = with_timeout(self.config.list_timeout, async {
            let res = self.http.get(url).send().await?;
            read_body(res).await
        })
        .await
        .inspect_err(|e| warn!("Fetching popular stocks failed: {}", e))?;

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ClientError::InvalidFormat(format!("response is not JSON ({})", e)))?;
        let entries = match value {
            serde_json::Value::Array(entries) if !entries.is_empty() => entries,
            serde_json::Value::Array(_) => {
                return Err(ClientError::InvalidFormat("empty stock list".to_string()));
            }
            _ => return Err(ClientError::InvalidFormat("expected a list of stocks".to_string())),
        };

        let stocks = entries
            .into_iter()
            .map(serde_json::from_value::<PopularStock>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ClientError::InvalidFormat(e.to_string()))?;
        info!("Loaded {} popular stocks", stocks.len());
        Ok(stocks)
    }

    /// Connectivity check against `GET /health`.
    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        let url = self.config.endpoint("health")?;
        let body = with_timeout(self.config.list_timeout, async {
            let res = self.http.get(url).send().await?;
            read_body(res).await
        })
        .await?;
        serde_json::from_str(&body)
            .map_err(|e| ClientError::InvalidFormat(format!("health response is not JSON ({})", e)))
    }
}

/// Dropping the request future on expiry aborts the underlying connection.
async fn with_timeout<T, F>(limit: Option<Duration>, fut: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ClientError::Timeout(limit))?,
        None => fut.await,
    }
}

async fn read_body(res: reqwest::Response) -> Result<String, ClientError> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        return Err(ClientError::Transport(error_message(status, &text)));
    }
    Ok(text)
}

/// Message for a non-2xx response: the JSON `error` (or `message`) field,
/// else a generic status line for JSON or empty bodies, else the raw text.
fn error_message(status: StatusCode, body: &str) -> String {
    let generic = format!("Server error: {}", status.as_u16());
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return generic;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => ["error", "message"]
            .iter()
            .filter_map(|key| value.get(*key).and_then(|v| v.as_str()))
            .map(str::trim)
            .find(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or(generic),
        Err(_) => trimmed.to_string(),
    }
}
