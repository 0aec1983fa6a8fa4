use crate::config::{MAX_PREDICTION_DAYS, MIN_PREDICTION_DAYS};
use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    LinearRegression,
    RandomForest,
    Lstm,
    Xgboost,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::LinearRegression,
        ModelKind::RandomForest,
        ModelKind::Lstm,
        ModelKind::Xgboost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinearRegression => "linear_regression",
            Self::RandomForest => "random_forest",
            Self::Lstm => "lstm",
            Self::Xgboost => "xgboost",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::LinearRegression => "Linear Regression",
            Self::RandomForest => "Random Forest",
            Self::Lstm => "LSTM",
            Self::Xgboost => "XGBoost",
        }
    }

    /// Next entry of the model selector, wrapping around.
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| {
                ClientError::Validation(format!("Unknown prediction model: {}", s.trim()))
            })
    }
}

/// Body of `POST /predict`. Only constructible through [`PredictionRequest::new`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictionRequest {
    ticker: String,
    model: ModelKind,
    days: u32,
}

impl PredictionRequest {
    pub fn new(ticker: &str, model: ModelKind, days: i64) -> Result<Self, ClientError> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(ClientError::Validation(
                "Please enter a stock ticker symbol".to_string(),
            ));
        }
        if days < MIN_PREDICTION_DAYS as i64 || days > MAX_PREDICTION_DAYS as i64 {
            return Err(ClientError::Validation(format!(
                "Prediction days must be between {} and {}",
                MIN_PREDICTION_DAYS, MAX_PREDICTION_DAYS
            )));
        }
        Ok(Self {
            ticker,
            model,
            days: days as u32,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    pub fn days(&self) -> u32 {
        self.days
    }
}

pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_uppercase()
}

const STATUS_ERROR: &str = "error";

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ModelMetrics {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub r2_score: Option<f64>,
    #[serde(default)]
    pub mse: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PredictionResponse {
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub predictions: Vec<Option<f64>>,
    #[serde(default)]
    pub model_metrics: Option<ModelMetrics>,
    #[serde(default)]
    pub plot1: Option<String>,
    #[serde(default)]
    pub plot2: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PredictionResponse {
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some(STATUS_ERROR)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Option<f64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Option<f64>>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopularStock {
    pub ticker: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_rejects_days_out_of_range() {
        for days in [-1, 0, 31, 365] {
            let err = PredictionRequest::new("AAPL", ModelKind::Lstm, days).unwrap_err();
            assert!(matches!(err, ClientError::Validation(_)), "days={days}");
        }
        assert!(PredictionRequest::new("AAPL", ModelKind::Lstm, 1).is_ok());
        assert!(PredictionRequest::new("AAPL", ModelKind::Lstm, 30).is_ok());
    }

    #[test]
    fn request_rejects_blank_ticker() {
        for ticker in ["", "   ", "\t\n"] {
            let err = PredictionRequest::new(ticker, ModelKind::Lstm, 5).unwrap_err();
            assert_eq!(err.to_string(), "Please enter a stock ticker symbol");
        }
    }

    #[test]
    fn request_uppercases_ticker_and_serializes_wire_shape() {
        let req = PredictionRequest::new("  msft ", ModelKind::RandomForest, 7).unwrap();
        assert_eq!(req.ticker(), "MSFT");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "ticker": "MSFT", "model": "random_forest", "days": 7 })
        );
    }

    #[test]
    fn model_kind_parses_loosely() {
        assert_eq!("LSTM".parse::<ModelKind>().unwrap(), ModelKind::Lstm);
        assert_eq!(
            "random-forest".parse::<ModelKind>().unwrap(),
            ModelKind::RandomForest
        );
        assert!("prophet".parse::<ModelKind>().is_err());
        assert_eq!(ModelKind::Xgboost.next(), ModelKind::LinearRegression);
        assert_eq!(ModelKind::LinearRegression.prev(), ModelKind::Xgboost);
    }

    #[test]
    fn response_tolerates_missing_and_null_fields() {
        let raw = r#"{
            "current_price": 187.1234,
            "predictions": [188.5, null, 190.25],
            "model_metrics": { "model": "LSTM", "r2_score": 0.91 },
            "status": "ok"
        }"#;
        let resp: PredictionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.predictions, vec![Some(188.5), None, Some(190.25)]);
        assert_eq!(resp.model_metrics.as_ref().unwrap().mse, None);
        assert!(resp.plot1.is_none());
        assert!(!resp.is_error());

        let empty: PredictionResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.predictions.is_empty());
        assert!(empty.status.is_none());

        let nulls: PredictionResponse =
            serde_json::from_str(r#"{"predictions": null, "status": "error"}"#).unwrap();
        assert!(nulls.predictions.is_empty());
        assert!(nulls.is_error());
    }
}
