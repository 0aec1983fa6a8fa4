//! View model for the results area, the popular-stocks grid and the error
//! banner. Frontends draw these structs; nothing here knows about terminals.

use crate::config::{ERROR_BANNER_TTL, SCROLLABLE_PREDICTIONS_THRESHOLD};
use crate::error::ClientError;
use crate::model::{ModelMetrics, PopularStock, PredictionResponse};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Local};
use reqwest::Url;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const NOT_AVAILABLE: &str = "N/A";
pub const NO_PREDICTIONS_MESSAGE: &str = "No predictions available";
pub const NO_POPULAR_STOCKS_MESSAGE: &str = "No popular stocks available at the moment.";
pub const POPULAR_LOAD_FAILED_MESSAGE: &str =
    "Failed to load popular stocks. Please try again later.";
pub const CHART_TITLES: [&str; 2] = ["Historical + Prediction", "Prediction Only"];

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
const HANDOFF_PAGE: &str = "index.html";
const HANDOFF_BASE: &str = "http://localhost/";

/// Accepts padded and unpadded input, like an image `data:` URL does.
const CHART_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Clone, Debug, PartialEq)]
pub struct PredictionEntry {
    pub day: usize,
    pub value: String,
}

impl PredictionEntry {
    pub fn label(&self) -> String {
        format!("Day {}", self.day)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetricsView {
    pub model: String,
    pub r2_score: String,
    pub mse: String,
}

impl Default for MetricsView {
    fn default() -> Self {
        Self {
            model: NOT_AVAILABLE.to_string(),
            r2_score: NOT_AVAILABLE.to_string(),
            mse: NOT_AVAILABLE.to_string(),
        }
    }
}

impl MetricsView {
    fn from_metrics(metrics: Option<&ModelMetrics>) -> Self {
        let Some(metrics) = metrics else {
            return Self::default();
        };
        Self {
            model: metrics
                .model
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(NOT_AVAILABLE)
                .to_string(),
            r2_score: format_fixed(metrics.r2_score, 4),
            mse: format_fixed(metrics.mse, 4),
        }
    }
}

/// One chart image plus its download control.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartSlot {
    pub title: &'static str,
    /// `data:image/png;base64,...` when a payload was received.
    pub src: Option<String>,
    /// Decoded size; 0 when the payload could not be decoded.
    pub byte_len: usize,
    /// False when the payload is shown as received without decoding cleanly.
    pub verified: bool,
    pub visible: bool,
    pub download_enabled: bool,
}

impl ChartSlot {
    fn empty(title: &'static str) -> Self {
        Self {
            title,
            src: None,
            byte_len: 0,
            verified: false,
            visible: false,
            download_enabled: false,
        }
    }

    /// A present payload is always shown; decoding only measures it.
    fn from_payload(title: &'static str, payload: Option<&str>) -> Self {
        let Some(payload) = payload.map(str::trim).filter(|p| !p.is_empty()) else {
            debug!("No chart data received for {}", title);
            return Self::empty(title);
        };

        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let (byte_len, verified) = match CHART_BASE64.decode(&compact) {
            Ok(bytes) => {
                if !bytes.starts_with(&PNG_SIGNATURE) {
                    warn!("{} chart payload does not look like a PNG image", title);
                }
                (bytes.len(), true)
            }
            Err(e) => {
                warn!("{} chart payload is not valid base64: {}", title, e);
                (0, false)
            }
        };

        Self {
            title,
            src: Some(format!("data:image/png;base64,{}", payload)),
            byte_len,
            verified,
            visible: true,
            download_enabled: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResultsView {
    pub price: String,
    pub predictions: Vec<PredictionEntry>,
    /// Shown instead of the list when there are no predictions.
    pub placeholder: Option<&'static str>,
    pub scrollable: bool,
    pub metrics: MetricsView,
    pub charts: [ChartSlot; 2],
    pub visible: bool,
    scroll_requested: bool,
    pub rendered_at: Option<DateTime<Local>>,
}

impl Default for ResultsView {
    fn default() -> Self {
        Self {
            price: NOT_AVAILABLE.to_string(),
            predictions: Vec::new(),
            placeholder: None,
            scrollable: false,
            metrics: MetricsView::default(),
            charts: CHART_TITLES.map(ChartSlot::empty),
            visible: false,
            scroll_requested: false,
            rendered_at: None,
        }
    }
}

impl ResultsView {
    /// Replaces every slot from `response`.
    pub fn render(&mut self, response: &PredictionResponse) {
        let charts = [
            ChartSlot::from_payload(CHART_TITLES[0], response.plot1.as_deref()),
            ChartSlot::from_payload(CHART_TITLES[1], response.plot2.as_deref()),
        ];

        let predictions: Vec<PredictionEntry> = response
            .predictions
            .iter()
            .enumerate()
            .map(|(idx, value)| PredictionEntry {
                day: idx + 1,
                value: format_price(*value),
            })
            .collect();

        *self = Self {
            price: format_price(response.current_price),
            placeholder: predictions.is_empty().then_some(NO_PREDICTIONS_MESSAGE),
            scrollable: predictions.len() > SCROLLABLE_PREDICTIONS_THRESHOLD,
            predictions,
            metrics: MetricsView::from_metrics(response.model_metrics.as_ref()),
            charts,
            visible: true,
            scroll_requested: true,
            rendered_at: Some(Local::now()),
        };
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Returns whether the view asked to be scrolled into view since the last
    /// call, and clears the request.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }
}

pub fn format_price(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("${:.2}", v),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_fixed(value: Option<f64>, decimals: usize) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{:.*}", decimals, v),
        None => NOT_AVAILABLE.to_string(),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StockCard {
    pub ticker: String,
    pub name: String,
    /// Prediction page link carrying the ticker as a query parameter.
    pub target: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GridContent {
    Loading,
    Cards(Vec<StockCard>),
    Message { text: String, detail: Option<String> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PopularGrid {
    pub content: GridContent,
    pub selected: usize,
}

impl Default for PopularGrid {
    fn default() -> Self {
        Self {
            content: GridContent::Loading,
            selected: 0,
        }
    }
}

impl PopularGrid {
    pub fn render_list(&mut self, stocks: &[PopularStock]) {
        self.selected = 0;
        if stocks.is_empty() {
            self.content = GridContent::Message {
                text: NO_POPULAR_STOCKS_MESSAGE.to_string(),
                detail: None,
            };
            return;
        }
        self.content = GridContent::Cards(
            stocks
                .iter()
                .map(|s| StockCard {
                    ticker: s.ticker.clone(),
                    name: s.name.clone(),
                    target: handoff_target(&s.ticker),
                })
                .collect(),
        );
    }

    pub fn render_failure(&mut self, err: &ClientError) {
        self.selected = 0;
        self.content = GridContent::Message {
            text: POPULAR_LOAD_FAILED_MESSAGE.to_string(),
            detail: Some(format!("Error: {}", err)),
        };
    }

    pub fn set_loading(&mut self) {
        self.selected = 0;
        self.content = GridContent::Loading;
    }

    pub fn cards(&self) -> &[StockCard] {
        match &self.content {
            GridContent::Cards(cards) => cards,
            _ => &[],
        }
    }

    pub fn select_next(&mut self) {
        let len = self.cards().len();
        if len > 0 {
            self.selected = (self.selected + 1) % len;
        }
    }

    pub fn select_prev(&mut self) {
        let len = self.cards().len();
        if len > 0 {
            self.selected = (self.selected + len - 1) % len;
        }
    }

    pub fn selected_card(&self) -> Option<&StockCard> {
        self.cards().get(self.selected)
    }
}

pub fn handoff_target(ticker: &str) -> String {
    let query: String = Url::parse(HANDOFF_BASE)
        .map(|mut url| {
            url.query_pairs_mut().append_pair("ticker", ticker);
            url.query().unwrap_or_default().to_string()
        })
        .unwrap_or_default();
    format!("{}?{}", HANDOFF_PAGE, query)
}

/// Extracts the `ticker` query parameter from an absolute URL, a relative
/// link such as `index.html?ticker=AAPL`, or a bare `?ticker=AAPL`.
pub fn ticker_from_query(link: &str) -> Option<String> {
    let url = Url::parse(link)
        .or_else(|_| Url::parse(HANDOFF_BASE).and_then(|base| base.join(link)))
        .ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "ticker")
        .map(|(_, value)| value.trim().to_uppercase())
        .filter(|t| !t.is_empty())
}

#[derive(Clone, Debug, PartialEq)]
pub struct Banner {
    pub message: String,
    shown_at: Instant,
}

/// Holds at most one error banner, which expires after a fixed TTL.
#[derive(Clone, Debug)]
pub struct BannerSlot {
    current: Option<Banner>,
    ttl: Duration,
}

impl Default for BannerSlot {
    fn default() -> Self {
        Self::new(ERROR_BANNER_TTL)
    }
}

impl BannerSlot {
    pub fn new(ttl: Duration) -> Self {
        Self { current: None, ttl }
    }

    pub fn show_error(&mut self, message: impl Into<String>, now: Instant) {
        let message = message.into();
        warn!("Showing error banner: {}", message);
        self.current = Some(Banner {
            message,
            shown_at: now,
        });
    }

    pub fn visible(&self, now: Instant) -> Option<&Banner> {
        self.current
            .as_ref()
            .filter(|b| now.saturating_duration_since(b.shown_at) < self.ttl)
    }

    /// Drops an expired banner. Returns true if one was removed.
    pub fn prune(&mut self, now: Instant) -> bool {
        if self.current.is_some() && self.visible(now).is_none() {
            self.current = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn response_with(predictions: usize) -> PredictionResponse {
        PredictionResponse {
            current_price: Some(101.239),
            predictions: (0..predictions).map(|i| Some(100.0 + i as f64 * 0.5)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn more_than_five_predictions_is_scrollable() {
        let mut view = ResultsView::default();
        view.render(&response_with(6));
        assert!(view.scrollable);
        view.render(&response_with(5));
        assert!(!view.scrollable);
        assert_eq!(view.predictions.len(), 5);
    }

    #[test]
    fn formats_price_predictions_and_metrics() {
        let mut view = ResultsView::default();
        let response = PredictionResponse {
            current_price: Some(187.456),
            predictions: vec![Some(188.0), None, Some(190.125)],
            model_metrics: Some(ModelMetrics {
                model: Some("Random Forest".to_string()),
                r2_score: Some(0.912345),
                mse: None,
            }),
            ..Default::default()
        };
        view.render(&response);

        assert_eq!(view.price, "$187.46");
        assert_eq!(view.predictions[0].label(), "Day 1");
        assert_eq!(view.predictions[0].value, "$188.00");
        assert_eq!(view.predictions[1].value, NOT_AVAILABLE);
        assert_eq!(view.predictions[2].label(), "Day 3");
        assert_eq!(view.metrics.model, "Random Forest");
        assert_eq!(view.metrics.r2_score, "0.9123");
        assert_eq!(view.metrics.mse, NOT_AVAILABLE);
        assert!(view.placeholder.is_none());
        assert!(view.visible);
        assert!(view.take_scroll_request());
        assert!(!view.take_scroll_request());
    }

    #[test]
    fn empty_response_renders_placeholders() {
        let mut view = ResultsView::default();
        view.render(&PredictionResponse::default());
        assert_eq!(view.price, NOT_AVAILABLE);
        assert_eq!(view.placeholder, Some(NO_PREDICTIONS_MESSAGE));
        assert!(!view.scrollable);
        assert_eq!(view.metrics, MetricsView::default());
    }

    #[test]
    fn chart_slots_follow_payload_presence() {
        let mut view = ResultsView::default();
        let response = PredictionResponse {
            plot2: Some(TINY_PNG.to_string()),
            ..Default::default()
        };
        view.render(&response);

        let [plot1, plot2] = &view.charts;
        assert!(!plot1.visible);
        assert!(!plot1.download_enabled);
        assert!(plot1.src.is_none());

        assert!(plot2.visible);
        assert!(plot2.download_enabled);
        assert_eq!(
            plot2.src.as_deref(),
            Some(format!("data:image/png;base64,{}", TINY_PNG).as_str())
        );
        assert!(plot2.byte_len > PNG_SIGNATURE.len());
        assert!(plot2.verified);
        assert!(!plot1.verified);
    }

    #[test]
    fn unpadded_and_wrapped_chart_payloads_still_render() {
        for payload in ["iVBORw0KGgo", "iVBORw0K\nGgo=", "iVBORw0KGgo=\r\n"] {
            let mut view = ResultsView::default();
            let response = PredictionResponse {
                current_price: Some(187.5),
                predictions: vec![Some(188.0), Some(189.25)],
                plot1: Some(payload.to_string()),
                ..Default::default()
            };
            view.render(&response);

            assert!(view.visible, "{payload:?}");
            assert_eq!(view.price, "$187.50");
            assert_eq!(view.predictions.len(), 2);
            let chart = &view.charts[0];
            assert!(chart.visible);
            assert!(chart.download_enabled);
            assert!(chart.verified, "{payload:?}");
            assert_eq!(chart.byte_len, PNG_SIGNATURE.len());
            assert_eq!(
                chart.src.as_deref(),
                Some(format!("data:image/png;base64,{}", payload.trim()).as_str())
            );
        }
    }

    #[test]
    fn undecodable_chart_keeps_the_rest_of_the_view() {
        let mut view = ResultsView::default();
        let response = PredictionResponse {
            plot1: Some("***not base64***".to_string()),
            plot2: Some(TINY_PNG.to_string()),
            ..response_with(9)
        };
        view.render(&response);

        assert!(view.visible);
        assert_eq!(view.price, "$101.24");
        assert_eq!(view.predictions.len(), 9);
        assert!(view.scrollable);

        let [plot1, plot2] = &view.charts;
        assert!(plot1.visible);
        assert!(!plot1.verified);
        assert_eq!(plot1.byte_len, 0);
        assert_eq!(plot1.src.as_deref(), Some("data:image/png;base64,***not base64***"));
        assert!(plot2.verified);
    }

    #[test]
    fn popular_grid_cards_and_placeholder() {
        let mut grid = PopularGrid::default();
        grid.render_list(&[]);
        assert_eq!(
            grid.content,
            GridContent::Message {
                text: NO_POPULAR_STOCKS_MESSAGE.to_string(),
                detail: None
            }
        );

        grid.render_list(&[
            PopularStock {
                ticker: "AAPL".to_string(),
                name: "Apple Inc.".to_string(),
            },
            PopularStock {
                ticker: "BRK.B".to_string(),
                name: "Berkshire Hathaway".to_string(),
            },
        ]);
        assert_eq!(grid.cards().len(), 2);
        grid.select_prev();
        let card = grid.selected_card().unwrap();
        assert_eq!(card.ticker, "BRK.B");
        assert_eq!(card.target, "index.html?ticker=BRK.B");
        assert_eq!(ticker_from_query(&card.target).as_deref(), Some("BRK.B"));

        grid.render_failure(&ClientError::Transport("Server error: 503".to_string()));
        assert!(grid.cards().is_empty());
        assert!(grid.selected_card().is_none());
    }

    #[test]
    fn ticker_handoff_parsing() {
        assert_eq!(ticker_from_query("?ticker=msft").as_deref(), Some("MSFT"));
        assert_eq!(
            ticker_from_query("https://stockify.example/index.html?x=1&ticker=NVDA").as_deref(),
            Some("NVDA")
        );
        assert_eq!(ticker_from_query("index.html?ticker="), None);
        assert_eq!(ticker_from_query("index.html"), None);
    }

    #[test]
    fn second_error_replaces_first() {
        let mut banners = BannerSlot::default();
        let t0 = Instant::now();
        banners.show_error("first", t0);
        banners.show_error("second", t0 + Duration::from_millis(10));

        let shown = banners.visible(t0 + Duration::from_millis(20)).unwrap();
        assert_eq!(shown.message, "second");
    }

    #[test]
    fn banner_expires_after_ttl() {
        let mut banners = BannerSlot::default();
        let t0 = Instant::now();
        banners.show_error("gone soon", t0);
        assert!(!banners.prune(t0 + Duration::from_secs(4)));
        assert!(banners.visible(t0 + Duration::from_secs(4)).is_some());
        assert!(banners.visible(t0 + ERROR_BANNER_TTL).is_none());
        assert!(banners.prune(t0 + Duration::from_secs(6)));
        assert!(banners.visible(t0).is_none());
    }
}
